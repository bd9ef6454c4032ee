//! 程序运行函数.

use std::path::{Path, PathBuf};

use anyhow::Context;
use log::{info, warn};
use spine_berry::detect::VertebraClassifier;
use spine_berry::output::{save_detection_results, save_sequences};
use spine_berry::pipeline::VolumeProcessor;
use spine_berry::sequence::par_extract_sequences;
use spine_berry::{CtVolume, ImgWriteVis};
use utils::config::{self, expand_home, AppConfig};
use utils::loader::Dataset;

use crate::report::{RunReport, VolumeReport};

/// 处理后体数据的文件名.
pub const PROCESSED_VOLUME_FILE: &str = "processed_volume.npy";

/// 中间切片预览图的文件名.
pub const PREVIEW_FILE: &str = "processed_preview.png";

/// 命令行给出的运行选项. 除 `config` 外, 给出的项覆盖配置文件.
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// 配置文件路径.
    pub config: Option<PathBuf>,
    /// 特征工程流程的输入体数据.
    pub volume: Option<PathBuf>,
    /// 输出目录.
    pub output_dir: Option<PathBuf>,
    /// 并行线程数.
    pub threads: Option<usize>,
    /// 跳过特征工程流程.
    pub skip_volume: bool,
}

/// 实际运行.
pub fn run(opts: &Options) -> anyhow::Result<RunReport> {
    let cfg = resolve_config(opts)?;
    info!("Configuration loaded.");
    init_thread_pool(opts.threads.unwrap_or_else(utils::cpus));

    let mut dataset = Dataset::load(&cfg.data_paths).context("loading data")?;
    dataset.preprocess().context("preprocessing data")?;
    let table = dataset.detection_table()?;

    let classifier = VertebraClassifier::new(&cfg.threshold)?;
    info!("detecting vertebrae in {} slice rows...", table.len());
    let detections = classifier
        .par_classify_table(&table)
        .context("vertebrae detection")?;

    info!("generating sequences...");
    let sequences = par_extract_sequences(&detections);
    let sequences_path = save_sequences(&sequences, &cfg.output_dir)
        .with_context(|| format!("saving sequences to {}", cfg.output_dir.display()))?;
    info!("sequences saved to {}", sequences_path.display());
    let detections_path = save_detection_results(&detections, &cfg.output_dir)
        .with_context(|| format!("saving detection results to {}", cfg.output_dir.display()))?;
    info!("detection results saved to {}", detections_path.display());

    let mut report = RunReport::new(&detections, &sequences, sequences_path, detections_path);
    report.volume = match (&cfg.volume_path, opts.skip_volume) {
        (Some(path), false) => Some(process_volume(&cfg, path)?),
        (Some(_), true) => {
            info!("volume processing skipped");
            None
        }
        (None, _) => None,
    };
    Ok(report)
}

/// 读取配置文件, 再依次应用环境变量和命令行覆盖.
fn resolve_config(opts: &Options) -> anyhow::Result<AppConfig> {
    let path = config::config_path(opts.config.as_deref());
    let mut cfg = AppConfig::load(&path)
        .with_context(|| format!("loading configuration from {}", path.display()))?;
    cfg.apply_env_overrides();
    if let Some(dir) = &opts.output_dir {
        cfg.output_dir = expand_home(dir);
    }
    if let Some(volume) = &opts.volume {
        cfg.volume_path = Some(expand_home(volume));
    }
    Ok(cfg)
}

/// 全局线程池只能初始化一次, 重复初始化时沿用已有的线程池.
fn init_thread_pool(threads: usize) {
    match rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
    {
        Ok(()) => info!("using {threads} worker threads"),
        Err(e) => warn!("thread pool already initialized: {e}"),
    }
}

/// 特征工程: 读取, 处理, 保存, 可选地输出预览图.
fn process_volume(cfg: &AppConfig, path: &Path) -> anyhow::Result<VolumeReport> {
    info!("processing volume {}...", path.display());
    let processor = VolumeProcessor::new(&cfg.features)?;
    let volume = CtVolume::open(path)
        .with_context(|| format!("loading volume from {}", path.display()))?;
    let processed = processor
        .par_process(volume.data())
        .context("volume feature engineering")?;
    info!(
        "volume processed: {:?} with {} (level {}), sigma {}, clip limit {}",
        processed.shape(),
        processor.wavelet(),
        processor.level(),
        processor.sigma(),
        processor.clip_limit()
    );

    let npy_path = cfg.output_dir.join(PROCESSED_VOLUME_FILE);
    std::fs::create_dir_all(&cfg.output_dir)?;
    processed
        .save_npy(&npy_path)
        .with_context(|| format!("saving processed volume to {}", npy_path.display()))?;
    info!("processed volume saved to {}", npy_path.display());

    let preview_path = if cfg.preview && !processed.is_empty() {
        let p = cfg.output_dir.join(PREVIEW_FILE);
        processed
            .slice_at(processed.len_z() / 2)
            .save(&p)
            .with_context(|| format!("saving preview to {}", p.display()))?;
        info!("preview saved to {}", p.display());
        Some(p)
    } else {
        None
    };

    Ok(VolumeReport {
        shape: processed.shape(),
        npy_path,
        preview_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_inputs(dir: &Path, with_volume: bool) -> PathBuf {
        let seg = dir.join("train_segmented.csv");
        fs::write(
            &seg,
            "StudyInstanceUID,Slice,C1,C2,C3,C4,C5,C6,C7\n\
             A,3,0.9,0,0,0,0,0,0\n\
             A,1,0.2,0,0,0,0,0,0\n\
             A,5,0.6,0,0,0,0,0,0\n",
        )
        .unwrap();
        let meta = dir.join("meta_train_clean.csv");
        fs::write(&meta, "StudyInstanceUID,Slice,ImageHeight\nA,3,512\n").unwrap();

        let mut text = format!(
            "output_dir = {:?}\nthreshold = 0.5\npreview = true\n",
            dir.join("out")
        );
        if with_volume {
            let v = dir.join("volume.npy");
            CtVolume::new(ndarray::Array3::from_shape_fn((3, 10, 12), |(z, h, w)| {
                (z * 100 + h * 10 + w) as f32
            }))
            .save_npy(&v)
            .unwrap();
            text.push_str(&format!("volume_path = {v:?}\n"));
        }
        text.push_str(&format!(
            "[data_paths]\ntrain_segmented = {seg:?}\nmeta_train_clean = {meta:?}\n"
        ));
        let cfg = dir.join("config.toml");
        fs::write(&cfg, text).unwrap();
        cfg
    }

    #[test]
    fn test_run_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let opts = Options {
            config: Some(write_inputs(dir.path(), true)),
            threads: Some(2),
            ..Default::default()
        };
        let report = run(&opts).unwrap();
        assert_eq!(report.rows, 3);
        assert_eq!(report.detected[0], 2);

        let json = fs::read_to_string(&report.sequences_path).unwrap();
        assert!(json.contains("\"A\": [\n            3,\n            5\n        ]"));
        assert!(report.detections_path.is_file());

        let vol = report.volume.unwrap();
        assert_eq!(vol.shape, (3, 10, 12));
        let back = CtVolume::open(&vol.npy_path).unwrap();
        assert_eq!(back.shape(), (3, 10, 12));
        assert!(vol.preview_path.unwrap().is_file());
    }

    #[test]
    fn test_run_skip_volume_and_override_output() {
        let dir = tempfile::tempdir().unwrap();
        let other = dir.path().join("elsewhere");
        let opts = Options {
            config: Some(write_inputs(dir.path(), true)),
            output_dir: Some(other.clone()),
            skip_volume: true,
            ..Default::default()
        };
        let report = run(&opts).unwrap();
        assert!(report.volume.is_none());
        assert_eq!(report.sequences_path, other.join("sequences.json"));
    }

    #[test]
    fn test_run_missing_config() {
        let dir = tempfile::tempdir().unwrap();
        let opts = Options {
            config: Some(dir.path().join("absent.toml")),
            ..Default::default()
        };
        let err = run(&opts).unwrap_err();
        assert!(format!("{err:#}").contains("loading configuration"));
    }
}
