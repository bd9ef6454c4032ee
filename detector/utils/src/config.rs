//! TOML 配置文件.
//!
//! 查找顺序: 命令行给出的路径 -> 环境变量 `$SPINE_CONFIG` -> 当前目录下的 `config.toml`.
//! 读入后再应用环境变量覆盖 (`$SPINE_OUTPUT_DIR`).
//!
//! ```toml
//! output_dir = "~/spine/output"
//! threshold = 0.5            # 或 { C1 = 0.5, C2 = 0.4, ..., C7 = 0.6 }
//! volume_path = "scan.nii.gz" # 可选
//! preview = true              # 可选
//!
//! [data_paths]
//! train_segmented = "data/train_segmented.csv"
//! meta_train_clean = "data/meta_train_clean.csv"
//! meta_segmentation_clean = "data/meta_segmentation_clean.csv"
//!
//! [features]                  # 可选, 每一项都有默认值
//! wavelet = "db2"
//! wavelet_level = 2
//! log_sigma = 1.0
//! clahe_clip_limit = 0.01
//! ```

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use spine_berry::detect::Thresholds;
use spine_berry::pipeline::{StageConfig, VolumeProcessor};
use spine_berry::{SpineError, SpineResult};

/// 指定配置文件路径的环境变量.
pub const CONFIG_ENV: &str = "SPINE_CONFIG";

/// 覆盖输出目录的环境变量.
pub const OUTPUT_DIR_ENV: &str = "SPINE_OUTPUT_DIR";

/// 默认配置文件名.
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// 逐切片概率表的数据集名. 必须出现在 `data_paths` 中.
pub const TRAIN_SEGMENTED: &str = "train_segmented";

/// 与概率表做内连接的元数据表名.
pub const META_TRAIN: &str = "meta_train_clean";

/// 带真实标签的元数据表名, 可选.
pub const META_SEGMENTATION: &str = "meta_segmentation_clean";

/// 程序配置.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct AppConfig {
    /// 数据集名 -> CSV 路径.
    pub data_paths: BTreeMap<String, PathBuf>,
    /// 输出目录.
    pub output_dir: PathBuf,
    /// 检测阈值.
    pub threshold: Thresholds,
    /// 特征工程流程的输入体数据.
    #[serde(default)]
    pub volume_path: Option<PathBuf>,
    /// 特征工程各阶段参数.
    #[serde(default)]
    pub features: StageConfig,
    /// 是否输出处理后中间切片的预览图.
    #[serde(default)]
    pub preview: bool,
}

impl AppConfig {
    /// 从 TOML 文本解析并校验. 路径中的 `~` 会被展开.
    ///
    /// 缺少必需项或取值非法时返回 `SpineError::Configuration`.
    pub fn from_toml_str(text: &str) -> SpineResult<Self> {
        let mut config: Self =
            toml::from_str(text).map_err(|e| SpineError::Configuration(e.to_string()))?;
        config.expand_paths();
        config.validate()?;
        Ok(config)
    }

    /// 读取并解析 `path`. 文件无法读取时返回 `SpineError::Io`.
    pub fn load<P: AsRef<Path>>(path: P) -> SpineResult<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    /// 按环境变量覆盖.
    #[inline]
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_with(|k| env::var(k).ok());
    }

    /// 按 `lookup` 给出的变量覆盖. 空值被忽略.
    pub fn apply_overrides_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(OUTPUT_DIR_ENV).filter(|s| !s.trim().is_empty()) {
            self.output_dir = expand_home(Path::new(dir.trim()));
        }
    }

    /// 概率表路径.
    #[inline]
    pub fn train_segmented_path(&self) -> Option<&Path> {
        self.data_paths.get(TRAIN_SEGMENTED).map(PathBuf::as_path)
    }

    fn expand_paths(&mut self) {
        for p in self.data_paths.values_mut() {
            *p = expand_home(p);
        }
        self.output_dir = expand_home(&self.output_dir);
        if let Some(p) = self.volume_path.as_mut() {
            *p = expand_home(p);
        }
    }

    fn validate(&self) -> SpineResult<()> {
        if !self.data_paths.contains_key(TRAIN_SEGMENTED) {
            return Err(SpineError::Configuration(format!(
                "data_paths must contain `{TRAIN_SEGMENTED}`"
            )));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(SpineError::Configuration("output_dir is empty".to_owned()));
        }
        self.threshold.resolve()?;
        VolumeProcessor::new(&self.features)?;
        Ok(())
    }
}

/// 配置文件路径: `cli` -> `$SPINE_CONFIG` -> `./config.toml`.
pub fn config_path(cli: Option<&Path>) -> PathBuf {
    config_path_with(cli, |k| env::var(k).ok())
}

/// 同 [`config_path`], 环境变量由 `lookup` 给出.
pub fn config_path_with<F>(cli: Option<&Path>, lookup: F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    match cli {
        Some(p) => expand_home(p),
        None => lookup(CONFIG_ENV)
            .filter(|s| !s.trim().is_empty())
            .map(|s| expand_home(Path::new(s.trim())))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE)),
    }
}

/// 将开头的 `~` 展开为用户主目录. 找不到主目录时原样返回.
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) if rest.as_os_str().is_empty() => home,
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}
