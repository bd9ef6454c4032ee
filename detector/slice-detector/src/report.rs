//! 运行结果.

use std::io::{self, Write};
use std::path::PathBuf;

use log::info;
use spine_berry::consts::{VERTEBRAE, VERTEBRA_COUNT};
use spine_berry::sequence::SequenceMap;
use spine_berry::table::DetectionTable;
use spine_berry::Idx3d;

/// 特征工程流程的输出.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeReport {
    /// 体数据形状 (z, H, W).
    pub shape: Idx3d,
    /// 处理后体数据的 `.npy` 路径.
    pub npy_path: PathBuf,
    /// 预览图路径.
    pub preview_path: Option<PathBuf>,
}

/// 一次运行的汇总.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// 参与检测的切片行数.
    pub rows: usize,
    /// 每个标签检出的切片行数, 按 C1 -> C7.
    pub detected: [usize; VERTEBRA_COUNT],
    /// 每个标签涉及的研究数, 按 C1 -> C7.
    pub studies: [usize; VERTEBRA_COUNT],
    /// `sequences.json` 路径.
    pub sequences_path: PathBuf,
    /// `detection_results.csv` 路径.
    pub detections_path: PathBuf,
    /// 特征工程流程的输出. 未运行时为 `None`.
    pub volume: Option<VolumeReport>,
}

impl RunReport {
    /// 由检测结果汇总.
    pub fn new(
        table: &DetectionTable,
        sequences: &SequenceMap,
        sequences_path: PathBuf,
        detections_path: PathBuf,
    ) -> Self {
        let mut detected = [0; VERTEBRA_COUNT];
        for set in table.iter().filter_map(|r| r.detected()) {
            for v in set.iter() {
                detected[v.index()] += 1;
            }
        }
        Self {
            rows: table.len(),
            detected,
            studies: VERTEBRAE.map(|v| sequences.get(v).len()),
            sequences_path,
            detections_path,
            volume: None,
        }
    }

    /// 将汇总写进 `w` 中.
    pub fn describe_into<W: Write>(&self, w: &mut W) -> io::Result<()> {
        const S4: &str = "    ";

        writeln!(w, "Detection over {} slice rows:", self.rows)?;
        for (i, v) in VERTEBRAE.iter().enumerate() {
            writeln!(
                w,
                "{S4}{v}: {} slices in {} studies",
                self.detected[i], self.studies[i]
            )?;
        }
        writeln!(w, "Sequences: {}", self.sequences_path.display())?;
        write!(w, "Detection results: {}", self.detections_path.display())?;
        if let Some(vol) = &self.volume {
            let (depth, height, width) = vol.shape;
            writeln!(w)?;
            write!(
                w,
                "Processed volume ({depth} x {height} x {width}): {}",
                vol.npy_path.display()
            )?;
            if let Some(p) = &vol.preview_path {
                writeln!(w)?;
                write!(w, "Preview: {}", p.display())?;
            }
        }
        Ok(())
    }

    /// 逐行写入日志.
    pub fn log(&self) {
        let mut buf = Vec::with_capacity(512);
        if self.describe_into(&mut buf).is_ok() {
            for line in String::from_utf8_lossy(&buf).lines() {
                info!("{line}");
            }
        }
    }
}
