//! 对 `Frame` 的更一层封装. 按配置加载全部数据表, 并完成缺失值处理与合并.

use std::collections::BTreeMap;
use std::path::PathBuf;

use log::{info, warn};
use spine_berry::consts::{SLICE_COLUMN, STUDY_COLUMN};
use spine_berry::table::DetectionTable;
use spine_berry::{SpineError, SpineResult};

use crate::config::{META_SEGMENTATION, META_TRAIN, TRAIN_SEGMENTED};
use crate::frame::{Frame, Join};

/// 概率表与元数据表内连接时的列名后缀.
pub const MERGE_SUFFIXES: (&str, &str) = ("_segmented", "meta");

/// 与真实标签表左连接时的列名后缀.
pub const GROUND_TRUTH_SUFFIXES: (&str, &str) = ("", "_gt");

/// 一次运行用到的全部数据表.
#[derive(Clone, Debug, Default)]
pub struct Dataset {
    frames: BTreeMap<String, Frame>,
    merged: Option<Frame>,
}

impl Dataset {
    /// 加载 `paths` 中的每一个 CSV 文件. 任何一个失败都会中止加载.
    pub fn load(paths: &BTreeMap<String, PathBuf>) -> SpineResult<Self> {
        info!("loading data...");
        let mut frames = BTreeMap::new();
        for (name, path) in paths {
            let frame = Frame::from_csv(path)?;
            info!("{name} loaded successfully from {}", path.display());
            frames.insert(name.clone(), frame);
        }
        Ok(Self::from_frames(frames))
    }

    /// 由已有的表创建.
    #[inline]
    pub fn from_frames(frames: BTreeMap<String, Frame>) -> Self {
        Self {
            frames,
            merged: None,
        }
    }

    /// 去掉每张表中含缺失值的行, 再合并.
    pub fn preprocess(&mut self) -> SpineResult<()> {
        info!("preprocessing data...");
        for (name, frame) in self.frames.iter_mut() {
            let cleaned = frame.drop_missing();
            info!(
                "{name}: missing values handled ({} of {} rows dropped)",
                frame.len() - cleaned.len(),
                frame.len()
            );
            *frame = cleaned;
        }
        self.merge()
    }

    /// 概率表与元数据表按 (研究, 切片) 内连接; 若有真实标签表, 再左连接.
    ///
    /// 缺少概率表或元数据表时跳过合并.
    pub fn merge(&mut self) -> SpineResult<()> {
        let (Some(segmented), Some(meta)) =
            (self.frames.get(TRAIN_SEGMENTED), self.frames.get(META_TRAIN))
        else {
            warn!("`{TRAIN_SEGMENTED}` or `{META_TRAIN}` not loaded, skip merging");
            return Ok(());
        };

        info!("merging data...");
        let on = [STUDY_COLUMN, SLICE_COLUMN];
        let mut merged = segmented.merge(meta, &on, Join::Inner, MERGE_SUFFIXES)?;
        if let Some(truth) = self.frames.get(META_SEGMENTATION) {
            info!("merging with {META_SEGMENTATION} for true labels");
            merged = merged.merge(truth, &on, Join::Left, GROUND_TRUTH_SUFFIXES)?;
        }
        info!(
            "merge completed: {} rows x {} columns",
            merged.len(),
            merged.width()
        );
        self.merged = Some(merged);
        Ok(())
    }

    /// 名为 `name` 的表.
    #[inline]
    pub fn frame(&self, name: &str) -> Option<&Frame> {
        self.frames.get(name)
    }

    /// 合并后的表. 尚未合并或跳过合并时为 `None`.
    #[inline]
    pub fn merged(&self) -> Option<&Frame> {
        self.merged.as_ref()
    }

    /// 由概率表构造检测表.
    pub fn detection_table(&self) -> SpineResult<DetectionTable> {
        self.frame(TRAIN_SEGMENTED)
            .ok_or_else(|| {
                SpineError::Configuration(format!("dataset `{TRAIN_SEGMENTED}` is not loaded"))
            })?
            .to_detection_table()
    }
}
