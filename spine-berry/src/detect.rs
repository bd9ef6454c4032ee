//! 基于阈值的多标签椎骨检测.
//!
//! 每个椎骨标签独立判定: 概率 `>=` 该标签阈值即视为检出. 标签之间不互斥,
//! 一个切片可以检出零个, 一个或全部七个标签.

use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::consts::{defaults, Vertebra, VERTEBRAE, VERTEBRA_COUNT};
use crate::table::{DetectionRow, DetectionTable, VertebraSet};
use crate::{SpineError, SpineResult};

/// 检测阈值: 所有标签共用一个值, 或逐标签给出.
///
/// 逐标签形式的键是标签名 (`C1`..`C7`, 不区分大小写).
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(untagged))]
pub enum Thresholds {
    /// 所有标签共用的阈值.
    Scalar(f64),
    /// 逐标签阈值. 必须覆盖全部七个标签.
    PerLabel(BTreeMap<String, f64>),
}

impl Default for Thresholds {
    fn default() -> Self {
        Self::Scalar(defaults::THRESHOLD)
    }
}

impl From<f64> for Thresholds {
    fn from(value: f64) -> Self {
        Self::Scalar(value)
    }
}

impl Thresholds {
    /// 解析为按 C1 -> C7 排列的阈值数组.
    ///
    /// 以下情形返回 `SpineError::Configuration`:
    /// 阈值不是有限值; 逐标签形式中出现未知标签, 重复标签, 或缺少某个标签.
    pub fn resolve(&self) -> SpineResult<[f64; VERTEBRA_COUNT]> {
        let resolved = match self {
            Self::Scalar(t) => [*t; VERTEBRA_COUNT],
            Self::PerLabel(map) => {
                let mut slots = [None; VERTEBRA_COUNT];
                for (key, &t) in map {
                    let v: Vertebra = key.parse()?;
                    if slots[v.index()].replace(t).is_some() {
                        return Err(SpineError::Configuration(format!(
                            "threshold for {v} given more than once"
                        )));
                    }
                }
                let mut out = [0.0; VERTEBRA_COUNT];
                for (v, (o, slot)) in VERTEBRAE.iter().zip(out.iter_mut().zip(slots)) {
                    *o = slot.ok_or_else(|| {
                        SpineError::Configuration(format!("missing threshold for {v}"))
                    })?;
                }
                out
            }
        };

        if let Some(t) = resolved.iter().find(|t| !t.is_finite()) {
            return Err(SpineError::Configuration(format!(
                "threshold must be finite, got {t}"
            )));
        }
        Ok(resolved)
    }
}

/// 椎骨分类器. 阈值在构造时一次性解析.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct VertebraClassifier {
    thresholds: [f64; VERTEBRA_COUNT],
}

impl Default for VertebraClassifier {
    fn default() -> Self {
        Self {
            thresholds: [defaults::THRESHOLD; VERTEBRA_COUNT],
        }
    }
}

impl VertebraClassifier {
    /// 由 `thresholds` 创建分类器. 错误见 [`Thresholds::resolve`].
    pub fn new(thresholds: &Thresholds) -> SpineResult<Self> {
        Ok(Self {
            thresholds: thresholds.resolve()?,
        })
    }

    /// 标签 `v` 的阈值.
    #[inline]
    pub fn threshold(&self, v: Vertebra) -> f64 {
        self.thresholds[v.index()]
    }

    /// 判定单行检出的标签集合.
    ///
    /// 行中缺少某个标签的概率值时, 返回 `SpineError::MissingColumn`.
    pub fn classify(&self, row: &DetectionRow) -> SpineResult<VertebraSet> {
        let mut detected = VertebraSet::new();
        for v in VERTEBRAE {
            let p = row.probability(v).ok_or_else(|| {
                SpineError::MissingColumn(format!(
                    "{v} (study {}, slice {})",
                    row.study_id(),
                    row.slice_index()
                ))
            })?;
            if p >= self.threshold(v) {
                detected.insert(v);
            }
        }
        Ok(detected)
    }

    /// 对每一行分类, 返回带检测结果的新表. 原表不变.
    pub fn classify_table(&self, table: &DetectionTable) -> SpineResult<DetectionTable> {
        let rows = table
            .iter()
            .map(|row| self.classify(row).map(|d| row.with_detected(d)))
            .collect::<SpineResult<Vec<_>>>()?;
        Ok(table.with_rows(rows))
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
    }
}

/// 并发操作部分
#[cfg(feature = "rayon")]
impl VertebraClassifier {
    /// 借助 `rayon`, 按行并行地分类. 行的顺序和结果与 [`Self::classify_table`] 相同.
    pub fn par_classify_table(&self, table: &DetectionTable) -> SpineResult<DetectionTable> {
        let rows = table
            .rows()
            .par_iter()
            .map(|row| self.classify(row).map(|d| row.with_detected(d)))
            .collect::<SpineResult<Vec<_>>>()?;
        Ok(table.with_rows(rows))
    }
}
