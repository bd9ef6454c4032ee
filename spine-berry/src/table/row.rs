use crate::consts::{Vertebra, VERTEBRA_COUNT};

use super::VertebraSet;

/// 单个 (研究, 切片) 观测.
///
/// 除解析出的字段外, 还保留原始表格中的全部单元格, 以便输出时原样写回.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionRow {
    study_id: String,
    slice_index: i64,
    probabilities: [Option<f64>; VERTEBRA_COUNT],
    detected: Option<VertebraSet>,
    cells: Vec<String>,
}

impl DetectionRow {
    /// 创建一个没有任何概率值, 也尚未分类的行.
    pub fn new<S: Into<String>>(study_id: S, slice_index: i64) -> Self {
        Self {
            study_id: study_id.into(),
            slice_index,
            probabilities: [None; VERTEBRA_COUNT],
            detected: None,
            cells: Vec::new(),
        }
    }

    /// 设置 `v` 的概率值, 用于链式构造.
    #[inline]
    pub fn with_probability(mut self, v: Vertebra, p: f64) -> Self {
        self.probabilities[v.index()] = Some(p);
        self
    }

    pub(crate) fn with_cells(mut self, cells: Vec<String>) -> Self {
        self.cells = cells;
        self
    }

    pub(crate) fn with_probabilities(mut self, p: [Option<f64>; VERTEBRA_COUNT]) -> Self {
        self.probabilities = p;
        self
    }

    /// 研究标识.
    #[inline]
    pub fn study_id(&self) -> &str {
        &self.study_id
    }

    /// 切片索引, 决定研究内的先后顺序.
    #[inline]
    pub fn slice_index(&self) -> i64 {
        self.slice_index
    }

    /// `v` 的概率值. 原表中缺少该列或该单元格为空时为 `None`.
    #[inline]
    pub fn probability(&self, v: Vertebra) -> Option<f64> {
        self.probabilities[v.index()]
    }

    /// 检测出的椎骨标签. 尚未分类时为 `None`.
    #[inline]
    pub fn detected(&self) -> Option<VertebraSet> {
        self.detected
    }

    /// 返回一个带有检测结果的新行, 概率值保持不变.
    #[inline]
    pub fn with_detected(&self, detected: VertebraSet) -> Self {
        Self {
            detected: Some(detected),
            ..self.clone()
        }
    }

    /// 原始单元格, 与所在表的列一一对应.
    #[inline]
    pub fn cells(&self) -> &[String] {
        &self.cells
    }
}
