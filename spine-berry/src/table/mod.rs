//! 逐切片概率表.
//!
//! 表格本身只要求 `StudyInstanceUID` 和 `Slice` 两列; 椎骨概率列 `C1`..`C7` 可以缺失,
//! 缺失的概率会在分类时以 `SpineError::MissingColumn` 报告.

mod row;
mod set;

pub use row::DetectionRow;
pub use set::VertebraSet;

use crate::consts::{Vertebra, SLICE_COLUMN, STUDY_COLUMN, VERTEBRAE, VERTEBRA_COUNT};
use crate::{SpineError, SpineResult};

/// 检测表. 行的顺序即输入顺序.
///
/// `(study_id, slice_index)` 语义上唯一, 但这里不做检查.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DetectionTable {
    columns: Vec<String>,
    rows: Vec<DetectionRow>,
}

impl DetectionTable {
    /// 由列名和字符串记录创建.
    ///
    /// 缺少研究列或切片列, 或切片索引无法解析为整数时, 返回 `SpineError::MissingColumn`.
    /// 概率单元格为空, `NaN` 或无法解析时记为缺失. 短于列数的记录视为末尾单元格为空.
    pub fn from_records<I>(columns: Vec<String>, records: I) -> SpineResult<Self>
    where
        I: IntoIterator<Item = Vec<String>>,
    {
        let study_col = column_index(&columns, STUDY_COLUMN)
            .ok_or_else(|| SpineError::MissingColumn(STUDY_COLUMN.to_owned()))?;
        let slice_col = column_index(&columns, SLICE_COLUMN)
            .ok_or_else(|| SpineError::MissingColumn(SLICE_COLUMN.to_owned()))?;
        let prob_cols = VERTEBRAE.map(|v| column_index(&columns, v.name()));

        let mut rows = Vec::new();
        for cells in records {
            let cell = |i: usize| cells.get(i).map(|s| s.trim()).unwrap_or_default();

            let slice_index = parse_slice(cell(slice_col)).ok_or_else(|| {
                SpineError::MissingColumn(format!(
                    "{SLICE_COLUMN} (unparseable value `{}` in row {})",
                    cell(slice_col),
                    rows.len()
                ))
            })?;
            let mut probabilities = [None; VERTEBRA_COUNT];
            for (p, col) in probabilities.iter_mut().zip(prob_cols) {
                *p = col.and_then(|i| parse_probability(cell(i)));
            }

            let study_id = cell(study_col).to_owned();
            rows.push(
                DetectionRow::new(study_id, slice_index)
                    .with_probabilities(probabilities)
                    .with_cells(cells),
            );
        }
        Ok(Self { columns, rows })
    }

    /// 由已构造好的行创建. 列固定为 `StudyInstanceUID`, `Slice`, `C1`..`C7`,
    /// 每行的原始单元格由其字段重新生成.
    pub fn from_rows<I: IntoIterator<Item = DetectionRow>>(rows: I) -> Self {
        let columns = [STUDY_COLUMN, SLICE_COLUMN]
            .into_iter()
            .map(str::to_owned)
            .chain(VERTEBRAE.iter().map(|v| v.name().to_owned()))
            .collect();
        let rows = rows
            .into_iter()
            .map(|r| {
                let cells = [r.study_id().to_owned(), r.slice_index().to_string()]
                    .into_iter()
                    .chain(VERTEBRAE.iter().map(|&v| {
                        r.probability(v).map(|p| p.to_string()).unwrap_or_default()
                    }))
                    .collect();
                r.with_cells(cells)
            })
            .collect();
        Self { columns, rows }
    }

    /// 用相同的列和新的行创建新表.
    pub(crate) fn with_rows(&self, rows: Vec<DetectionRow>) -> Self {
        Self {
            columns: self.columns.clone(),
            rows,
        }
    }

    /// 列名.
    #[inline]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// 全部行.
    #[inline]
    pub fn rows(&self) -> &[DetectionRow] {
        &self.rows
    }

    /// 行数.
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// 是否没有任何行.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 按输入顺序迭代行.
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, DetectionRow> {
        self.rows.iter()
    }

    /// 表中是否带有 `v` 的概率列.
    #[inline]
    pub fn has_probability_column(&self, v: Vertebra) -> bool {
        column_index(&self.columns, v.name()).is_some()
    }
}

impl<'a> IntoIterator for &'a DetectionTable {
    type Item = &'a DetectionRow;
    type IntoIter = std::slice::Iter<'a, DetectionRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[inline]
fn column_index(columns: &[String], name: &str) -> Option<usize> {
    columns.iter().position(|c| c.trim() == name)
}

/// 切片索引. 允许 `3.0` 这样带零小数部分的浮点写法.
fn parse_slice(s: &str) -> Option<i64> {
    if let Ok(i) = s.parse::<i64>() {
        return Some(i);
    }
    let f = s.parse::<f64>().ok()?;
    (f.is_finite() && f.fract() == 0.0).then_some(f as i64)
}

fn parse_probability(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|p| !p.is_nan())
}
