//! 切片序列提取.
//!
//! 对每个椎骨标签, 取检出该标签的行, 按研究分组, 组内按切片索引升序排列.
//! 不同标签的序列是同一组切片上可能互相重叠的视图, 不是对切片的划分.

use std::collections::BTreeMap;

use itertools::Itertools;

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::consts::{Vertebra, VERTEBRAE};
use crate::table::{DetectionRow, DetectionTable};

/// 研究标识 -> 升序切片索引.
pub type StudySequences = BTreeMap<String, Vec<i64>>;

/// 椎骨标签 -> 研究标识 -> 升序切片索引.
///
/// 总是包含全部七个标签; 某研究没有检出某标签时, 该标签下不出现该研究.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize), serde(transparent))]
pub struct SequenceMap {
    inner: BTreeMap<Vertebra, StudySequences>,
}

impl SequenceMap {
    /// `v` 下所有研究的序列.
    #[inline]
    pub fn get(&self, v: Vertebra) -> &StudySequences {
        // 构造时已插入全部标签.
        &self.inner[&v]
    }

    /// `v` 在研究 `study_id` 中的序列.
    #[inline]
    pub fn sequence(&self, v: Vertebra, study_id: &str) -> Option<&[i64]> {
        self.get(v).get(study_id).map(Vec::as_slice)
    }

    /// 按 C1 -> C7 迭代.
    pub fn iter(&self) -> impl Iterator<Item = (Vertebra, &StudySequences)> {
        self.inner.iter().map(|(v, s)| (*v, s))
    }

    /// 所有标签下都没有任何研究.
    pub fn is_empty(&self) -> bool {
        self.inner.values().all(BTreeMap::is_empty)
    }

    /// 消费自我, 获得底层映射.
    #[inline]
    pub fn into_inner(self) -> BTreeMap<Vertebra, StudySequences> {
        self.inner
    }
}

/// 从已分类的表中提取序列.
///
/// 尚未分类的行视为没有检出任何标签. 重复的 `(研究, 切片)` 行全部保留,
/// 因此序列中可能出现重复的切片索引.
pub fn extract_sequences(table: &DetectionTable) -> SequenceMap {
    SequenceMap {
        inner: VERTEBRAE
            .into_iter()
            .map(|v| (v, sequences_of(v, table.rows())))
            .collect(),
    }
}

fn sequences_of(v: Vertebra, rows: &[DetectionRow]) -> StudySequences {
    let mut hits: Vec<(&str, i64)> = rows
        .iter()
        .filter(|r| r.detected().is_some_and(|d| d.contains(v)))
        .map(|r| (r.study_id(), r.slice_index()))
        .collect();
    hits.sort();

    let mut out = StudySequences::new();
    for (study, group) in &hits.into_iter().group_by(|(study, _)| *study) {
        out.insert(study.to_owned(), group.map(|(_, i)| i).collect());
    }
    out
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

        /// 借助 `rayon`, 按标签并行地提取序列. 结果与 [`extract_sequences`] 相同.
        pub fn par_extract_sequences(table: &DetectionTable) -> SequenceMap {
            SequenceMap {
                inner: VERTEBRAE[..]
                    .par_iter()
                    .map(|&v| (v, sequences_of(v, table.rows())))
                    .collect(),
            }
        }
    }
}
