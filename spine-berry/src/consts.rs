//! 通用常量.
//!
//! 椎骨标签集合只在这里定义一次, 检测和序列提取都从这里引用.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::SpineError;

/// 零值域保护. 归一化时分母统一加上该值.
pub const EPSILON: f32 = 1e-8;

/// 研究 (study) 标识列名.
pub const STUDY_COLUMN: &str = "StudyInstanceUID";

/// 切片索引列名.
pub const SLICE_COLUMN: &str = "Slice";

/// 检测结果列名.
pub const DETECTED_COLUMN: &str = "VertebraeDetected";

/// 椎骨标签个数.
pub const VERTEBRA_COUNT: usize = 7;

/// 颈椎椎骨标签.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum Vertebra {
    /// 寰椎.
    C1 = 0,
    /// 枢椎.
    C2,
    /// 第三颈椎.
    C3,
    /// 第四颈椎.
    C4,
    /// 第五颈椎.
    C5,
    /// 第六颈椎.
    C6,
    /// 第七颈椎.
    C7,
}

/// 按 C1 -> C7 排列的全部椎骨标签.
pub const VERTEBRAE: [Vertebra; VERTEBRA_COUNT] = [
    Vertebra::C1,
    Vertebra::C2,
    Vertebra::C3,
    Vertebra::C4,
    Vertebra::C5,
    Vertebra::C6,
    Vertebra::C7,
];

impl Vertebra {
    /// 标签在 [`VERTEBRAE`] 中的位置, `0..7`.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// 标签名, 同时也是概率表中对应的列名.
    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Self::C1 => "C1",
            Self::C2 => "C2",
            Self::C3 => "C3",
            Self::C4 => "C4",
            Self::C5 => "C5",
            Self::C6 => "C6",
            Self::C7 => "C7",
        }
    }
}

impl Display for Vertebra {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Vertebra {
    type Err = SpineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VERTEBRAE
            .into_iter()
            .find(|v| v.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| SpineError::Configuration(format!("unknown vertebra label `{s}`")))
    }
}

/// 特征工程各阶段的默认参数.
pub mod defaults {
    /// 默认小波.
    pub const WAVELET: &str = "db1";

    /// 默认小波分解层数.
    pub const WAVELET_LEVEL: usize = 1;

    /// LoG 滤波默认标准差.
    pub const LOG_SIGMA: f64 = 1.0;

    /// CLAHE 默认裁剪上限.
    pub const CLAHE_CLIP_LIMIT: f64 = 0.01;

    /// CLAHE 直方图分箱数.
    pub const CLAHE_BINS: usize = 256;

    /// CLAHE 每个方向上的网格数. 单个网格边长为图像边长的 `1 / CLAHE_GRID`.
    pub const CLAHE_GRID: usize = 8;

    /// LoG 核截断半径 (以标准差为单位).
    pub const LOG_TRUNCATE: f64 = 4.0;

    /// 默认检测阈值.
    pub const THRESHOLD: f64 = 0.5;
}
