//! 运行时错误.

use ndarray::{ArrayView, Dimension, Ix2, Ix3};
use thiserror::Error;

/// 核心流程与 I/O 边界的运行时错误.
///
/// 核心流程本身只会产生 `Shape`, `MissingColumn` 和 `Configuration` 三类错误,
/// 其余变体都来自外部读写.
#[derive(Debug, Error)]
pub enum SpineError {
    /// 数组维数不符合操作约定.
    #[error("expected a {expected}-dimensional array, found {found} dimension(s)")]
    Shape {
        /// 操作要求的维数.
        expected: usize,
        /// 实际给出的维数.
        found: usize,
    },

    /// 输入行或表缺少必需的概率列或标识列.
    #[error("missing column: {0}")]
    MissingColumn(String),

    /// 配置缺失或取值非法.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// 底层 I/O 错误.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// 读取 nifti 文件错误.
    #[error("nifti error: {0}")]
    Nifti(#[from] nifti::NiftiError),

    /// 读取 npy 文件错误.
    #[error("npy read error: {0}")]
    ReadNpy(#[from] ndarray_npy::ReadNpyError),

    /// 写入 npy 文件错误.
    #[error("npy write error: {0}")]
    WriteNpy(#[from] ndarray_npy::WriteNpyError),

    /// 图像保存错误.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// CSV 读写错误.
    #[cfg(feature = "serde")]
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON 序列化错误.
    #[cfg(feature = "serde")]
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SpineError {
    /// 该错误是否来自外部读写边界.
    pub fn is_io(&self) -> bool {
        !matches!(
            self,
            Self::Shape { .. } | Self::MissingColumn(_) | Self::Configuration(_)
        )
    }
}

/// 核心流程运行时结果.
pub type SpineResult<T> = Result<T, SpineError>;

/// 将任意维数组视图收窄为二维, 维数不符时返回 `SpineError::Shape`.
pub(crate) fn expect_2d<'a, A, D: Dimension>(
    a: ArrayView<'a, A, D>,
) -> SpineResult<ArrayView<'a, A, Ix2>> {
    let found = a.ndim();
    a.into_dimensionality::<Ix2>()
        .map_err(|_| SpineError::Shape { expected: 2, found })
}

/// 将任意维数组视图收窄为三维, 维数不符时返回 `SpineError::Shape`.
pub(crate) fn expect_3d<'a, A, D: Dimension>(
    a: ArrayView<'a, A, D>,
) -> SpineResult<ArrayView<'a, A, Ix3>> {
    let found = a.ndim();
    a.into_dimensionality::<Ix3>()
        .map_err(|_| SpineError::Shape { expected: 3, found })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array2, Array3};

    #[test]
    fn test_expect_dims() {
        let a = Array2::<f32>::zeros((2, 3));
        assert!(expect_2d(a.view()).is_ok());
        assert!(matches!(
            expect_3d(a.view()),
            Err(SpineError::Shape {
                expected: 3,
                found: 2
            })
        ));

        let b = Array3::<f32>::zeros((1, 2, 3)).into_dyn();
        assert!(expect_3d(b.view()).is_ok());

        let c = Array1::<f32>::zeros(4);
        assert!(matches!(
            expect_2d(c.view()),
            Err(SpineError::Shape {
                expected: 2,
                found: 1
            })
        ));
    }

    #[test]
    fn test_error_category() {
        assert!(!SpineError::MissingColumn("C1".into()).is_io());
        assert!(!SpineError::Configuration("x".into()).is_io());
        assert!(SpineError::Io(std::io::Error::other("x")).is_io());
    }
}
