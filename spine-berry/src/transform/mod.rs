//! 单个二维切片上的无状态变换.
//!
//! 三个变换互相独立, 都不修改输入, 且输出形状与输入完全相同.
//! 输入可以是任意维数的数组视图, 但不是二维时返回 `SpineError::Shape`.
//!
//! 每个变换只负责自己那一段的数值范围:
//!
//! 1. [`equalize_contrast`] 的输出落在输入切片原本的 `[min, max]` 内;
//! 2. [`enhance_edges`] 的输出没有范围约束 (可以为负);
//! 3. [`wavelet_round_trip`] 的输出被裁剪回输入切片的 `[min, max]`.

mod clahe;
mod laplace;
mod wavelet;

use ndarray::{Array2, ArrayView, Dimension};

use crate::consts::EPSILON;
use crate::data::min_max;
use crate::error::expect_2d;
use crate::{SpineError, SpineResult};

pub use wavelet::Wavelet;

/// 对比度受限的自适应直方图均衡 (CLAHE).
///
/// 切片先按自身 (最小值, 最大值) 归一化到 `[0, 1]` (分母加 [`EPSILON`]),
/// 均衡后再映射回原强度范围. 常数切片会得到一个处处相同的输出.
///
/// `clip_limit` 必须在 `(0, 1]` 内, 否则返回 `SpineError::Configuration`.
pub fn equalize_contrast<D: Dimension>(
    slice: ArrayView<'_, f32, D>,
    clip_limit: f64,
) -> SpineResult<Array2<f32>> {
    let slice = expect_2d(slice)?;
    check_clip_limit(clip_limit)?;

    let Some((lo, hi)) = min_max(slice.iter()) else {
        return Ok(slice.to_owned());
    };
    let range = hi - lo;
    let normalized = slice.mapv(|v| (v - lo) / (range + EPSILON));
    let equalized = clahe::equalize_adapthist(normalized.view(), clip_limit);
    Ok(equalized.mapv(|v| v * range + lo))
}

/// 高斯-拉普拉斯 (LoG) 边缘增强, 标准差为 `sigma`.
///
/// 输出不做范围约束. `sigma` 必须为正的有限值, 否则返回 `SpineError::Configuration`.
pub fn enhance_edges<D: Dimension>(
    slice: ArrayView<'_, f32, D>,
    sigma: f64,
) -> SpineResult<Array2<f32>> {
    let slice = expect_2d(slice)?;
    check_sigma(sigma)?;
    Ok(laplace::gaussian_laplace(slice, sigma))
}

/// 多级二维小波分解, 紧接着完整重建.
///
/// 重建结果先裁剪到输入切片的精确尺寸, 再把值裁剪到输入切片的 `[min, max]`.
/// `level == 0` 时不做任何分解.
pub fn wavelet_round_trip<D: Dimension>(
    slice: ArrayView<'_, f32, D>,
    wavelet: Wavelet,
    level: usize,
) -> SpineResult<Array2<f32>> {
    let slice = expect_2d(slice)?;
    let Some((lo, hi)) = min_max(slice.iter()) else {
        return Ok(slice.to_owned());
    };
    let reconstructed = wavelet::round_trip(slice, wavelet, level);
    Ok(reconstructed.mapv(|v| v.clamp(lo, hi)))
}

/// 检查 CLAHE 裁剪上限.
pub(crate) fn check_clip_limit(clip_limit: f64) -> SpineResult<()> {
    if clip_limit > 0.0 && clip_limit <= 1.0 {
        Ok(())
    } else {
        Err(SpineError::Configuration(format!(
            "clahe clip limit must be in (0, 1], got {clip_limit}"
        )))
    }
}

/// 检查 LoG 标准差.
pub(crate) fn check_sigma(sigma: f64) -> SpineResult<()> {
    if sigma.is_finite() && sigma > 0.0 {
        Ok(())
    } else {
        Err(SpineError::Configuration(format!(
            "log sigma must be a positive finite number, got {sigma}"
        )))
    }
}

/// 半采样对称延拓 (`d c b a | a b c d | d c b a`) 下, 下标 `i` 对应的实际下标.
///
/// `n` 为序列长度, 必须非零.
#[inline]
pub(crate) fn symmetric_index(i: isize, n: usize) -> usize {
    debug_assert_ne!(n, 0);
    let m = i.rem_euclid(2 * n as isize) as usize;
    if m < n {
        m
    } else {
        2 * n - 1 - m
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array3};

    /// 构造一张带有亮方块的斜坡图.
    fn phantom(h: usize, w: usize) -> Array2<f32> {
        Array2::from_shape_fn((h, w), |(y, x)| {
            let ramp = (y * 3 + x * 2) as f32 * 4.0 - 200.0;
            let block = if (h / 3..2 * h / 3).contains(&y) && (w / 3..2 * w / 3).contains(&x) {
                700.0
            } else {
                0.0
            };
            ramp + block
        })
    }

    fn within(a: &Array2<f32>, lo: f32, hi: f32) -> bool {
        const TOL: f32 = 1e-3;
        a.iter().all(|&v| v >= lo - TOL && v <= hi + TOL)
    }

    #[test]
    fn test_symmetric_index() {
        let n = 4;
        let got: Vec<usize> = (-5..9).map(|i| symmetric_index(i, n)).collect();
        assert_eq!(got, [3, 3, 2, 1, 0, 0, 1, 2, 3, 3, 2, 1, 0, 0]);
        assert!((-3..3).all(|i| symmetric_index(i, 1) == 0));
    }

    #[test]
    fn test_non_2d_input_rejected() {
        let v = Array3::<f32>::zeros((2, 4, 4));
        let l = Array1::<f32>::zeros(4);
        assert!(matches!(
            equalize_contrast(v.view(), 0.01),
            Err(SpineError::Shape { expected: 2, found: 3 })
        ));
        assert!(matches!(
            enhance_edges(l.view(), 1.0),
            Err(SpineError::Shape { expected: 2, found: 1 })
        ));
        assert!(matches!(
            wavelet_round_trip(v.view(), Wavelet::Haar, 1),
            Err(SpineError::Shape { expected: 2, found: 3 })
        ));
    }

    #[test]
    fn test_dynamic_2d_input_accepted() {
        let s = phantom(8, 8).into_dyn();
        assert_eq!(equalize_contrast(s.view(), 0.01).unwrap().dim(), (8, 8));
    }

    #[test]
    fn test_invalid_parameters() {
        let s = phantom(8, 8);
        assert!(matches!(
            equalize_contrast(s.view(), 0.0),
            Err(SpineError::Configuration(_))
        ));
        assert!(matches!(
            equalize_contrast(s.view(), 1.5),
            Err(SpineError::Configuration(_))
        ));
        assert!(matches!(
            enhance_edges(s.view(), 0.0),
            Err(SpineError::Configuration(_))
        ));
        assert!(matches!(
            enhance_edges(s.view(), f64::NAN),
            Err(SpineError::Configuration(_))
        ));
    }

    #[test]
    fn test_equalize_range_and_shape() {
        for (h, w) in [(16, 16), (23, 41), (3, 2), (1, 9)] {
            let s = phantom(h, w);
            let (lo, hi) = min_max(s.iter()).unwrap();
            for clip in [0.01, 0.1, 1.0] {
                let out = equalize_contrast(s.view(), clip).unwrap();
                assert_eq!(out.dim(), (h, w));
                assert!(within(&out, lo, hi));
            }
        }
    }

    #[test]
    fn test_equalize_deterministic() {
        let s = phantom(20, 17);
        let a = equalize_contrast(s.view(), 0.03).unwrap();
        let b = equalize_contrast(s.view(), 0.03).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_equalize_constant_slice() {
        let s = Array2::from_elem((12, 12), 42.0f32);
        let out = equalize_contrast(s.view(), 0.01).unwrap();
        assert!(out.iter().all(|v| v.is_finite()));
        let first = out[(0, 0)];
        assert!(out.iter().all(|&v| v == first));
        assert!((first - 42.0).abs() < 1e-3);
    }

    #[test]
    fn test_equalize_keeps_order_of_extremes() {
        // 全图最亮点 (方块右下角) 均衡后仍比最暗点 (左上角) 更亮.
        let s = phantom(24, 24);
        let out = equalize_contrast(s.view(), 0.05).unwrap();
        assert!(out[(15, 15)] > out[(0, 0)]);
    }

    #[test]
    fn test_edges_constant_is_flat() {
        let s = Array2::from_elem((15, 15), 1.0f32);
        let out = enhance_edges(s.view(), 1.0).unwrap();
        assert_eq!(out.dim(), (15, 15));
        assert!(out.iter().all(|v| v.abs() < 1e-3));
    }

    #[test]
    fn test_edges_point_response() {
        let mut s = Array2::<f32>::zeros((21, 21));
        s[(10, 10)] = 1.0;
        let out = enhance_edges(s.view(), 1.5).unwrap();

        // 亮点中心为负, 且为全局最小值.
        let center = out[(10, 10)];
        assert!(center < 0.0);
        assert!(out.iter().all(|&v| v >= center));

        // 响应旋转对称.
        assert!((out[(10, 13)] - out[(13, 10)]).abs() < 1e-6);
        assert!((out[(7, 10)] - out[(13, 10)]).abs() < 1e-6);
    }

    #[test]
    fn test_edges_may_be_negative() {
        let s = phantom(16, 16);
        let out = enhance_edges(s.view(), 1.0).unwrap();
        assert!(out.iter().any(|&v| v < 0.0));
    }

    #[test]
    fn test_wavelet_bounds_and_shape() {
        let names = ["haar", "db2", "db3", "db4", "sym4"];
        for (h, w) in [(16, 16), (13, 29), (5, 3), (1, 1)] {
            let s = phantom(h, w);
            let (lo, hi) = min_max(s.iter()).unwrap();
            for name in names {
                for level in 0..=3 {
                    let out = wavelet_round_trip(s.view(), name.parse().unwrap(), level).unwrap();
                    assert_eq!(out.dim(), (h, w));
                    assert!(out.iter().all(|&v| v >= lo && v <= hi));
                }
            }
        }
    }

    #[test]
    fn test_wavelet_near_reconstruction() {
        let s = phantom(17, 12);
        for name in ["haar", "db2", "sym4"] {
            let out = wavelet_round_trip(s.view(), name.parse().unwrap(), 2).unwrap();
            for (a, b) in out.iter().zip(s.iter()) {
                assert!((a - b).abs() < 1e-2, "{name}: {a} vs {b}");
            }
        }
    }
}
