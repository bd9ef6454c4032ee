//! 高斯-拉普拉斯滤波.
//!
//! 两个方向的二阶高斯导数响应之和. 每个方向都是可分离的一维相关运算,
//! 边界采用半采样对称延拓.

use ndarray::{Array2, ArrayView2, Axis};

use super::symmetric_index;
use crate::consts::defaults::LOG_TRUNCATE;

/// 对 `img` 做标准差为 `sigma` 的 LoG 滤波. `sigma` 必须为正.
pub(super) fn gaussian_laplace(img: ArrayView2<f32>, sigma: f64) -> Array2<f32> {
    let radius = (LOG_TRUNCATE * sigma + 0.5) as usize;
    let smooth = gaussian_kernel(sigma, radius);
    let second = second_derivative_kernel(sigma, radius);

    let src = img.mapv(f64::from);
    let d_hh = correlate_axis(&correlate_axis(&src, &second, Axis(0)), &smooth, Axis(1));
    let d_ww = correlate_axis(&correlate_axis(&src, &smooth, Axis(0)), &second, Axis(1));
    (d_hh + d_ww).mapv(|v| v as f32)
}

/// 长度为 `2 * radius + 1` 的归一化高斯核.
fn gaussian_kernel(sigma: f64, radius: usize) -> Vec<f64> {
    let s2 = sigma * sigma;
    let r = radius as isize;
    let phi: Vec<f64> = (-r..=r)
        .map(|x| (-0.5 / s2 * (x * x) as f64).exp())
        .collect();
    let total: f64 = phi.iter().sum();
    phi.into_iter().map(|p| p / total).collect()
}

/// 长度为 `2 * radius + 1` 的高斯二阶导数核: `phi(x) * (x^2 / s^4 - 1 / s^2)`.
fn second_derivative_kernel(sigma: f64, radius: usize) -> Vec<f64> {
    let s2 = sigma * sigma;
    let r = radius as isize;
    gaussian_kernel(sigma, radius)
        .into_iter()
        .zip(-r..=r)
        .map(|(p, x)| p * ((x * x) as f64 / (s2 * s2) - 1.0 / s2))
        .collect()
}

/// 沿 `axis` 方向, 以 `kernel` (长度为奇数, 中心对齐) 对 `src` 做一维相关.
fn correlate_axis(src: &Array2<f64>, kernel: &[f64], axis: Axis) -> Array2<f64> {
    let radius = (kernel.len() / 2) as isize;
    let mut out = Array2::zeros(src.raw_dim());
    for (lane, mut dst) in src.lanes(axis).into_iter().zip(out.lanes_mut(axis)) {
        let n = lane.len();
        for i in 0..n {
            dst[i] = kernel
                .iter()
                .enumerate()
                .map(|(k, &c)| c * lane[symmetric_index(i as isize + k as isize - radius, n)])
                .sum();
        }
    }
    out
}
