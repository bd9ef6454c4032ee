//! 对比度受限的自适应直方图均衡.
//!
//! 图像被划分为 `CLAHE_GRID x CLAHE_GRID` 个网格 (单个网格边长至少为 1 像素),
//! 每个网格各自统计裁剪后的直方图并得到灰度映射, 像素的最终值由相邻四个网格中心的映射
//! 双线性插值而来.

use ndarray::{s, Array2, ArrayView2};

use crate::consts::defaults::{CLAHE_BINS, CLAHE_GRID};

/// 对 `[0, 1]` 内的图像做 CLAHE, 结果仍在 `[0, 1]` 内.
pub(super) fn equalize_adapthist(img: ArrayView2<f32>, clip_limit: f64) -> Array2<f32> {
    let (h, w) = img.dim();
    if h == 0 || w == 0 {
        return img.to_owned();
    }

    let (kh, kw) = ((h / CLAHE_GRID).max(1), (w / CLAHE_GRID).max(1));
    let (ny, nx) = (h.div_ceil(kh), w.div_ceil(kw));
    let binned = img.mapv(|v| to_bin(v, CLAHE_BINS));

    let mut maps = Vec::with_capacity(ny * nx);
    for ty in 0..ny {
        for tx in 0..nx {
            let tile = binned.slice(s![
                ty * kh..((ty + 1) * kh).min(h),
                tx * kw..((tx + 1) * kw).min(w)
            ]);
            maps.push(tile_mapping(tile.iter().copied(), tile.len(), clip_limit));
        }
    }

    let cy: Vec<f64> = (0..ny).map(|t| tile_center(t, kh, h)).collect();
    let cx: Vec<f64> = (0..nx).map(|t| tile_center(t, kw, w)).collect();

    Array2::from_shape_fn((h, w), |(r, c)| {
        let (y0, y1, fy) = bracket(&cy, r as f64);
        let (x0, x1, fx) = bracket(&cx, c as f64);
        let bin = binned[(r, c)];
        let m = |ty: usize, tx: usize| maps[ty * nx + tx][bin] as f64;

        let top = (1.0 - fx) * m(y0, x0) + fx * m(y0, x1);
        let bottom = (1.0 - fx) * m(y1, x0) + fx * m(y1, x1);
        (((1.0 - fy) * top + fy * bottom) as f32).clamp(0.0, 1.0)
    })
}

/// `[0, 1]` 内的值所在的直方图分箱. NaN 和负数落在第一个分箱.
#[inline]
fn to_bin(v: f32, bins: usize) -> usize {
    if v > 0.0 {
        ((v as f64 * bins as f64) as usize).min(bins - 1)
    } else {
        0
    }
}

/// 第 `t` 个网格中心的坐标. 最后一个网格可能不满.
#[inline]
fn tile_center(t: usize, k: usize, len: usize) -> f64 {
    let start = t * k;
    let end = ((t + 1) * k).min(len);
    (start + end - 1) as f64 / 2.0
}

/// 在升序的网格中心 `centers` 中找到夹住 `p` 的两个网格, 以及 `p` 靠近第二个网格的权重.
///
/// 位于第一个中心之前或最后一个中心之后时, 两个网格相同, 权重为 0.
fn bracket(centers: &[f64], p: f64) -> (usize, usize, f64) {
    let i = centers.partition_point(|&c| c <= p);
    if i == 0 {
        return (0, 0, 0.0);
    }
    if i == centers.len() {
        let last = centers.len() - 1;
        return (last, last, 0.0);
    }
    let (a, b) = (centers[i - 1], centers[i]);
    (i - 1, i, (p - a) / (b - a))
}

/// 由网格内像素的分箱 `it` (共 `n` 个) 计算灰度映射, 映射值在 `[0, 1]` 内.
fn tile_mapping<I: Iterator<Item = usize>>(it: I, n: usize, clip_limit: f64) -> Vec<f32> {
    let mut hist = vec![0usize; CLAHE_BINS];
    for bin in it {
        hist[bin] += 1;
    }

    let clip = ((clip_limit * n as f64) as usize).max(1);
    clip_histogram(&mut hist, clip);

    let mut acc = 0usize;
    hist.iter()
        .map(|&count| {
            acc += count;
            acc as f32 / n as f32
        })
        .collect()
}

/// 将超过 `clip` 的部分截下, 均匀地分给所有分箱. 总数不变.
fn clip_histogram(hist: &mut [usize], clip: usize) {
    let mut excess = 0usize;
    for count in hist.iter_mut().filter(|c| **c > clip) {
        excess += *count - clip;
        *count = clip;
    }

    let (each, rest) = (excess / hist.len(), excess % hist.len());
    for (i, count) in hist.iter_mut().enumerate() {
        *count += each + usize::from(i < rest);
    }
}
