//! 体数据特征工程流程.
//!
//! 对每个水平切片按固定顺序依次执行 CLAHE -> LoG -> 小波重建,
//! 重新堆叠为原形状后再做一次 **全局** min-max 归一化.
//! 切片之间没有任何依赖, 因此可以按切片并行, 结果按切片索引写回而非按完成顺序.

use ndarray::{Array2, Array3, ArrayView, ArrayView2, ArrayView3, Axis, Dimension};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::consts::{defaults, EPSILON};
use crate::data::min_max;
use crate::error::expect_3d;
use crate::transform::{self, Wavelet};
use crate::{CtVolume, SpineResult};

/// 各阶段参数. 缺省的字段取 [`defaults`] 中的值.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct StageConfig {
    /// 小波名, 如 `db1`, `db2`, `sym4`.
    pub wavelet: String,
    /// 小波分解层数.
    pub wavelet_level: usize,
    /// LoG 标准差.
    pub log_sigma: f64,
    /// CLAHE 裁剪上限, `(0, 1]`.
    pub clahe_clip_limit: f64,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            wavelet: defaults::WAVELET.to_owned(),
            wavelet_level: defaults::WAVELET_LEVEL,
            log_sigma: defaults::LOG_SIGMA,
            clahe_clip_limit: defaults::CLAHE_CLIP_LIMIT,
        }
    }
}

/// 体数据处理器. 参数在构造时一次性校验并解析.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct VolumeProcessor {
    clip_limit: f64,
    sigma: f64,
    wavelet: Wavelet,
    level: usize,
}

impl Default for VolumeProcessor {
    fn default() -> Self {
        Self {
            clip_limit: defaults::CLAHE_CLIP_LIMIT,
            sigma: defaults::LOG_SIGMA,
            wavelet: Wavelet::Haar,
            level: defaults::WAVELET_LEVEL,
        }
    }
}

impl VolumeProcessor {
    /// 由 `config` 创建处理器.
    ///
    /// 裁剪上限不在 `(0, 1]` 内, 标准差非正或非有限, 或小波名未知时,
    /// 返回 `SpineError::Configuration`.
    pub fn new(config: &StageConfig) -> SpineResult<Self> {
        transform::check_clip_limit(config.clahe_clip_limit)?;
        transform::check_sigma(config.log_sigma)?;
        Ok(Self {
            clip_limit: config.clahe_clip_limit,
            sigma: config.log_sigma,
            wavelet: config.wavelet.parse()?,
            level: config.wavelet_level,
        })
    }

    /// CLAHE 裁剪上限.
    #[inline]
    pub fn clip_limit(&self) -> f64 {
        self.clip_limit
    }

    /// LoG 标准差.
    #[inline]
    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// 小波.
    #[inline]
    pub fn wavelet(&self) -> Wavelet {
        self.wavelet
    }

    /// 小波分解层数.
    #[inline]
    pub fn level(&self) -> usize {
        self.level
    }

    /// 执行完整流程, 返回形状相同, 取值在 `[0, 1]` 内的新体数据.
    ///
    /// `volume` 不是三维时返回 `SpineError::Shape`.
    pub fn process<D: Dimension>(&self, volume: ArrayView<'_, f32, D>) -> SpineResult<CtVolume> {
        let stacked = map_slices(expect_3d(volume)?, |s| self.process_slice(s))?;
        Ok(normalized(stacked))
    }

    /// 仅对每个切片做 CLAHE.
    pub fn apply_clahe<D: Dimension>(&self, volume: ArrayView<'_, f32, D>) -> SpineResult<CtVolume> {
        map_slices(expect_3d(volume)?, |s| {
            transform::equalize_contrast(s, self.clip_limit)
        })
        .map(CtVolume::new)
    }

    /// 仅对每个切片做 LoG 滤波.
    pub fn apply_log<D: Dimension>(&self, volume: ArrayView<'_, f32, D>) -> SpineResult<CtVolume> {
        map_slices(expect_3d(volume)?, |s| transform::enhance_edges(s, self.sigma)).map(CtVolume::new)
    }

    /// 仅对每个切片做小波分解与重建.
    pub fn apply_wavelet<D: Dimension>(
        &self,
        volume: ArrayView<'_, f32, D>,
    ) -> SpineResult<CtVolume> {
        map_slices(expect_3d(volume)?, |s| {
            transform::wavelet_round_trip(s, self.wavelet, self.level)
        })
        .map(CtVolume::new)
    }

    /// 全局 min-max 归一化到 `[0, 1]`, 分母加 [`EPSILON`].
    ///
    /// 空体数据 (或全为 NaN) 原样返回.
    pub fn normalize<D: Dimension>(volume: ArrayView<'_, f32, D>) -> SpineResult<CtVolume> {
        Ok(normalized(expect_3d(volume)?.to_owned()))
    }

    fn process_slice(&self, slice: ArrayView2<'_, f32>) -> SpineResult<Array2<f32>> {
        let equalized = transform::equalize_contrast(slice, self.clip_limit)?;
        let edges = transform::enhance_edges(equalized.view(), self.sigma)?;
        transform::wavelet_round_trip(edges.view(), self.wavelet, self.level)
    }
}

/// 对每个水平切片做 `op`, 结果按切片索引写回.
fn map_slices<F>(volume: ArrayView3<'_, f32>, op: F) -> SpineResult<Array3<f32>>
where
    F: Fn(ArrayView2<'_, f32>) -> SpineResult<Array2<f32>>,
{
    let mut out = Array3::zeros(volume.raw_dim());
    for (src, mut dst) in volume.axis_iter(Axis(0)).zip(out.axis_iter_mut(Axis(0))) {
        dst.assign(&op(src)?);
    }
    Ok(out)
}

fn normalized(mut data: Array3<f32>) -> CtVolume {
    if let Some((lo, hi)) = min_max(data.iter()) {
        let denom = hi - lo + EPSILON;
        data.mapv_inplace(|v| ((v - lo) / denom).clamp(0.0, 1.0));
    }
    CtVolume::new(data)
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IndexedParallelIterator, IntoParallelIterator, ParallelIterator};
    }
}

/// 并发操作部分
#[cfg(feature = "rayon")]
impl VolumeProcessor {
    /// 借助 `rayon`, 按切片并行地执行完整流程. 结果与 [`Self::process`] 完全相同.
    pub fn par_process<D: Dimension>(&self, volume: ArrayView<'_, f32, D>) -> SpineResult<CtVolume> {
        let stacked = par_map_slices(expect_3d(volume)?, |s| self.process_slice(s))?;
        Ok(normalized(stacked))
    }
}

#[cfg(feature = "rayon")]
fn par_map_slices<F>(volume: ArrayView3<'_, f32>, op: F) -> SpineResult<Array3<f32>>
where
    F: Fn(ArrayView2<'_, f32>) -> SpineResult<Array2<f32>> + Sync + Send,
{
    let mut out = Array3::zeros(volume.raw_dim());
    volume
        .axis_iter(Axis(0))
        .into_par_iter()
        .zip(out.axis_iter_mut(Axis(0)).into_par_iter())
        .try_for_each(|(src, mut dst)| -> SpineResult<()> {
            dst.assign(&op(src)?);
            Ok(())
        })?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SpineError;
    use ndarray::{Array1, Array2};

    fn phantom(z: usize, h: usize, w: usize) -> Array3<f32> {
        Array3::from_shape_fn((z, h, w), |(k, y, x)| {
            let disc = {
                let (dy, dx) = (y as f32 - h as f32 / 2.0, x as f32 - w as f32 / 2.0);
                if dy * dy + dx * dx < (h.min(w) as f32 / 3.0).powi(2) {
                    900.0
                } else {
                    -100.0
                }
            };
            disc + (k * 13 + y * 3 + x) as f32
        })
    }

    #[test]
    fn test_stage_config_default() {
        let c = StageConfig::default();
        assert_eq!(c.wavelet, "db1");
        assert_eq!(c.wavelet_level, 1);
        assert_eq!(c.log_sigma, 1.0);
        assert_eq!(c.clahe_clip_limit, 0.01);
        assert_eq!(VolumeProcessor::new(&c).unwrap(), VolumeProcessor::default());
    }

    #[test]
    fn test_invalid_config() {
        let bad = [
            StageConfig {
                wavelet: "morlet".into(),
                ..Default::default()
            },
            StageConfig {
                log_sigma: -1.0,
                ..Default::default()
            },
            StageConfig {
                clahe_clip_limit: 0.0,
                ..Default::default()
            },
        ];
        for c in bad {
            assert!(matches!(
                VolumeProcessor::new(&c),
                Err(SpineError::Configuration(_))
            ));
        }
    }

    #[test]
    fn test_process_shape_and_range() {
        let p = VolumeProcessor::new(&StageConfig {
            wavelet: "db2".into(),
            wavelet_level: 2,
            ..Default::default()
        })
        .unwrap();
        for shape in [(3, 16, 16), (2, 13, 21), (1, 1, 1)] {
            let v = phantom(shape.0, shape.1, shape.2);
            let out = p.process(v.view()).unwrap();
            assert_eq!(out.shape(), shape);
            assert!(out.data().iter().all(|v| (0.0..=1.0).contains(v)));
        }
    }

    #[test]
    fn test_process_does_not_mutate_input() {
        let v = phantom(2, 10, 10);
        let before = v.clone();
        let _ = VolumeProcessor::default().process(v.view()).unwrap();
        assert_eq!(v, before);
    }

    #[test]
    fn test_process_non_3d_rejected() {
        let p = VolumeProcessor::default();
        let s = Array2::<f32>::zeros((4, 4));
        let l = Array1::<f32>::zeros(4);
        assert!(matches!(
            p.process(s.view()),
            Err(SpineError::Shape { expected: 3, found: 2 })
        ));
        assert!(matches!(
            p.apply_clahe(l.view()),
            Err(SpineError::Shape { expected: 3, found: 1 })
        ));
        assert!(matches!(
            VolumeProcessor::normalize(s.view()),
            Err(SpineError::Shape { expected: 3, found: 2 })
        ));
    }

    #[test]
    fn test_normalize() {
        let v = Array3::from_shape_fn((2, 2, 2), |(z, h, w)| (z * 4 + h * 2 + w) as f32 - 3.0);
        let out = VolumeProcessor::normalize(v.view()).unwrap();
        let (lo, hi) = out.min_max().unwrap();
        assert_eq!(lo, 0.0);
        assert!((hi - 1.0).abs() < 1e-6);

        let flat = Array3::from_elem((2, 3, 3), 5.0f32);
        let out = VolumeProcessor::normalize(flat.view()).unwrap();
        assert!(out.data().iter().all(|&v| v == 0.0));

        let empty = Array3::<f32>::zeros((0, 4, 4));
        assert!(VolumeProcessor::normalize(empty.view()).unwrap().is_empty());
    }

    #[test]
    fn test_single_stages_match_slice_transforms() {
        let v = phantom(3, 12, 9);
        let p = VolumeProcessor::default();
        let clahe = p.apply_clahe(v.view()).unwrap();
        let log = p.apply_log(v.view()).unwrap();
        let wav = p.apply_wavelet(v.view()).unwrap();
        for z in 0..3 {
            let s = v.index_axis(Axis(0), z);
            assert_eq!(
                clahe.data().index_axis(Axis(0), z),
                transform::equalize_contrast(s, p.clip_limit()).unwrap()
            );
            assert_eq!(
                log.data().index_axis(Axis(0), z),
                transform::enhance_edges(s, p.sigma()).unwrap()
            );
            assert_eq!(
                wav.data().index_axis(Axis(0), z),
                transform::wavelet_round_trip(s, p.wavelet(), p.level()).unwrap()
            );
        }
    }

    #[test]
    fn test_chained_stages_equal_process() {
        let v = phantom(2, 11, 14);
        let p = VolumeProcessor::default();
        let a = p.apply_clahe(v.view()).unwrap();
        let b = p.apply_log(a.data()).unwrap();
        let c = p.apply_wavelet(b.data()).unwrap();
        let chained = VolumeProcessor::normalize(c.data()).unwrap();
        assert_eq!(chained, p.process(v.view()).unwrap());
    }

    #[cfg(feature = "rayon")]
    #[test]
    fn test_par_process_same_as_serial() {
        let v = phantom(5, 17, 12);
        let p = VolumeProcessor::new(&StageConfig {
            wavelet: "sym4".into(),
            wavelet_level: 2,
            log_sigma: 1.5,
            clahe_clip_limit: 0.05,
        })
        .unwrap();
        assert_eq!(p.par_process(v.view()).unwrap(), p.process(v.view()).unwrap());
    }
}
