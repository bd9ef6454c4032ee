//! 二维离散小波变换.
//!
//! 分解时边界采用半采样对称延拓, 长度为 `N` 的序列经滤波器长度为 `F` 的单层分解后,
//! 近似系数与细节系数的长度都是 `(N + F - 1) / 2`; 单层重建的长度为 `2N - F + 2`.
//! 多层重建时, 若上一层的近似系数比本层细节系数多出一行/列, 先裁掉多余部分.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use ndarray::{s, Array2, ArrayView1, ArrayView2, ArrayViewMut1, Axis};

use super::symmetric_index;
use crate::{Idx2d, SpineError};

/// 支持的正交小波.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Wavelet {
    /// Haar 小波, 即 `db1`.
    Haar,
    /// Daubechies 2, 与 `sym2` 相同.
    Db2,
    /// Daubechies 3, 与 `sym3` 相同.
    Db3,
    /// Daubechies 4.
    Db4,
    /// Symlet 4.
    Sym4,
}

/// 各小波的重建低通滤波器.
mod coeffs {
    pub const HAAR: [f64; 2] = [
        std::f64::consts::FRAC_1_SQRT_2,
        std::f64::consts::FRAC_1_SQRT_2,
    ];

    pub const DB2: [f64; 4] = [
        0.48296291314469025,
        0.836516303737469,
        0.22414386804185735,
        -0.12940952255092145,
    ];

    pub const DB3: [f64; 6] = [
        0.3326705529509569,
        0.8068915093133388,
        0.4598775021193313,
        -0.13501102001039084,
        -0.08544127388224149,
        0.035226291882100656,
    ];

    pub const DB4: [f64; 8] = [
        0.23037781330885523,
        0.7148465705525415,
        0.6308807679295904,
        -0.02798376941698385,
        -0.18703481171888114,
        0.030841381835986965,
        0.032883011666982945,
        -0.010597401784997278,
    ];

    pub const SYM4: [f64; 8] = [
        0.0322231006040427,
        -0.012603967262037833,
        -0.09921954357684722,
        0.29785779560527736,
        0.8037387518059161,
        0.49761866763201545,
        -0.02963552764599851,
        -0.07576571478927333,
    ];
}

impl Wavelet {
    /// 小波名.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Haar => "haar",
            Self::Db2 => "db2",
            Self::Db3 => "db3",
            Self::Db4 => "db4",
            Self::Sym4 => "sym4",
        }
    }

    /// 滤波器长度.
    #[inline]
    pub fn filter_len(self) -> usize {
        self.rec_lo().len()
    }

    fn rec_lo(self) -> &'static [f64] {
        match self {
            Self::Haar => &coeffs::HAAR,
            Self::Db2 => &coeffs::DB2,
            Self::Db3 => &coeffs::DB3,
            Self::Db4 => &coeffs::DB4,
            Self::Sym4 => &coeffs::SYM4,
        }
    }
}

impl Display for Wavelet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Wavelet {
    type Err = SpineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "haar" | "db1" => Ok(Self::Haar),
            "db2" | "sym2" => Ok(Self::Db2),
            "db3" | "sym3" => Ok(Self::Db3),
            "db4" => Ok(Self::Db4),
            "sym4" => Ok(Self::Sym4),
            other => Err(SpineError::Configuration(format!(
                "unsupported wavelet `{other}`"
            ))),
        }
    }
}

/// 一层二维分解的三个细节子带, 形状相同.
struct Details {
    lh: Array2<f64>,
    hl: Array2<f64>,
    hh: Array2<f64>,
}

impl Details {
    #[inline]
    fn shape(&self) -> Idx2d {
        self.lh.dim()
    }
}

/// 分解/重建滤波器组.
struct FilterBank {
    dec_lo: Vec<f64>,
    dec_hi: Vec<f64>,
    rec_lo: &'static [f64],
    rec_hi: Vec<f64>,
}

impl FilterBank {
    fn new(wavelet: Wavelet) -> Self {
        let rec_lo = wavelet.rec_lo();
        let f = rec_lo.len();
        // 正交镜像滤波器: rec_hi[k] = (-1)^k * rec_lo[F - 1 - k].
        let rec_hi: Vec<f64> = (0..f)
            .map(|k| {
                let v = rec_lo[f - 1 - k];
                if k % 2 == 0 {
                    v
                } else {
                    -v
                }
            })
            .collect();
        Self {
            dec_lo: rec_lo.iter().rev().copied().collect(),
            dec_hi: rec_hi.iter().rev().copied().collect(),
            rec_lo,
            rec_hi,
        }
    }

    #[inline]
    fn len(&self) -> usize {
        self.rec_lo.len()
    }

    /// 单层分解输出长度.
    #[inline]
    fn dwt_len(&self, n: usize) -> usize {
        (n + self.len() - 1) / 2
    }

    /// 单层重建输出长度.
    #[inline]
    fn idwt_len(&self, n: usize) -> usize {
        (2 * n + 2).saturating_sub(self.len())
    }

    /// 一维单层分解, 结果写入 `lo` 和 `hi`.
    fn dwt(&self, x: ArrayView1<f64>, mut lo: ArrayViewMut1<f64>, mut hi: ArrayViewMut1<f64>) {
        let n = x.len();
        for o in 0..lo.len() {
            let i = (2 * o + 1) as isize;
            let (mut a, mut d) = (0.0, 0.0);
            for (j, (fl, fh)) in self.dec_lo.iter().zip(self.dec_hi.iter()).enumerate() {
                let v = x[symmetric_index(i - j as isize, n)];
                a += fl * v;
                d += fh * v;
            }
            lo[o] = a;
            hi[o] = d;
        }
    }

    /// 一维单层重建, 结果写入 `out`.
    fn idwt(&self, lo: ArrayView1<f64>, hi: ArrayView1<f64>, mut out: ArrayViewMut1<f64>) {
        let f = self.len();
        for t in 0..out.len() {
            // 完整卷积的第 `t + F - 2` 项.
            let k = t + f - 2;
            let first = (k + 1).saturating_sub(f).div_ceil(2);
            let last = (k / 2).min(lo.len().saturating_sub(1));
            let mut acc = 0.0;
            for n in first..=last {
                let m = k - 2 * n;
                acc += lo[n] * self.rec_lo[m] + hi[n] * self.rec_hi[m];
            }
            out[t] = acc;
        }
    }

    /// 沿 `axis` 做单层分解.
    fn dwt_axis(&self, x: ArrayView2<f64>, axis: Axis) -> (Array2<f64>, Array2<f64>) {
        let mut dim = x.raw_dim();
        dim[axis.index()] = self.dwt_len(x.len_of(axis));
        let mut lo = Array2::zeros(dim.clone());
        let mut hi = Array2::zeros(dim);
        for ((lane, l), h) in x
            .lanes(axis)
            .into_iter()
            .zip(lo.lanes_mut(axis))
            .zip(hi.lanes_mut(axis))
        {
            self.dwt(lane, l, h);
        }
        (lo, hi)
    }

    /// 沿 `axis` 做单层重建. `lo` 和 `hi` 形状必须相同.
    fn idwt_axis(&self, lo: &Array2<f64>, hi: &Array2<f64>, axis: Axis) -> Array2<f64> {
        debug_assert_eq!(lo.dim(), hi.dim());
        let mut dim = lo.raw_dim();
        dim[axis.index()] = self.idwt_len(lo.len_of(axis));
        let mut out = Array2::zeros(dim);
        for ((l, h), o) in lo
            .lanes(axis)
            .into_iter()
            .zip(hi.lanes(axis))
            .zip(out.lanes_mut(axis))
        {
            self.idwt(l, h, o);
        }
        out
    }

    /// 二维单层分解: 先沿宽, 再沿高.
    fn dwt2(&self, x: ArrayView2<f64>) -> (Array2<f64>, Details) {
        let (l, h) = self.dwt_axis(x, Axis(1));
        let (ll, lh) = self.dwt_axis(l.view(), Axis(0));
        let (hl, hh) = self.dwt_axis(h.view(), Axis(0));
        (ll, Details { lh, hl, hh })
    }

    /// 二维单层重建: 先沿高, 再沿宽.
    fn idwt2(&self, ll: &Array2<f64>, d: &Details) -> Array2<f64> {
        let l = self.idwt_axis(ll, &d.lh, Axis(0));
        let h = self.idwt_axis(&d.hl, &d.hh, Axis(0));
        self.idwt_axis(&l, &h, Axis(1))
    }
}

/// 裁剪到左上角 `shape` 大小. `shape` 不能超过 `a` 的形状.
fn crop(a: Array2<f64>, shape: Idx2d) -> Array2<f64> {
    if a.dim() == shape {
        a
    } else {
        a.slice(s![..shape.0, ..shape.1]).to_owned()
    }
}

/// `level` 层分解后完整重建, 并裁剪回 `img` 的形状. 不做数值裁剪.
pub(super) fn round_trip(img: ArrayView2<f32>, wavelet: Wavelet, level: usize) -> Array2<f32> {
    let shape = img.dim();
    if shape.0 == 0 || shape.1 == 0 {
        return img.to_owned();
    }

    let bank = FilterBank::new(wavelet);
    let mut approx = img.mapv(f64::from);
    let mut details = Vec::with_capacity(level);
    for _ in 0..level {
        let (a, d) = bank.dwt2(approx.view());
        details.push(d);
        approx = a;
    }

    for d in details.iter().rev() {
        approx = bank.idwt2(&crop(approx, d.shape()), d);
    }
    crop(approx, shape).mapv(|v| v as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array1;

    const ALL: [Wavelet; 5] = [
        Wavelet::Haar,
        Wavelet::Db2,
        Wavelet::Db3,
        Wavelet::Db4,
        Wavelet::Sym4,
    ];

    #[test]
    fn test_parse_names() {
        assert_eq!("db1".parse::<Wavelet>().unwrap(), Wavelet::Haar);
        assert_eq!("HAAR".parse::<Wavelet>().unwrap(), Wavelet::Haar);
        assert_eq!("sym2".parse::<Wavelet>().unwrap(), Wavelet::Db2);
        assert_eq!("sym3".parse::<Wavelet>().unwrap(), Wavelet::Db3);
        assert!(matches!(
            "coif1".parse::<Wavelet>(),
            Err(SpineError::Configuration(_))
        ));
        for w in ALL {
            assert_eq!(w.name().parse::<Wavelet>().unwrap(), w);
        }
    }

    #[test]
    fn test_filters_orthonormal() {
        for w in ALL {
            let bank = FilterBank::new(w);
            let norm: f64 = bank.rec_lo.iter().map(|v| v * v).sum();
            let total: f64 = bank.rec_lo.iter().sum();
            assert!((norm - 1.0).abs() < 1e-9, "{w}");
            assert!((total - std::f64::consts::SQRT_2).abs() < 1e-9, "{w}");
            assert!(bank.dec_hi.iter().sum::<f64>().abs() < 1e-9, "{w}");
        }
    }

    #[test]
    fn test_haar_1d_values() {
        let bank = FilterBank::new(Wavelet::Haar);
        let x = Array1::from(vec![1.0, 3.0]);
        let (mut lo, mut hi) = (Array1::zeros(1), Array1::zeros(1));
        bank.dwt(x.view(), lo.view_mut(), hi.view_mut());
        assert!((lo[0] - 4.0 / std::f64::consts::SQRT_2).abs() < 1e-12);
        assert!((hi[0] + 2.0 / std::f64::consts::SQRT_2).abs() < 1e-12);
    }

    #[test]
    fn test_lengths() {
        let bank = FilterBank::new(Wavelet::Db4);
        assert_eq!(bank.dwt_len(1), 4);
        assert_eq!(bank.dwt_len(13), 10);
        assert_eq!(bank.idwt_len(10), 14);
        assert_eq!(bank.idwt_len(4), 2);
    }

    #[test]
    fn test_perfect_reconstruction() {
        for w in ALL {
            for (h, wd) in [(1, 1), (2, 3), (8, 8), (13, 5)] {
                let img = Array2::from_shape_fn((h, wd), |(y, x)| {
                    ((y * 7 + x * 13) % 11) as f32 - 5.0
                });
                let out = round_trip(img.view(), w, 3);
                assert_eq!(out.dim(), (h, wd));
                for (a, b) in out.iter().zip(img.iter()) {
                    assert!((a - b).abs() < 1e-4, "{w} {h}x{wd}: {a} vs {b}");
                }
            }
        }
    }

    #[test]
    fn test_level_zero_is_identity() {
        let img = Array2::from_shape_fn((4, 6), |(y, x)| (y * x) as f32);
        assert_eq!(round_trip(img.view(), Wavelet::Db2, 0), img);
    }
}
