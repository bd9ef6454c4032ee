use ndarray::iter::Iter;
use ndarray::{Array2, ArrayView2, Ix2};
use std::ops::Index;

use crate::Idx2d;

/// 求 `it` 中所有值的 (最小值, 最大值). NaN 会被忽略, 没有有效值时返回 `None`.
pub(crate) fn min_max<'a, I: IntoIterator<Item = &'a f32>>(it: I) -> Option<(f32, f32)> {
    it.into_iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

/// 不可变、借用的二维水平 CT 切片.
pub struct ScanSlice<'a> {
    /// 底层数据的轻量级视图, 借用于 [`crate::CtVolume`].
    data: ArrayView2<'a, f32>,
}

/// 拥有所有权的二维水平 CT 切片.
#[derive(Debug, Clone, PartialEq)]
pub struct OwnedScanSlice {
    data: Array2<f32>,
}

impl Index<Idx2d> for ScanSlice<'_> {
    type Output = f32;

    #[inline]
    fn index(&self, index: Idx2d) -> &Self::Output {
        &self.data[index]
    }
}

impl Index<Idx2d> for OwnedScanSlice {
    type Output = f32;

    #[inline]
    fn index(&self, index: Idx2d) -> &Self::Output {
        &self.data[index]
    }
}

impl<'a> ScanSlice<'a> {
    /// 直接初始化.
    #[inline]
    pub(crate) fn new(data: ArrayView2<'a, f32>) -> Self {
        Self { data }
    }

    /// 克隆自己, 获得一个拥有所有权的切片对象.
    pub fn to_owned(&self) -> OwnedScanSlice {
        OwnedScanSlice {
            data: self.data.to_owned(),
        }
    }
}

impl From<Array2<f32>> for OwnedScanSlice {
    #[inline]
    fn from(data: Array2<f32>) -> Self {
        Self { data }
    }
}

impl OwnedScanSlice {
    /// 消费自我, 获得底层数组.
    #[inline]
    pub fn into_inner(self) -> Array2<f32> {
        self.data
    }
}

/// scan 不可变方法集合.
macro_rules! impl_scan_slice_immut {
    ($($slice: ty),+) => {
        $(
            /// 不可变方法集合.
            impl $slice {
                /// 获得 **底层** 数据的一份不可变 shallow copy.
                #[inline]
                pub fn array_view(&self) -> ArrayView2<f32> {
                    self.data.view()
                }

                /// 获取可以迭代图像像素的迭代器.
                #[inline]
                pub fn iter(&self) -> Iter<'_, f32, Ix2> {
                    self.data.iter()
                }

                /// 获取给定位置 (高, 宽) 的像素值. 越界时返回 `None`.
                #[inline]
                pub fn get(&self, pos: Idx2d) -> Option<&f32> {
                    self.data.get(pos)
                }

                /// 图像的分辨率 (高, 宽).
                #[inline]
                pub fn shape(&self) -> Idx2d {
                    self.data.dim()
                }

                /// 图像的像素个数.
                #[inline]
                pub fn size(&self) -> usize {
                    let (h, w) = self.shape();
                    h * w
                }

                /// 获得图像的高.
                #[inline]
                pub fn height(&self) -> usize {
                    self.shape().0
                }

                /// 获得图像的宽.
                #[inline]
                pub fn width(&self) -> usize {
                    self.shape().1
                }

                /// 切片的强度范围 (最小值, 最大值). 忽略 NaN.
                #[inline]
                pub fn min_max(&self) -> Option<(f32, f32)> {
                    min_max(self.data.iter())
                }

                /// 获取按 (高, 宽) 索引迭代像素的迭代器.
                #[inline]
                pub fn indexed_iter(&self) -> impl Iterator<Item = (Idx2d, &f32)> {
                    self.data.indexed_iter()
                }
            }
        )+
    };
}

impl_scan_slice_immut!(ScanSlice<'_>, OwnedScanSlice);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_max_skips_nan() {
        let v = [3.0f32, f32::NAN, -1.0, 2.0];
        assert_eq!(min_max(v.iter()), Some((-1.0, 3.0)));
        assert_eq!(min_max([f32::NAN].iter()), None);
        assert_eq!(min_max([].iter()), None);
    }

    #[test]
    fn test_slice_attr() {
        let a = Array2::from_shape_fn((2, 3), |(h, w)| (h * 3 + w) as f32);
        let s = ScanSlice::new(a.view());
        assert_eq!(s.shape(), (2, 3));
        assert_eq!(s.size(), 6);
        assert_eq!(s.height(), 2);
        assert_eq!(s.width(), 3);
        assert_eq!(s[(1, 2)], 5.0);
        assert_eq!(s.get((2, 0)), None);
        assert_eq!(s.min_max(), Some((0.0, 5.0)));

        let owned = s.to_owned();
        assert_eq!(owned.array_view(), a.view());
        assert_eq!(owned.into_inner(), a);
    }
}
