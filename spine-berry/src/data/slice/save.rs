//! 图像的持久化存储.

use crate::{OwnedScanSlice, ScanSlice};
use image::ImageResult;
use std::path::Path;

/// 表明一个可以通过 **可视化友好** 模式持久化存储的图像对象.
///
/// 切片的强度值以切片自身的 (最小值, 最大值) 线性映射到 8-bit 灰度,
/// 因此无论输入是 HU 值还是流程处理后的 `[0, 1]` 特征, 都能直接得到可看的图像.
pub trait ImgWriteVis {
    /// 按照上述可视化规则将图片保存到 `path` 路径.
    fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()>;
}

/// 将 `v` 从 `[lo, hi]` 映射到 `[0, 255]`. 零值域时为黑色, NaN 为黑色.
#[inline]
pub(crate) fn stretch(v: f32, lo: f32, hi: f32) -> u8 {
    let range = hi - lo;
    if range <= 0.0 || v.is_nan() {
        return u8::MIN;
    }
    // 255, not 256.
    (((v - lo) / range).clamp(0.0, 1.0) * 255.0).round() as u8
}

macro_rules! impl_scan_vis {
    ($($scan: ty),+) => {
        $(
            /// 按切片自身强度范围拉伸.
            impl ImgWriteVis for $scan {
                fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
                    let (height, width) = self.shape();
                    let (lo, hi) = self.min_max().unwrap_or((0.0, 0.0));
                    let mut buf = image::GrayImage::new(width as u32, height as u32);
                    for ((h, w), &v) in self.indexed_iter() {
                        buf.put_pixel(w as u32, h as u32, image::Luma([stretch(v, lo, hi)]));
                    }
                    buf.save(path)
                }
            }
        )+
    };
}

impl_scan_vis!(ScanSlice<'_>, OwnedScanSlice);
