use std::io;
use std::ops::Index;
use std::path::Path;

use ndarray::{Array3, ArrayView, ArrayView3, Axis, Dimension, Ix3};
use ndarray_npy::ReadNpyError;
use nifti::{IntoNdArray, NiftiObject, ReaderOptions};

use crate::error::expect_3d;
use crate::{Idx2d, Idx3d, SpineError, SpineResult};

pub mod slice;

pub use slice::{ImgWriteVis, OwnedScanSlice, ScanSlice};

pub(crate) use slice::min_max;

/// 3D CT 体数据, 按 (z, H, W) 存储浮点强度值.
///
/// 所有水平切片共享同一 (H, W) 形状. 流程中的每个阶段都返回新的实例, 不修改输入.
#[derive(Debug, Clone, PartialEq)]
pub struct CtVolume {
    data: Array3<f32>,
}

impl Index<Idx3d> for CtVolume {
    type Output = f32;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl From<Array3<f32>> for CtVolume {
    #[inline]
    fn from(data: Array3<f32>) -> Self {
        Self { data }
    }
}

impl CtVolume {
    /// 直接由 (z, H, W) 数组创建.
    #[inline]
    pub fn new(data: Array3<f32>) -> Self {
        Self { data }
    }

    /// 由任意维数的数组视图创建 (会复制数据).
    ///
    /// 如果 `data` 不是三维的, 返回 `Err(SpineError::Shape)`.
    pub fn from_view<D: Dimension>(data: ArrayView<'_, f32, D>) -> SpineResult<Self> {
        Ok(Self {
            data: expect_3d(data)?.to_owned(),
        })
    }

    /// 打开 3D 体数据文件. 根据扩展名选择格式:
    ///
    /// - `.nii`, `.nii.gz`: nifti 格式, 由 (W, H, z) 转换为 (z, H, W);
    /// - `.npy`: 已按 (z, H, W) 存储的 `f32` 或 `f64` 数组.
    ///
    /// 其他扩展名返回 `io::ErrorKind::InvalidInput`.
    pub fn open<P: AsRef<Path>>(path: P) -> SpineResult<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if name.ends_with(".nii") || name.ends_with(".nii.gz") {
            Self::open_nifti(path)
        } else if name.ends_with(".npy") {
            Self::open_npy(path)
        } else {
            Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unsupported volume file `{}`", path.display()),
            )
            .into())
        }
    }

    fn open_nifti(path: &Path) -> SpineResult<Self> {
        let obj = ReaderOptions::new().read_file(path)?;

        // [W, H, z] -> [z, H, W].
        // hint: 原第一维向下增长, 原第二维向右增长.
        let data = obj.into_volume().into_ndarray::<f32>()?;
        let found = data.ndim();
        let data = data
            .into_dimensionality::<Ix3>()
            .map_err(|_| SpineError::Shape { expected: 3, found })?
            .permuted_axes([2, 1, 0]);

        Ok(Self {
            data: data.as_standard_layout().into_owned(),
        })
    }

    fn open_npy(path: &Path) -> SpineResult<Self> {
        let data = match ndarray_npy::read_npy::<_, Array3<f32>>(path) {
            Ok(data) => data,
            Err(ReadNpyError::WrongDescriptor(_)) => {
                ndarray_npy::read_npy::<_, Array3<f64>>(path)?.mapv(|v| v as f32)
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self { data })
    }

    /// 以 `.npy` 格式保存到 `path`.
    pub fn save_npy<P: AsRef<Path>>(&self, path: P) -> SpineResult<()> {
        ndarray_npy::write_npy(path, &self.data)?;
        Ok(())
    }

    /// 获取数据形状大小.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        self.data.dim()
    }

    /// 获取数据水平切片形状大小.
    #[inline]
    pub fn slice_shape(&self) -> Idx2d {
        let (_, h, w) = self.shape();
        (h, w)
    }

    /// 获取水平切片个数.
    #[inline]
    pub fn len_z(&self) -> usize {
        self.shape().0
    }

    /// 获取数据体素个数.
    #[inline]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// 是否没有任何体素.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 全体素的 (最小值, 最大值). 忽略 NaN; 无有效体素时返回 `None`.
    #[inline]
    pub fn min_max(&self) -> Option<(f32, f32)> {
        min_max(self.data.iter())
    }

    /// 获取 3D 体数据 z 空间的第 `z_index` 层切片视图.
    ///
    /// 当 `z_index` 越界时 panic.
    #[inline]
    pub fn slice_at(&self, z_index: usize) -> ScanSlice<'_> {
        ScanSlice::new(self.data.index_axis(Axis(0), z_index))
    }

    /// 获取能按升序迭代水平切片的迭代器.
    #[inline]
    pub fn slice_iter(&self) -> impl ExactSizeIterator<Item = ScanSlice> {
        self.data.axis_iter(Axis(0)).map(ScanSlice::new)
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView3<'_, f32> {
        self.data.view()
    }

    /// 消费自我, 获得底层数组.
    #[inline]
    pub fn into_inner(self) -> Array3<f32> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn test_volume_basic_attr() {
        let v = CtVolume::new(Array3::from_shape_fn((3, 4, 5), |(z, h, w)| {
            (z * 100 + h * 10 + w) as f32
        }));
        assert_eq!(v.shape(), (3, 4, 5));
        assert_eq!(v.slice_shape(), (4, 5));
        assert_eq!(v.len_z(), 3);
        assert_eq!(v.size(), 60);
        assert_eq!(v[(2, 3, 4)], 234.0);
        assert_eq!(v.min_max(), Some((0.0, 234.0)));
        assert_eq!(v.slice_iter().len(), 3);
        assert_eq!(v.slice_at(1).min_max(), Some((100.0, 134.0)));
    }

    #[test]
    fn test_volume_from_non_3d() {
        let a = Array2::<f32>::zeros((4, 4));
        assert!(matches!(
            CtVolume::from_view(a.view()),
            Err(SpineError::Shape {
                expected: 3,
                found: 2
            })
        ));
    }

    #[test]
    fn test_volume_npy_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("v.npy");
        let v = CtVolume::new(Array3::from_shape_fn((2, 3, 3), |(z, h, w)| {
            (z + h + w) as f32 * 0.5
        }));
        v.save_npy(&path).unwrap();
        assert_eq!(CtVolume::open(&path).unwrap(), v);
    }

    #[test]
    fn test_volume_unknown_extension() {
        match CtVolume::open("volume.dcm") {
            Err(SpineError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::InvalidInput),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
