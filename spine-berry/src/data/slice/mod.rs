//! CT 体数据水平切片对象的操作.

mod core;
mod save;

pub use self::core::{OwnedScanSlice, ScanSlice};

pub(crate) use self::core::min_max;

pub use save::ImgWriteVis;
