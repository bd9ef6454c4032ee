#![warn(missing_docs)] // <= 合适时移除它.
// #![warn(clippy::missing_docs_in_private_items)]  // <= too strict.

//! 核心库. 提供颈椎 CT 体数据的切片级特征工程, 以及基于逐切片概率表的
//! C1-C7 椎骨检测和切片序列提取.
//!
//! 该 crate 目前仅提供 `safe` 接口.
//!
//! # 注意
//!
//! 1. 特征工程 (`pipeline`) 与椎骨检测 (`detect`, `sequence`) 是两条 **互相独立** 的流程:
//!   检测直接作用于外部给出的概率列, 并不消费处理后的体数据.
//! 2. 一个切片可以同时属于多个椎骨. 因此各椎骨的切片序列是可能互相重叠的视图,
//!   而不是对切片集合的划分.
//! 3. 除 I/O 边界外, 所有操作都是同步的纯计算. 出错时直接返回 `Err`, 不做任何局部恢复.
//!
//! # 开发计划
//!
//! ### 切片变换 ✅
//!
//! 对比度受限的自适应直方图均衡 (CLAHE), 高斯-拉普拉斯 (LoG) 边缘增强,
//! 多级二维小波分解 + 重建.
//!
//! 实现位于 `spine-berry/src/transform`.
//!
//! ### 体数据处理流程 ✅
//!
//! 按 CLAHE -> LoG -> 小波 的固定顺序逐切片处理, 最后做一次全局 min-max 归一化.
//! 开启 `rayon` feature 后可按切片并行.
//!
//! 实现位于 `spine-berry/src/pipeline.rs`.
//!
//! ### 椎骨检测 ✅
//!
//! 对每个椎骨标签独立做阈值判定 (多标签, 互不排斥).
//!
//! 实现位于 `spine-berry/src/detect.rs`.
//!
//! ### 切片序列提取 ✅
//!
//! 按 (椎骨, 研究) 分组, 收集升序排列的切片索引.
//!
//! 实现位于 `spine-berry/src/sequence.rs`.
//!
//! ### 结果输出 ✅
//!
//! `sequences.json` 与 `detection_results.csv`. 需要 `serde` feature.
//!
//! 实现位于 `spine-berry/src/output.rs`.
//!
//! ### 概率来源 ⌛️
//!
//! 目前概率列由外部提供, 处理后的体数据没有被任何检测步骤使用.
//! 是否应由模型从处理后的体数据推断概率, 仍待确定.

/// 二维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx2d = (usize, usize);

/// 三维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx3d = (usize, usize, usize);

pub mod consts;

mod error;

pub use error::{SpineError, SpineResult};

/// 3D CT 体数据与切片.
mod data;

pub use data::{CtVolume, ImgWriteVis, OwnedScanSlice, ScanSlice};

pub mod transform;

pub mod pipeline;

pub mod table;

pub mod detect;

pub mod sequence;

#[cfg(feature = "serde")]
pub mod output;

pub mod prelude;
