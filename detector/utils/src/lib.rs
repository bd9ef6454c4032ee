//! 检测程序依赖的通用组件: 配置文件, CSV 数据表的加载, 缺失值处理与合并.

pub mod config;
pub mod frame;
pub mod loader;

/// 获得可并行核心数.
pub fn cpus() -> usize {
    std::thread::available_parallelism().map_or_else(|_| num_cpus::get(), usize::from)
}
