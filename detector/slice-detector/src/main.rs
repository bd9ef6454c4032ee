//! 颈椎切片检测程序.
//!
//! 读取配置 -> 加载并清洗概率表 -> 逐切片检测 C1-C7 -> 输出序列与检测表.
//! 配置中给出体数据时, 另外运行特征工程流程并保存处理后的体数据.

mod report;
mod runner;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info, LevelFilter};
use simple_logger::SimpleLogger;

#[derive(Parser, Debug)]
#[command(name = "slice-detector")]
#[command(about = "Detect cervical vertebrae C1-C7 per CT slice and group them into per-study sequences")]
#[command(version)]
struct Cli {
    /// Path to the TOML configuration file (default: $SPINE_CONFIG, then ./config.toml).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Volume (.nii, .nii.gz or .npy) to run the feature-engineering pipeline on.
    #[arg(long)]
    volume: Option<PathBuf>,

    /// Output directory, overrides the configuration file.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Number of worker threads (default: available parallelism).
    #[arg(long)]
    threads: Option<usize>,

    /// Log level: off, error, warn, info, debug or trace.
    #[arg(long, default_value = "info")]
    log_level: LevelFilter,

    /// Skip the volume feature-engineering pipeline.
    #[arg(long)]
    skip_volume: bool,
}

impl Cli {
    fn options(&self) -> runner::Options {
        runner::Options {
            config: self.config.clone(),
            volume: self.volume.clone(),
            output_dir: self.output_dir.clone(),
            threads: self.threads,
            skip_volume: self.skip_volume,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = SimpleLogger::new().with_level(cli.log_level).init() {
        eprintln!("failed to initialize logger: {e}");
    }

    match runner::run(&cli.options()) {
        Ok(report) => {
            report.log();
            info!("SliceDetector program completed successfully.");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("An error occurred: {err:#}");
            ExitCode::FAILURE
        }
    }
}
