//! 检测结果的持久化存储.
//!
//! 两个输出文件位于同一目录下, 目录不存在时自动创建:
//!
//! - `sequences.json`: 嵌套映射 `标签 -> 研究 -> [切片索引]`, 四空格缩进;
//! - `detection_results.csv`: 输入表的全部列, 末尾追加 `VertebraeDetected` 列.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::ser::PrettyFormatter;

use crate::consts::DETECTED_COLUMN;
use crate::sequence::SequenceMap;
use crate::table::DetectionTable;
use crate::SpineResult;

/// 序列输出文件名.
pub const SEQUENCES_FILE: &str = "sequences.json";

/// 检测表输出文件名.
pub const DETECTION_RESULTS_FILE: &str = "detection_results.csv";

/// 将 `sequences` 写入 `dir/sequences.json`, 返回写入的路径.
pub fn save_sequences<P: AsRef<Path>>(sequences: &SequenceMap, dir: P) -> SpineResult<PathBuf> {
    let path = prepare(dir.as_ref(), SEQUENCES_FILE)?;
    let mut writer = BufWriter::new(File::create(&path)?);
    let mut ser = serde_json::Serializer::with_formatter(
        &mut writer,
        PrettyFormatter::with_indent(b"    "),
    );
    sequences.serialize(&mut ser)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(path)
}

/// 将 `table` 写入 `dir/detection_results.csv`, 返回写入的路径.
///
/// 每行依次写出原始单元格和检测结果; 检测结果形如 `['C1', 'C2']`,
/// 未分类的行写出空单元格.
pub fn save_detection_results<P: AsRef<Path>>(
    table: &DetectionTable,
    dir: P,
) -> SpineResult<PathBuf> {
    let path = prepare(dir.as_ref(), DETECTION_RESULTS_FILE)?;
    let mut writer = csv::Writer::from_path(&path)?;

    writer.write_record(
        table
            .columns()
            .iter()
            .map(String::as_str)
            .chain([DETECTED_COLUMN]),
    )?;
    let width = table.columns().len();
    for row in table {
        let detected = row.detected().map(|d| d.to_string()).unwrap_or_default();
        let cells = row.cells();
        writer.write_record(
            (0..width)
                .map(|i| cells.get(i).map(String::as_str).unwrap_or_default())
                .chain([detected.as_str()]),
        )?;
    }
    writer.flush()?;
    Ok(path)
}

fn prepare(dir: &Path, name: &str) -> SpineResult<PathBuf> {
    fs::create_dir_all(dir)?;
    Ok(dir.join(name))
}
