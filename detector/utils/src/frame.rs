//! 以字符串单元格存储的简单表格, 以及缺失值处理和按键合并.

use std::collections::HashMap;
use std::path::Path;

use spine_berry::table::DetectionTable;
use spine_berry::{SpineError, SpineResult};

/// 视为缺失值的单元格内容 (去除首尾空白后比较).
pub const NA_VALUES: [&str; 19] = [
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// 单元格是否为缺失值.
#[inline]
pub fn is_missing(cell: &str) -> bool {
    NA_VALUES.contains(&cell.trim())
}

/// 合并方式.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Join {
    /// 只保留两侧都有的键.
    Inner,
    /// 保留左侧全部行, 右侧无匹配时填空.
    Left,
}

/// 表头 + 行. 所有行都与表头等长.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Frame {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Frame {
    /// 直接创建. 短行在末尾补空单元格, 长行被截断.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut r| {
                r.resize(width, String::new());
                r
            })
            .collect();
        Self { headers, rows }
    }

    /// 读取带表头的 CSV 文件.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> SpineResult<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path.as_ref())?;
        let headers = reader.headers()?.iter().map(str::to_owned).collect();
        let rows = reader
            .records()
            .map(|r| r.map(|rec| rec.iter().map(str::to_owned).collect()))
            .collect::<Result<Vec<Vec<String>>, _>>()?;
        Ok(Self::new(headers, rows))
    }

    /// 表头.
    #[inline]
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// 全部行.
    #[inline]
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// 行数.
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// 是否没有任何行.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 列数.
    #[inline]
    pub fn width(&self) -> usize {
        self.headers.len()
    }

    /// 列 `name` 的位置.
    #[inline]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// 去掉含有缺失值的行, 返回新表.
    pub fn drop_missing(&self) -> Self {
        Self {
            headers: self.headers.clone(),
            rows: self
                .rows
                .iter()
                .filter(|r| !r.iter().any(|c| is_missing(c)))
                .cloned()
                .collect(),
        }
    }

    /// 以 `on` 中的列为键与 `right` 合并.
    ///
    /// 键列只保留左侧的一份. 两侧都有的非键列分别加上 `suffixes.0` 和 `suffixes.1`.
    /// 行的顺序: 左侧行的顺序, 同一左侧行匹配多行时按右侧顺序展开.
    /// 数值形式的键按数值比较 (`3` 与 `3.0` 相同).
    ///
    /// 任一侧缺少键列时返回 `SpineError::MissingColumn`.
    pub fn merge(
        &self,
        right: &Frame,
        on: &[&str],
        how: Join,
        suffixes: (&str, &str),
    ) -> SpineResult<Frame> {
        let left_keys = key_columns(self, on)?;
        let right_keys = key_columns(right, on)?;

        let right_rest: Vec<usize> = (0..right.width())
            .filter(|i| !right_keys.contains(i))
            .collect();
        let overlap = |name: &str, other: &Frame, other_keys: &[usize]| {
            other
                .headers
                .iter()
                .enumerate()
                .any(|(i, h)| h == name && !other_keys.contains(&i))
        };

        let mut headers: Vec<String> = self
            .headers
            .iter()
            .enumerate()
            .map(|(i, h)| {
                if !left_keys.contains(&i) && overlap(h.as_str(), right, &right_keys[..]) {
                    format!("{h}{}", suffixes.0)
                } else {
                    h.clone()
                }
            })
            .collect();
        headers.extend(right_rest.iter().map(|&i| {
            let h = &right.headers[i];
            if overlap(h.as_str(), self, &left_keys[..]) {
                format!("{h}{}", suffixes.1)
            } else {
                h.clone()
            }
        }));

        let mut index: HashMap<Vec<String>, Vec<usize>> = HashMap::new();
        for (i, row) in right.rows.iter().enumerate() {
            index.entry(row_key(row, &right_keys)).or_default().push(i);
        }

        let mut rows = Vec::new();
        for row in &self.rows {
            match index.get(&row_key(row, &left_keys)) {
                Some(matches) => {
                    for &j in matches {
                        let mut out = row.clone();
                        out.extend(right_rest.iter().map(|&k| right.rows[j][k].clone()));
                        rows.push(out);
                    }
                }
                None if how == Join::Left => {
                    let mut out = row.clone();
                    out.resize(headers.len(), String::new());
                    rows.push(out);
                }
                None => {}
            }
        }
        Ok(Frame { headers, rows })
    }

    /// 转换为检测表.
    pub fn to_detection_table(&self) -> SpineResult<DetectionTable> {
        DetectionTable::from_records(self.headers.clone(), self.rows.iter().cloned())
    }
}

fn key_columns(frame: &Frame, on: &[&str]) -> SpineResult<Vec<usize>> {
    on.iter()
        .map(|name| {
            frame
                .column_index(name)
                .ok_or_else(|| SpineError::MissingColumn((*name).to_owned()))
        })
        .collect()
}

/// 合并用的键. 能解析为数值的单元格取其规范写法.
fn row_key(row: &[String], keys: &[usize]) -> Vec<String> {
    keys.iter()
        .map(|&i| {
            let cell = row[i].trim();
            match cell.parse::<f64>() {
                Ok(v) if v.is_finite() => v.to_string(),
                _ => cell.to_owned(),
            }
        })
        .collect()
}
