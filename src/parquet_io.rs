//! Column-contract parquet reading and deterministic parquet writing.
//!
//! Reads go through the row API: column positions are resolved once per file
//! by name, so every downstream accessor works on a validated index. Writes
//! build a single arrow record batch and swap the file into place.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::record::{Row, RowAccessor};
use sha2::{Digest, Sha256};

use crate::error::Result;

/// Column name to row position for one parquet file.
#[derive(Debug, Clone, Default)]
pub struct ColumnMap {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl ColumnMap {
    pub fn new(names: Vec<String>) -> Self {
        let index = names
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.clone(), idx))
            .collect();
        Self { names, index }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// First of `candidates` present in the file.
    pub fn position_any(&self, candidates: &[&str]) -> Option<usize> {
        candidates.iter().find_map(|name| self.position(name))
    }

    pub fn missing<'a>(&self, required: &[&'a str]) -> Vec<&'a str> {
        required
            .iter()
            .copied()
            .filter(|name| self.position(name).is_none())
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct ParquetRows {
    pub columns: ColumnMap,
    pub rows: Vec<Row>,
}

pub fn read_rows(path: &Path) -> Result<ParquetRows> {
    let file = File::open(path)?;
    let reader = SerializedFileReader::new(file)?;
    let names = reader
        .metadata()
        .file_metadata()
        .schema_descr()
        .root_schema()
        .get_fields()
        .iter()
        .map(|field| field.name().to_string())
        .collect::<Vec<_>>();

    let mut rows = Vec::new();
    for row in reader.get_row_iter(None)? {
        rows.push(row?);
    }

    Ok(ParquetRows {
        columns: ColumnMap::new(names),
        rows,
    })
}

/// Column names and row count of a parquet file.
pub fn read_shape(path: &Path) -> Result<(Vec<String>, usize)> {
    let file = File::open(path)?;
    let reader = SerializedFileReader::new(file)?;
    let meta = reader.metadata().file_metadata();
    let names = meta
        .schema_descr()
        .root_schema()
        .get_fields()
        .iter()
        .map(|field| field.name().to_string())
        .collect();
    let rows = usize::try_from(meta.num_rows()).unwrap_or(0);
    Ok((names, rows))
}

/// Numeric cell as f64; nulls, NaN and unparsable strings read as missing.
pub fn read_num(row: &Row, idx: usize) -> Option<f64> {
    let value = if let Ok(v) = row.get_double(idx) {
        v
    } else if let Ok(v) = row.get_float(idx) {
        f64::from(v)
    } else if let Ok(v) = row.get_long(idx) {
        v as f64
    } else if let Ok(v) = row.get_int(idx) {
        f64::from(v)
    } else if let Ok(v) = row.get_short(idx) {
        f64::from(v)
    } else if let Ok(v) = row.get_string(idx) {
        v.trim().parse::<f64>().ok()?
    } else {
        return None;
    };
    value.is_finite().then_some(value)
}

pub fn read_int(row: &Row, idx: usize) -> Option<i64> {
    if let Ok(v) = row.get_long(idx) {
        return Some(v);
    }
    if let Ok(v) = row.get_int(idx) {
        return Some(i64::from(v));
    }
    if let Ok(v) = row.get_string(idx) {
        return v.trim().parse::<i64>().ok();
    }
    read_num(row, idx)
        .filter(|v| v.fract() == 0.0)
        .map(|v| v as i64)
}

/// Text cell; integer cells are rendered so ids stored either way compare equal.
pub fn read_text(row: &Row, idx: usize) -> Option<String> {
    if let Ok(v) = row.get_string(idx) {
        let trimmed = v.trim();
        return (!trimmed.is_empty()).then(|| trimmed.to_string());
    }
    if let Ok(v) = row.get_long(idx) {
        return Some(v.to_string());
    }
    if let Ok(v) = row.get_int(idx) {
        return Some(v.to_string());
    }
    None
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Int64(Vec<Option<i64>>),
    Float64(Vec<Option<f64>>),
    Utf8(Vec<Option<String>>),
}

impl ColumnData {
    fn len(&self) -> usize {
        match self {
            ColumnData::Int64(v) => v.len(),
            ColumnData::Float64(v) => v.len(),
            ColumnData::Utf8(v) => v.len(),
        }
    }

    fn data_type(&self) -> DataType {
        match self {
            ColumnData::Int64(_) => DataType::Int64,
            ColumnData::Float64(_) => DataType::Float64,
            ColumnData::Utf8(_) => DataType::Utf8,
        }
    }

    fn into_array(self) -> ArrayRef {
        match self {
            ColumnData::Int64(v) => Arc::new(Int64Array::from(v)),
            ColumnData::Float64(v) => {
                let cleaned: Vec<Option<f64>> =
                    v.into_iter().map(|x| x.filter(|x| x.is_finite())).collect();
                Arc::new(Float64Array::from(cleaned))
            }
            ColumnData::Utf8(v) => Arc::new(StringArray::from(v)),
        }
    }
}

/// Ordered set of named columns, written as one record batch.
#[derive(Debug, Clone, Default)]
pub struct TableBuilder {
    columns: Vec<(String, bool, ColumnData)>,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self, name: &str, data: ColumnData) -> Self {
        self.columns.push((name.to_string(), false, data));
        self
    }

    pub fn nullable(mut self, name: &str, data: ColumnData) -> Self {
        self.columns.push((name.to_string(), true, data));
        self
    }

    pub fn push_nullable(&mut self, name: &str, data: ColumnData) {
        self.columns.push((name.to_string(), true, data));
    }

    pub fn into_batch(self) -> Result<RecordBatch> {
        let mut fields = Vec::with_capacity(self.columns.len());
        let mut arrays = Vec::with_capacity(self.columns.len());
        for (name, nullable, data) in self.columns {
            fields.push(Field::new(name, data.data_type(), nullable));
            arrays.push(data.into_array());
        }
        let schema = Arc::new(Schema::new(fields));
        Ok(RecordBatch::try_new(schema, arrays)?)
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map(|(_, _, data)| data.len()).unwrap_or(0)
    }
}

/// Writes the table to `path` through a temporary file and a rename, so a
/// reader never observes a half-written artifact. Output bytes depend only on
/// the table content.
pub fn write_table(path: &Path, table: TableBuilder) -> Result<usize> {
    let rows = table.row_count();
    let batch = table.into_batch()?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("parquet.tmp");
    let file = File::create(&tmp)?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(&batch)?;
    writer.close()?;
    fs::rename(&tmp, path)?;
    Ok(rows)
}

/// Hex SHA-256 of a file's bytes.
pub fn file_digest(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("nba_rating_io_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    #[test]
    fn written_table_reads_back_with_same_columns() {
        let path = temp_path("roundtrip.parquet");
        let table = TableBuilder::new()
            .required("PLAYER_ID", ColumnData::Int64(vec![Some(1), Some(2)]))
            .nullable(
                "pts_mean",
                ColumnData::Float64(vec![Some(12.5), Some(f64::NAN)]),
            )
            .nullable(
                "player_name",
                ColumnData::Utf8(vec![Some("A".into()), None]),
            );
        assert_eq!(write_table(&path, table).unwrap(), 2);

        let read = read_rows(&path).unwrap();
        assert_eq!(read.columns.names(), &["PLAYER_ID", "pts_mean", "player_name"]);
        assert_eq!(read.rows.len(), 2);
        let pts = read.columns.position("pts_mean").unwrap();
        assert_eq!(read_num(&read.rows[0], pts), Some(12.5));
        assert_eq!(read_num(&read.rows[1], pts), None);
        let name = read.columns.position("player_name").unwrap();
        assert_eq!(read_text(&read.rows[0], name).as_deref(), Some("A"));
        assert_eq!(read_text(&read.rows[1], name), None);
        assert_eq!(read_int(&read.rows[1], 0), Some(2));
    }

    #[test]
    fn identical_tables_produce_identical_bytes() {
        let build = || {
            TableBuilder::new()
                .required("PLAYER_ID", ColumnData::Int64(vec![Some(3), Some(4)]))
                .nullable("score_100", ColumnData::Float64(vec![Some(0.0), Some(100.0)]))
        };
        let a = temp_path("digest_a.parquet");
        let b = temp_path("digest_b.parquet");
        write_table(&a, build()).unwrap();
        write_table(&b, build()).unwrap();
        assert_eq!(file_digest(&a).unwrap(), file_digest(&b).unwrap());
    }

    #[test]
    fn missing_lists_absent_columns_only() {
        let map = ColumnMap::new(vec!["PLAYER_ID".into(), "PTS".into()]);
        assert_eq!(map.missing(&["PLAYER_ID", "FGA", "PTS", "TOV"]), vec!["FGA", "TOV"]);
        assert_eq!(map.position_any(&["height_cm", "PTS"]), Some(1));
    }
}
