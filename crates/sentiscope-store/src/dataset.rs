//! The corpus a session samples items from.
//!
//! Plain-text files hold one item per line; blank lines and lines starting with
//! `#` are skipped. With the `parquet` feature, `.parquet` files are read from
//! their `text` column.

use std::path::Path;

use arrow::array::{Array, LargeStringArray, RecordBatch, StringArray};
use rand::Rng;
use sentiscope_core::schema::dataset::{TEXT_COLUMN, is_text_type};
use tracing::info;

use crate::StoreError;

/// Non-empty list of trimmed, non-blank items.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    items: Vec<String>,
}

impl Dataset {
    /// Load a dataset from disk, choosing the reader by file extension.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            return Err(StoreError::NotFound(path.to_path_buf()));
        }

        let is_parquet = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("parquet"));
        let dataset = if is_parquet {
            Self::load_parquet(path)?
        } else {
            let text = std::fs::read_to_string(path)?;
            Self::parse_text(&text).map_err(|_| StoreError::Empty(path.display().to_string()))?
        };

        info!(path = %path.display(), items = dataset.len(), "dataset loaded");
        Ok(dataset)
    }

    /// One item per line.
    pub fn parse_text(text: &str) -> Result<Self, StoreError> {
        Self::from_items(text.lines().filter(|line| !line.trim_start().starts_with('#')))
    }

    /// Build from any list of strings. Items are trimmed and blanks dropped.
    pub fn from_items<I, S>(items: I) -> Result<Self, StoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let items: Vec<String> = items
            .into_iter()
            .map(|item| item.as_ref().trim().to_string())
            .filter(|item| !item.is_empty())
            .collect();
        if items.is_empty() {
            return Err(StoreError::Empty("no non-blank items".into()));
        }
        Ok(Self { items })
    }

    /// Collect the `text` column of record batches.
    pub fn from_batches(batches: &[RecordBatch]) -> Result<Self, StoreError> {
        let mut items = Vec::new();
        for batch in batches {
            let col = batch
                .column_by_name(TEXT_COLUMN)
                .filter(|col| is_text_type(col.data_type()))
                .ok_or_else(|| StoreError::MissingColumn(TEXT_COLUMN.into()))?;

            if let Some(arr) = col.as_any().downcast_ref::<StringArray>() {
                items.extend(arr.iter().flatten().map(str::to_string));
            } else if let Some(arr) = col.as_any().downcast_ref::<LargeStringArray>() {
                items.extend(arr.iter().flatten().map(str::to_string));
            }
        }
        Self::from_items(items)
    }

    #[cfg(feature = "parquet")]
    fn load_parquet(path: &Path) -> Result<Self, StoreError> {
        use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

        let file = std::fs::File::open(path)?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
        let batches = reader.collect::<Result<Vec<_>, _>>()?;
        Self::from_batches(&batches).map_err(|e| match e {
            StoreError::Empty(_) => StoreError::Empty(path.display().to_string()),
            other => other,
        })
    }

    #[cfg(not(feature = "parquet"))]
    fn load_parquet(path: &Path) -> Result<Self, StoreError> {
        Err(StoreError::UnsupportedFormat(format!(
            "{} (built without the `parquet` feature)",
            path.display()
        )))
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the dataset has no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Pick one item uniformly at random.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> &str {
        &self.items[rng.gen_range(0..self.items.len())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::datatypes::{DataType, Field, Schema};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::sync::Arc;

    #[test]
    fn parse_skips_blanks_and_comments() {
        let ds = Dataset::parse_text("# reviews\nGreat product!\n\n   \n  Awful, broke instantly.  \n").unwrap();
        assert_eq!(ds.items(), ["Great product!", "Awful, broke instantly."]);
        assert_eq!(ds.len(), 2);
        assert!(!ds.is_empty());
    }

    #[test]
    fn all_blank_is_empty_error() {
        let err = Dataset::parse_text("\n  \n# only a comment\n").unwrap_err();
        assert!(matches!(err, StoreError::Empty(_)));
    }

    #[test]
    fn load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Dataset::load(&dir.path().join("nope.txt")).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn load_text_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reviews.txt");
        std::fs::write(&path, "Loved it\nHated it\n").unwrap();
        let ds = Dataset::load(&path).unwrap();
        assert_eq!(ds.len(), 2);
    }

    #[test]
    fn load_empty_file_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.txt");
        std::fs::write(&path, "\n\n").unwrap();
        let err = Dataset::load(&path).unwrap_err();
        assert!(err.to_string().contains("empty.txt"));
    }

    #[test]
    fn sample_stays_in_dataset() {
        let ds = Dataset::from_items(["a", "b", "c"]).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let item = ds.sample(&mut rng);
            assert!(ds.items().iter().any(|i| i == item));
        }
    }

    fn text_batch(data_type: DataType) -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![Field::new(TEXT_COLUMN, data_type.clone(), true)]));
        let column: arrow::array::ArrayRef = match data_type {
            DataType::LargeUtf8 => Arc::new(LargeStringArray::from(vec![Some("big one"), None])),
            _ => Arc::new(StringArray::from(vec![Some(" fine "), None, Some("")])),
        };
        RecordBatch::try_new(schema, vec![column]).unwrap()
    }

    #[test]
    fn batches_skip_nulls_and_blanks() {
        let ds = Dataset::from_batches(&[text_batch(DataType::Utf8), text_batch(DataType::LargeUtf8)])
            .unwrap();
        assert_eq!(ds.items(), ["fine", "big one"]);
    }

    #[test]
    fn batches_without_text_column() {
        let schema = Arc::new(Schema::new(vec![Field::new("id", DataType::Int64, false)]));
        let batch = RecordBatch::try_new(
            schema,
            vec![Arc::new(arrow::array::Int64Array::from(vec![1, 2]))],
        )
        .unwrap();
        let err = Dataset::from_batches(&[batch]).unwrap_err();
        assert!(matches!(err, StoreError::MissingColumn(_)));
    }

    #[cfg(feature = "parquet")]
    #[test]
    fn load_parquet_file() {
        use parquet::arrow::ArrowWriter;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.parquet");
        let batch = text_batch(DataType::Utf8);
        let file = std::fs::File::create(&path).unwrap();
        let mut writer = ArrowWriter::try_new(file, batch.schema(), None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let ds = Dataset::load(&path).unwrap();
        assert_eq!(ds.items(), ["fine"]);
    }

    #[cfg(not(feature = "parquet"))]
    #[test]
    fn parquet_without_feature_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.parquet");
        std::fs::write(&path, b"PAR1").unwrap();
        let err = Dataset::load(&path).unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedFormat(_)));
    }
}
