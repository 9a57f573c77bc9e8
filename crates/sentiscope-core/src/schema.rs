/// Arrow schema definitions for tabular corpora.
pub mod dataset {
    use arrow::datatypes::DataType;

    /// Column holding the classifiable text.
    pub const TEXT_COLUMN: &str = "text";

    /// Whether a column type can be read as item text.
    pub fn is_text_type(data_type: &DataType) -> bool {
        matches!(data_type, DataType::Utf8 | DataType::LargeUtf8)
    }
}

#[cfg(test)]
mod tests {
    use super::dataset;
    use arrow::datatypes::DataType;

    #[test]
    fn text_types() {
        assert!(dataset::is_text_type(&DataType::Utf8));
        assert!(dataset::is_text_type(&DataType::LargeUtf8));
        assert!(!dataset::is_text_type(&DataType::Int64));
    }
}
