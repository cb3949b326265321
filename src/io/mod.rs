//! IO utilities for loading labelled feature tables.

pub mod labelled_csv;

pub use labelled_csv::{
    read_labelled_csv, read_labelled_csv_with_config, read_labelled_from_reader, CsvReaderConfig,
    LabelledTable,
};
