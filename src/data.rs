//! Tabular data: loading, per-column summaries, encoding and splitting.

pub mod encoding;
pub mod io;
pub mod profiling;
pub mod split;
pub mod types;

pub use encoding::{EncodeReport, categorical_columns, encode};
pub use io::{DatasetStore, load_csv};
pub use profiling::{ColumnStats, ColumnSummary, summarize};
pub use split::{ExcludedColumn, Split, SplitOptions, TargetEncoding, split};
pub use types::{ColumnInfo, ColumnKind, Dataset};
