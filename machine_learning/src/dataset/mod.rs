mod batch;
mod csv;
mod dataset;
mod synthetic;

pub use batch::Batch;
pub use csv::{CsvTable, parse_csv, read_csv};
pub use dataset::Dataset;
pub use synthetic::make_blobs;
