//! File I/O for the voltage dataset generator.
//!
//! - [`profiles`] reads per-load yearly profiles from a directory of CSV,
//!   Arrow IPC (Feather v2) or Parquet files.
//! - [`writer`] serializes finished tables into a staging directory and
//!   commits them to the output directory only once every table is written.
//! - [`manifest`] records checksums of the committed tables.

pub mod format;
pub mod manifest;
pub mod profiles;
pub mod writer;

pub use format::OutputFormat;
pub use manifest::{compute_sha256, DatasetManifest, TableInfo};
pub use profiles::load_profiles;
pub use writer::{dataset_file_name, DatasetWriter, LoadLabel};
