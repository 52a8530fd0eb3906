use std::fmt;
use std::fs::File;
use std::path::Path;
use std::str::FromStr;

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use vds_core::{VdsError, VdsResult};

/// Columnar encoding of the written tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Arrow IPC file (Feather v2).
    #[default]
    Arrow,
    Parquet,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Arrow => "arrow",
            OutputFormat::Parquet => "parquet",
        }
    }

    pub(crate) fn write(&self, df: &mut DataFrame, path: &Path) -> VdsResult<()> {
        let mut file = File::create(path)?;
        match self {
            OutputFormat::Arrow => IpcWriter::new(&mut file)
                .finish(df)
                .map_err(|e| write_err(path, e)),
            #[cfg(feature = "parquet")]
            OutputFormat::Parquet => ParquetWriter::new(&mut file)
                .finish(df)
                .map(|_| ())
                .map_err(|e| write_err(path, e)),
            #[cfg(not(feature = "parquet"))]
            OutputFormat::Parquet => Err(VdsError::Config(
                "parquet support is disabled; rebuild with the 'parquet' feature".to_string(),
            )),
        }
    }
}

fn write_err(path: &Path, err: PolarsError) -> VdsError {
    VdsError::Other(format!("writing {}: {err}", path.display()))
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = VdsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "arrow" | "feather" | "ipc" => Ok(OutputFormat::Arrow),
            "parquet" => Ok(OutputFormat::Parquet),
            other => Err(VdsError::Config(format!(
                "unsupported output format '{other}'; use arrow or parquet"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases() {
        assert_eq!("Feather".parse::<OutputFormat>().unwrap(), OutputFormat::Arrow);
        assert_eq!("parquet".parse::<OutputFormat>().unwrap(), OutputFormat::Parquet);
        assert!("csv".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::default().extension(), "arrow");
    }
}
