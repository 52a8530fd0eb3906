//! Checksum manifest written next to each circuit's dataset.
//!
//! The manifest deliberately carries no timestamps or run identifiers, so two
//! runs over identical inputs produce byte-identical manifests and the table
//! checksums can be compared directly.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use vds_core::VdsResult;

/// Manifest of the tables written for one circuit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetManifest {
    /// vds version that wrote the dataset
    pub writer_version: String,

    pub circuit: String,

    /// Metadata for each table file, keyed by file name
    pub tables: BTreeMap<String, TableInfo>,
}

/// Metadata for a single table file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableInfo {
    /// SHA256 checksum of the file
    pub sha256: String,

    pub row_count: u64,

    pub column_count: u64,

    pub file_size_bytes: u64,
}

impl DatasetManifest {
    pub fn new(circuit: impl Into<String>) -> Self {
        Self {
            writer_version: env!("CARGO_PKG_VERSION").to_string(),
            circuit: circuit.into(),
            tables: BTreeMap::new(),
        }
    }

    pub fn add_table(&mut self, file_name: impl Into<String>, info: TableInfo) {
        self.tables.insert(file_name.into(), info);
    }
}

/// Compute SHA256 hash of a file
pub fn compute_sha256(path: &Path) -> VdsResult<String> {
    use sha2::{Digest, Sha256};

    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0; 8192];

    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_sha256_of_known_content() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"abc").unwrap();
        assert_eq!(
            compute_sha256(file.path()).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_manifest_serialization_is_ordered() {
        let mut manifest = DatasetManifest::new("ckt5");
        let info = TableInfo {
            sha256: "hash".to_string(),
            row_count: 1,
            column_count: 1,
            file_size_bytes: 10,
        };
        manifest.add_table("z.arrow", info.clone());
        manifest.add_table("a.arrow", info);

        let json = serde_json::to_string(&manifest).unwrap();
        assert!(json.find("a.arrow").unwrap() < json.find("z.arrow").unwrap());
        let back: DatasetManifest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, manifest);
    }
}
