//! Profile loader.
//!
//! A profile directory holds either one CSV per load (`<load>.csv`, the file
//! stem is the load identifier) or wide tables (`.arrow`, `.feather`, `.ipc`,
//! `.parquet`) where each column is one load. Both layouts can be mixed as
//! long as no load is defined twice. Every profile must hold exactly one
//! year of 15-minute samples.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use polars::prelude::*;
use tracing::{debug, info};
use vds_core::{LoadProfile, ProfileSet, VdsError, VdsResult};

/// Column names recognized as the sample column of a per-load CSV.
const VALUE_COLUMNS: &[&str] = &["kw", "value", "mult"];

const TABLE_EXTENSIONS: &[&str] = &["arrow", "feather", "ipc", "parquet"];

/// Load every profile under `dir`.
pub fn load_profiles(dir: &Path) -> VdsResult<ProfileSet> {
    if !dir.is_dir() {
        return Err(VdsError::Config(format!(
            "profile directory '{}' does not exist",
            dir.display()
        )));
    }

    let mut set = ProfileSet::new();
    for path in profile_files(dir)? {
        let ext = extension(&path);
        if ext == "csv" {
            set.insert(read_csv_profile(&path)?)?;
        } else {
            for profile in read_wide_table(&path)? {
                set.insert(profile)?;
            }
        }
    }

    if set.is_empty() {
        return Err(VdsError::Config(format!(
            "no profile files (.csv, .arrow, .feather, .ipc, .parquet) in '{}'",
            dir.display()
        )));
    }
    info!("Loaded {} load profiles from {}", set.len(), dir.display());
    Ok(set)
}

/// Profile files in `dir`, sorted by path so load order is reproducible.
fn profile_files(dir: &Path) -> VdsResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let ext = extension(&path);
        if ext == "csv" || TABLE_EXTENSIONS.contains(&ext.as_str()) {
            files.push(path);
        } else {
            debug!("Skipping non-profile file {}", path.display());
        }
    }
    files.sort();
    Ok(files)
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default()
}

fn read_csv_profile(path: &Path) -> VdsResult<LoadProfile> {
    let load = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| VdsError::Parse(format!("invalid profile file name {}", path.display())))?
        .to_string();

    let file = File::open(path)?;
    let df = CsvReader::new(file)
        .has_header(true)
        .finish()
        .map_err(|e| malformed(path, e))?;

    let column = value_column(&df).ok_or_else(|| {
        VdsError::Parse(format!(
            "{}: expected a single numeric column or one named kw, value or mult",
            path.display()
        ))
    })?;
    let values = column_values(&df, &column, path)?;
    LoadProfile::new(load, values)
}

/// Pick the sample column of a per-load CSV.
fn value_column(df: &DataFrame) -> Option<String> {
    let names = df.get_column_names();
    if let Some(name) = names
        .iter()
        .find(|name| VALUE_COLUMNS.contains(&name.to_lowercase().as_str()))
    {
        return Some(name.to_string());
    }
    if names.len() == 1 {
        return Some(names[0].to_string());
    }
    let numeric: Vec<&Series> = df
        .get_columns()
        .iter()
        .filter(|s| s.dtype().is_numeric())
        .collect();
    match numeric.as_slice() {
        [only] => Some(only.name().to_string()),
        _ => None,
    }
}

fn read_wide_table(path: &Path) -> VdsResult<Vec<LoadProfile>> {
    let file = File::open(path)?;
    let df = match extension(path).as_str() {
        #[cfg(feature = "parquet")]
        "parquet" => ParquetReader::new(file).finish(),
        #[cfg(not(feature = "parquet"))]
        "parquet" => {
            return Err(VdsError::Config(
                "parquet support is disabled; rebuild with the 'parquet' feature".to_string(),
            ))
        }
        _ => IpcReader::new(file).finish(),
    }
    .map_err(|e| malformed(path, e))?;

    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    let mut profiles = Vec::with_capacity(names.len());
    for name in names {
        let values = column_values(&df, &name, path)?;
        profiles.push(LoadProfile::new(name, values)?);
    }
    debug!("Read {} profiles from {}", profiles.len(), path.display());
    Ok(profiles)
}

fn column_values(df: &DataFrame, name: &str, path: &Path) -> VdsResult<Vec<f64>> {
    let series = df
        .column(name)
        .and_then(|s| s.cast(&DataType::Float64))
        .map_err(|e| malformed(path, e))?;
    let values = series.f64().map_err(|e| malformed(path, e))?;
    values.into_iter().collect::<Option<Vec<f64>>>().ok_or_else(|| {
        VdsError::Parse(format!(
            "{}: column '{name}' has missing or non-numeric samples",
            path.display()
        ))
    })
}

fn malformed(path: &Path, err: PolarsError) -> VdsError {
    VdsError::Parse(format!("{}: {err}", path.display()))
}
