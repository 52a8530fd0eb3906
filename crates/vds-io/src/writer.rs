//! Dataset writer with staged, all-or-nothing commits.
//!
//! Tables are written into a hidden staging directory inside the output
//! directory (`<out>/.staging-<circuit>`). Only [`DatasetWriter::commit`]
//! moves them to their final names, after the manifest has been written. A
//! writer that is dropped or aborted before committing removes its staging
//! directory, so a failed run never leaves a partial dataset behind.
//!
//! File layout for circuit `ckt5` in Arrow format:
//!
//! ```text
//! data/ckt5-load-voltage_magnitudes-raw.arrow
//! data/ckt5-transformer-voltage_magnitudes-raw.arrow
//! data/ckt5-labels.arrow
//! data/ckt5-loadshapes.arrow
//! data/ckt5-channel_map-load.json
//! data/ckt5-manifest.json
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use polars::prelude::{DataFrame, NamedFrom, Series};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use vds_core::{ChannelMap, VdsError, VdsResult, VoltageTable};

use crate::manifest::{compute_sha256, DatasetManifest, TableInfo};
use crate::OutputFormat;

/// `<circuit>-<stem>.<ext>`
pub fn dataset_file_name(circuit: &str, stem: &str, ext: &str) -> String {
    format!("{circuit}-{stem}.{ext}")
}

/// One row of the labels table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadLabel {
    /// Load object name, `load.<name>`.
    pub load_name: String,
    /// Loadshape object name, `loadshape.<profile>`.
    pub loadshape_name: String,
    pub base_kv: f64,
    pub connection: String,
    pub meter_count: i64,
    pub phase_count: i64,
    pub phase_name: String,
    pub phase_value: i32,
    pub profile_name: String,
    pub units: String,
}

pub struct DatasetWriter {
    out_dir: PathBuf,
    staging_dir: PathBuf,
    circuit: String,
    format: OutputFormat,
    manifest: DatasetManifest,
    staged: Vec<String>,
    finished: bool,
}

impl DatasetWriter {
    /// Prepare a writer for `circuit`, creating `out_dir` if needed.
    pub fn new(out_dir: impl AsRef<Path>, circuit: &str, format: OutputFormat) -> VdsResult<Self> {
        let out_dir = out_dir.as_ref().to_path_buf();
        fs::create_dir_all(&out_dir).map_err(|e| unwritable(&out_dir, e))?;

        let staging_dir = out_dir.join(format!(".staging-{circuit}"));
        if staging_dir.exists() {
            warn!("Removing stale staging directory {}", staging_dir.display());
            fs::remove_dir_all(&staging_dir).map_err(|e| unwritable(&staging_dir, e))?;
        }
        fs::create_dir_all(&staging_dir).map_err(|e| unwritable(&out_dir, e))?;

        Ok(Self {
            out_dir,
            staging_dir,
            circuit: circuit.to_string(),
            format,
            manifest: DatasetManifest::new(circuit),
            staged: Vec::new(),
            finished: false,
        })
    }

    /// Write a voltage table as `<circuit>-<measured>-voltage_magnitudes-raw.<ext>`.
    ///
    /// The table must hold every timestep of the year.
    pub fn write_voltage_table(&mut self, measured: &str, table: &VoltageTable) -> VdsResult<()> {
        table.ensure_complete()?;
        let columns = table
            .iter_columns()
            .map(|(name, values)| Series::new(name, values))
            .collect();
        let mut df = frame(columns)?;
        self.write_table(&format!("{measured}-voltage_magnitudes-raw"), &mut df)
    }

    /// Write the per-load labels table.
    pub fn write_labels(&mut self, labels: &[LoadLabel]) -> VdsResult<()> {
        let mut df = frame(vec![
            Series::new("load_name", pick(labels, |l| l.load_name.clone())),
            Series::new("loadshape_name", pick(labels, |l| l.loadshape_name.clone())),
            Series::new("base_kv", pick(labels, |l| l.base_kv)),
            Series::new("connection", pick(labels, |l| l.connection.clone())),
            Series::new("meter_count", pick(labels, |l| l.meter_count)),
            Series::new("phase_count", pick(labels, |l| l.phase_count)),
            Series::new("phase_name", pick(labels, |l| l.phase_name.clone())),
            Series::new("phase_value", pick(labels, |l| l.phase_value)),
            Series::new("profile_name", pick(labels, |l| l.profile_name.clone())),
            Series::new("units", pick(labels, |l| l.units.clone())),
        ])?;
        self.write_table("labels", &mut df)
    }

    /// Write the applied load profiles, one column per loadshape object name.
    pub fn write_loadshapes<'a, I>(&mut self, shapes: I) -> VdsResult<()>
    where
        I: IntoIterator<Item = (&'a str, &'a [f64])>,
    {
        let columns = shapes
            .into_iter()
            .map(|(name, values)| Series::new(name, values))
            .collect();
        let mut df = frame(columns)?;
        self.write_table("loadshapes", &mut df)
    }

    /// Write the load → column index map of the load voltage table.
    pub fn write_channel_map(&mut self, channel_map: &ChannelMap) -> VdsResult<()> {
        let file_name = dataset_file_name(&self.circuit, "channel_map-load", "json");
        let path = self.staging_dir.join(&file_name);
        let json = serde_json::to_string_pretty(channel_map)?;
        fs::write(&path, json)?;
        self.staged.push(file_name);
        Ok(())
    }

    fn write_table(&mut self, stem: &str, df: &mut DataFrame) -> VdsResult<()> {
        let file_name = dataset_file_name(&self.circuit, stem, self.format.extension());
        let path = self.staging_dir.join(&file_name);
        self.format.write(df, &path)?;

        let info = TableInfo {
            sha256: compute_sha256(&path)?,
            row_count: df.height() as u64,
            column_count: df.width() as u64,
            file_size_bytes: fs::metadata(&path)?.len(),
        };
        debug!(
            "Staged {} ({} rows x {} columns)",
            file_name, info.row_count, info.column_count
        );
        self.manifest.add_table(file_name.clone(), info);
        self.staged.push(file_name);
        Ok(())
    }

    /// Write the manifest and move every staged file into the output directory.
    ///
    /// Files being replaced are set aside in the staging directory first. If
    /// any move fails, the files already moved are removed and the set-aside
    /// ones restored, so the output keeps the previous dataset.
    ///
    /// Returns the final paths in the order the files were written.
    pub fn commit(mut self) -> VdsResult<Vec<PathBuf>> {
        let manifest_name = dataset_file_name(&self.circuit, "manifest", "json");
        let json = serde_json::to_string_pretty(&self.manifest)?;
        fs::write(self.staging_dir.join(&manifest_name), json)?;
        self.staged.push(manifest_name);

        let backup_dir = self.staging_dir.join(".previous");
        let mut committed = Vec::with_capacity(self.staged.len());
        let mut replaced = Vec::new();
        if let Err(err) = self.publish(&backup_dir, &mut committed, &mut replaced) {
            self.roll_back(&backup_dir, &committed, &replaced);
            return Err(err);
        }
        fs::remove_dir_all(&self.staging_dir)?;
        self.finished = true;

        info!(
            "Wrote {} files for circuit {} to {}",
            committed.len(),
            self.circuit,
            self.out_dir.display()
        );
        Ok(committed)
    }

    fn publish(
        &self,
        backup_dir: &Path,
        committed: &mut Vec<PathBuf>,
        replaced: &mut Vec<String>,
    ) -> VdsResult<()> {
        fs::create_dir_all(backup_dir)?;
        for file_name in &self.staged {
            let from = self.staging_dir.join(file_name);
            let to = self.out_dir.join(file_name);
            if to.exists() {
                let backup = backup_dir.join(file_name);
                fs::rename(&to, &backup).map_err(|e| move_failed(&to, &backup, e))?;
                replaced.push(file_name.clone());
            }
            fs::rename(&from, &to).map_err(|e| move_failed(&from, &to, e))?;
            committed.push(to);
        }
        Ok(())
    }

    fn roll_back(&self, backup_dir: &Path, committed: &[PathBuf], replaced: &[String]) {
        warn!(
            "Commit of circuit {} failed; restoring {}",
            self.circuit,
            self.out_dir.display()
        );
        for path in committed {
            if let Err(err) = fs::remove_file(path) {
                warn!("Failed to remove {}: {err}", path.display());
            }
        }
        for file_name in replaced {
            let to = self.out_dir.join(file_name);
            if let Err(err) = fs::rename(backup_dir.join(file_name), &to) {
                warn!("Failed to restore {}: {err}", to.display());
            }
        }
    }

    /// Discard everything staged so far.
    pub fn abort(mut self) -> VdsResult<()> {
        self.finished = true;
        if self.staging_dir.exists() {
            fs::remove_dir_all(&self.staging_dir)?;
        }
        Ok(())
    }
}

impl Drop for DatasetWriter {
    fn drop(&mut self) {
        if !self.finished && self.staging_dir.exists() {
            if let Err(err) = fs::remove_dir_all(&self.staging_dir) {
                warn!(
                    "Failed to clean up staging directory {}: {err}",
                    self.staging_dir.display()
                );
            }
        }
    }
}

fn pick<T>(labels: &[LoadLabel], field: impl Fn(&LoadLabel) -> T) -> Vec<T> {
    labels.iter().map(field).collect()
}

fn frame(columns: Vec<Series>) -> VdsResult<DataFrame> {
    DataFrame::new(columns).map_err(|e| VdsError::Other(format!("building table: {e}")))
}

fn move_failed(from: &Path, to: &Path, err: std::io::Error) -> VdsError {
    VdsError::Other(format!(
        "moving {} to {}: {err}",
        from.display(),
        to.display()
    ))
}

fn unwritable(path: &Path, err: std::io::Error) -> VdsError {
    VdsError::Io(std::io::Error::new(
        err.kind(),
        format!("output directory '{}' is not writable: {err}", path.display()),
    ))
}
