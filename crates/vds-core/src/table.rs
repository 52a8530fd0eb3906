//! Timestep × channel matrix of voltage magnitudes.
//!
//! Columns are fixed up front from the measured elements and their channel
//! counts; rows are appended one per simulated timestep. The table refuses
//! rows of the wrong width and refuses to finalize unless it holds exactly
//! one row per timestep of the year.

use std::collections::BTreeMap;

use crate::{VdsError, VdsResult, CHANNEL_DELIMITER, TIMESTEPS_PER_YEAR, VOLTAGE_CHANNELS};

/// Element name → indices of its columns in a [`VoltageTable`].
pub type ChannelMap = BTreeMap<String, Vec<usize>>;

#[derive(Debug, Clone, PartialEq)]
pub struct VoltageTable {
    columns: Vec<String>,
    channel_map: ChannelMap,
    /// Column-major storage, one `Vec` per column.
    data: Vec<Vec<f64>>,
    rows: usize,
    capacity: usize,
}

impl VoltageTable {
    /// Build an empty table for `(element, channel_count)` pairs.
    ///
    /// Columns are named `<element>:V1`, `<element>:V2`, ... in element order.
    pub fn for_elements<'a, I>(elements: I) -> VdsResult<Self>
    where
        I: IntoIterator<Item = (&'a str, usize)>,
    {
        let mut columns = Vec::new();
        let mut channel_map = ChannelMap::new();
        for (element, channels) in elements {
            if channels == 0 || channels > VOLTAGE_CHANNELS.len() {
                return Err(VdsError::Other(format!(
                    "element '{element}' has unsupported channel count {channels}"
                )));
            }
            if channel_map.contains_key(element) {
                return Err(VdsError::Other(format!(
                    "element '{element}' appears twice in voltage table"
                )));
            }
            let indices = (columns.len()..columns.len() + channels).collect();
            for channel in &VOLTAGE_CHANNELS[..channels] {
                columns.push(format!("{element}{CHANNEL_DELIMITER}{channel}"));
            }
            channel_map.insert(element.to_string(), indices);
        }
        Ok(Self::with_columns(columns, channel_map))
    }

    /// Build an empty table from explicit column names.
    pub fn with_columns(columns: Vec<String>, channel_map: ChannelMap) -> Self {
        let capacity = TIMESTEPS_PER_YEAR;
        Self {
            data: columns.iter().map(|_| Vec::with_capacity(capacity)).collect(),
            columns,
            channel_map,
            rows: 0,
            capacity,
        }
    }

    /// Append the readings of one timestep, in column order.
    pub fn push_row(&mut self, row: &[f64]) -> VdsResult<()> {
        if row.len() != self.columns.len() {
            return Err(VdsError::ChannelMismatch {
                element: format!("row {}", self.rows),
                expected: self.columns.len(),
                actual: row.len(),
            });
        }
        if self.rows >= self.capacity {
            return Err(VdsError::Other(format!(
                "voltage table already holds {} rows",
                self.capacity
            )));
        }
        for (column, value) in self.data.iter_mut().zip(row) {
            column.push(*value);
        }
        self.rows += 1;
        Ok(())
    }

    /// Check that every timestep of the year has been recorded.
    pub fn ensure_complete(&self) -> VdsResult<()> {
        if self.rows != self.capacity {
            return Err(VdsError::Other(format!(
                "voltage table has {} rows, expected {}",
                self.rows, self.capacity
            )));
        }
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> &[f64] {
        &self.data[index]
    }

    pub fn channel_map(&self) -> &ChannelMap {
        &self.channel_map
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn height(&self) -> usize {
        self.rows
    }

    /// Iterate `(column name, values)` pairs in column order.
    pub fn iter_columns(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.data.iter().map(Vec::as_slice))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_columns_and_channel_map() {
        let table = VoltageTable::for_elements([("l1", 1), ("l2", 3)]).unwrap();
        assert_eq!(table.columns(), &["l1:V1", "l2:V1", "l2:V2", "l2:V3"]);
        assert_eq!(table.channel_map()["l1"], vec![0]);
        assert_eq!(table.channel_map()["l2"], vec![1, 2, 3]);
    }

    #[test]
    fn test_rejects_wrong_width() {
        let mut table = VoltageTable::for_elements([("l1", 2)]).unwrap();
        let err = table.push_row(&[1.0]).unwrap_err();
        assert!(matches!(err, VdsError::ChannelMismatch { expected: 2, actual: 1, .. }));
        assert_eq!(table.height(), 0);
    }

    #[test]
    fn test_complete_year() {
        let mut table = VoltageTable::for_elements([("l1", 1)]).unwrap();
        for step in 0..TIMESTEPS_PER_YEAR {
            assert!(table.ensure_complete().is_err());
            table.push_row(&[step as f64]).unwrap();
        }
        table.ensure_complete().unwrap();
        assert_eq!(table.column(0)[TIMESTEPS_PER_YEAR - 1], 35_039.0);
        assert!(table.push_row(&[0.0]).is_err());
    }

    #[test]
    fn test_duplicate_and_invalid_elements() {
        assert!(VoltageTable::for_elements([("l1", 1), ("l1", 1)]).is_err());
        assert!(VoltageTable::for_elements([("l1", 0)]).is_err());
        assert!(VoltageTable::for_elements([("l1", 4)]).is_err());
    }
}
