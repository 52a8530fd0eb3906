//! # vds-core: Voltage Dataset Domain Types
//!
//! Shared data model for generating a yearly load-voltage dataset from an
//! external distribution circuit simulator.
//!
//! ## Core Data Structures
//!
//! - [`ObjectName`] - `class.element` identifier of a simulator object
//! - [`Phase`] / [`Connection`] - how a load is wired to its bus
//! - [`LoadProfile`] / [`ProfileSet`] - one year of 15-minute samples per load
//! - [`VoltageTable`] - timestep × channel matrix of voltage magnitudes
//! - [`Stage`] - linear state machine of a dataset run
//! - [`VdsError`] - unified error type
//!
//! ## Timesteps
//!
//! A simulated year is [`TIMESTEPS_PER_YEAR`] fixed 15-minute intervals.
//! Every profile and every output table carries exactly that many samples.

pub mod error;
pub mod name;
pub mod phase;
pub mod profile;
pub mod stage;
pub mod table;

pub use error::{VdsError, VdsResult};
pub use name::ObjectName;
pub use phase::{Connection, Phase};
pub use profile::{LoadProfile, ProfileSet, ProfileUnits};
pub use stage::Stage;
pub use table::{ChannelMap, VoltageTable};

/// Number of 15-minute intervals in a simulated (non-leap) year.
pub const TIMESTEPS_PER_YEAR: usize = 35_040;

/// Separator between an object name and its channel in column names.
pub const CHANNEL_DELIMITER: &str = ":";

/// Voltage channel labels, one per conductor.
pub const VOLTAGE_CHANNELS: [&str; 3] = ["V1", "V2", "V3"];
