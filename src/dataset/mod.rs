//! Raw dataset acquisition: initial setup and repair

pub mod repair;
pub mod setup;

pub use repair::{DatasetRepair, RepairOutcome, RepairReport};
pub use setup::{DatasetSetup, SetupOutcome};
