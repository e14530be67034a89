//! Experiment domain module.
//!
//! An experiment measures goals against one feature over a bounded period and
//! moves through a small status machine (`waiting -> running -> stopped`, with
//! a forced stop from either live state).

pub mod experiment;
pub mod period;

pub use experiment::{
    ChangeExperimentDescription, ChangeExperimentPeriod, CreateExperiment, Experiment,
    ExperimentCommand, ExperimentEvent, ExperimentStatus, RenameExperiment,
};
pub use period::{MAX_PERIOD_SECONDS, validate_period};
