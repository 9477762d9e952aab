//! Channel occupancy and effective airtime estimation from RegMon traces.
//!
//! A RegMon trace is a sequence of snapshots of the MAC-state registers of a
//! wireless NIC. [`decoder`] turns consecutive snapshots into per-interval
//! occupancy, [`estimator`] turns a decoded trace into an effective airtime
//! figure and [`batch`] runs both over a directory of experiments.

pub mod args;
pub mod batch;
pub mod decoder;
pub mod estimator;
pub mod experiment;
pub mod sample;
pub mod timing;
pub mod trace;

pub use decoder::{decode, Branch, CounterDecoder, Occupancy, OccupancyRecord, Percentages};
pub use estimator::{AirtimeEstimate, AirtimeEstimator};
pub use sample::{DecodeError, Radix, RawCounterSample};
pub use trace::{load_trace, Trace};
