//! Energy-detection airtime estimator.
//!
//! An interval counts as interfered when the share of MAC time spent on
//! energy that was neither our own tx nor rx exceeds a threshold. The
//! fraction of interfered intervals is taken as the duty cycle of the
//! interferer and whatever is left over as airtime WiFi can still use.

use thiserror::Error;
use tracing::{debug, info};

use crate::decoder::OccupancyRecord;

pub const DEFAULT_THRESHOLD: f64 = 0.1;

#[derive(Debug, Error, Clone, Copy, PartialEq)]
#[error("threshold must be in (0, 1), got {0}")]
pub struct ThresholdError(pub f64);

#[derive(Clone, Copy, PartialEq, Debug)]
pub struct AirtimeEstimator {
    threshold: f64,
}

/// Result of one estimator run
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct AirtimeEstimate {
    /// Fraction of intervals usable by WiFi, in `[0, 1]`
    pub effective_airtime: f64,
    /// Fraction of intervals classified as interfered, in `[0, 1]`
    pub interference_duty_cycle: f64,
    pub intervals_in_interference: usize,
    /// Intervals that took part in the ratio test
    pub intervals_considered: usize,
    /// Intervals left out because no MAC ticks elapsed
    pub intervals_undefined: usize,
}

impl AirtimeEstimator {
    pub fn new(threshold: f64) -> Result<Self, ThresholdError> {
        // NaN fails both comparisons
        if threshold > 0.0 && threshold < 1.0 {
            Ok(Self { threshold })
        } else {
            Err(ThresholdError(threshold))
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Estimate the effective airtime over a decoded trace.
    ///
    /// Records with `d_mac == 0` have no defined ratio and are left out of
    /// both the interfered count and the total. With nothing left to look at,
    /// the channel is reported as entirely free.
    pub fn estimate<'a, T>(&self, records: T) -> AirtimeEstimate
    where
        T: IntoIterator<Item = &'a OccupancyRecord>,
    {
        let mut considered = 0usize;
        let mut interfered = 0usize;
        let mut undefined = 0usize;
        for record in records {
            match record.interference_ratio() {
                Some(ratio) => {
                    considered += 1;
                    if ratio > self.threshold {
                        interfered += 1;
                    }
                }
                None => undefined += 1,
            }
        }

        let duty_cycle = if considered == 0 {
            0f64
        } else {
            interfered as f64 / considered as f64
        };
        let estimate = AirtimeEstimate {
            effective_airtime: 1f64 - duty_cycle,
            interference_duty_cycle: duty_cycle,
            intervals_in_interference: interfered,
            intervals_considered: considered,
            intervals_undefined: undefined,
        };

        if undefined > 0 {
            debug!(undefined, "Excluded intervals without MAC ticks");
        }
        info!(
            threshold = self.threshold,
            duty_cycle, "Estimated eff. available airtime wifi: {:.6}", estimate.effective_airtime
        );
        estimate
    }
}

impl Default for AirtimeEstimator {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{Branch, Occupancy, Percentages};

    fn record(d_mac: u32, d_others: u32) -> OccupancyRecord {
        let occupancy = if d_mac == 0 {
            Occupancy::Undefined
        } else {
            let others = d_others as f64 / d_mac as f64 * 100.0;
            Occupancy::Defined(Percentages {
                tx: 0.0,
                rx: 0.0,
                idle: 100.0 - others,
                others,
            })
        };
        OccupancyRecord {
            k_time: 0,
            k_time_start: 0,
            k_time_stop: 0,
            d_mac,
            d_tx: 0,
            d_rx: 0,
            d_idle: d_mac - d_others,
            d_others,
            d_fack: 0,
            branch: Branch::Monotonic,
            clamped: false,
            occupancy,
        }
    }

    #[test]
    fn test_three_of_ten_interfered() {
        let mut records: Vec<_> = (0..7).map(|_| record(1_000, 50)).collect();
        records.extend((0..3).map(|_| record(1_000, 400)));
        let est = AirtimeEstimator::default().estimate(&records);
        assert_eq!(est.intervals_considered, 10);
        assert_eq!(est.intervals_in_interference, 3);
        assert!((est.interference_duty_cycle - 0.3).abs() < 1e-12);
        assert!((est.effective_airtime - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_all_clear() {
        let records: Vec<_> = (0..25).map(|_| record(1_000, 0)).collect();
        for t in [0.001, 0.1, 0.5, 0.999] {
            let est = AirtimeEstimator::new(t).unwrap().estimate(&records);
            assert_eq!(est.effective_airtime, 1.0);
        }
    }

    #[test]
    fn test_ratio_at_threshold_is_not_interfered() {
        let records = vec![record(100, 10), record(100, 11)];
        let est = AirtimeEstimator::default().estimate(&records);
        assert_eq!(est.intervals_in_interference, 1);
    }

    #[test]
    fn test_zero_mac_excluded() {
        let records = vec![record(0, 0), record(100, 50), record(100, 0), record(0, 0)];
        let est = AirtimeEstimator::default().estimate(&records);
        assert_eq!(est.intervals_undefined, 2);
        assert_eq!(est.intervals_considered, 2);
        assert_eq!(est.effective_airtime, 0.5);
    }

    #[test]
    fn test_empty_and_all_undefined() {
        let est = AirtimeEstimator::default().estimate(&Vec::<OccupancyRecord>::new());
        assert_eq!(est.effective_airtime, 1.0);
        let est = AirtimeEstimator::default().estimate(&[record(0, 0)]);
        assert_eq!(est.intervals_considered, 0);
        assert_eq!(est.effective_airtime, 1.0);
    }

    #[test]
    fn test_fully_interfered() {
        let records: Vec<_> = (0..4).map(|_| record(10, 10)).collect();
        let est = AirtimeEstimator::default().estimate(&records);
        assert_eq!(est.effective_airtime, 0.0);
        assert_eq!(est.interference_duty_cycle, 1.0);
    }

    #[test]
    fn test_threshold_validation() {
        assert!(AirtimeEstimator::new(0.0).is_err());
        assert!(AirtimeEstimator::new(1.0).is_err());
        assert!(AirtimeEstimator::new(-0.5).is_err());
        assert!(AirtimeEstimator::new(f64::NAN).is_err());
        assert_eq!(AirtimeEstimator::new(0.25).unwrap().threshold(), 0.25);
        assert_eq!(AirtimeEstimator::default().threshold(), DEFAULT_THRESHOLD);
    }
}
