//! Sampling cadence of a decoded trace

use std::{fmt, time::Duration};

use crate::decoder::{Branch, OccupancyRecord};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct TimingInfo {
    pub records: usize,
    /// From the start of the first interval to the end of the last one
    pub duration: Duration,
    pub mean_interval: Duration,
    pub min_interval: Duration,
    pub max_interval: Duration,
    /// Intervals decoded across a MIB reset
    pub resets: usize,
}

impl TimingInfo {
    /// `None` for an empty trace
    pub fn from_records(records: &[OccupancyRecord]) -> Option<Self> {
        let first = records.first()?;
        let last = records.last()?;
        let mut min = u64::MAX;
        let mut max = 0u64;
        let mut total = 0u64;
        let mut resets = 0usize;
        for r in records {
            let ns = r.duration_ns();
            min = min.min(ns);
            max = max.max(ns);
            total = total.saturating_add(ns);
            if r.branch == Branch::Reset {
                resets += 1;
            }
        }
        Some(Self {
            records: records.len(),
            duration: Duration::from_nanos(last.k_time_stop.saturating_sub(first.k_time_start)),
            mean_interval: Duration::from_nanos(total / records.len() as u64),
            min_interval: Duration::from_nanos(min),
            max_interval: Duration::from_nanos(max),
            resets,
        })
    }
}

impl fmt::Display for TimingInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} intervals over {:.3}s, interval mean {:?} min {:?} max {:?}, {} MIB resets",
            self.records,
            self.duration.as_secs_f64(),
            self.mean_interval,
            self.min_interval,
            self.max_interval,
            self.resets
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{decoder::decode, sample::RawCounterSample};

    fn sample(k_time: u64, mac: u32) -> RawCounterSample {
        RawCounterSample {
            k_time,
            mac_busy: mac,
            ..Default::default()
        }
    }

    #[test]
    fn test_timing() {
        let records = decode(vec![
            sample(1_000_000, 10),
            sample(2_000_000, 20),
            sample(4_000_000, 5),
            sample(4_500_000, 15),
        ]);
        let info = TimingInfo::from_records(&records).unwrap();
        assert_eq!(info.records, 3);
        assert_eq!(info.duration, Duration::from_micros(3_500));
        assert_eq!(info.min_interval, Duration::from_micros(500));
        assert_eq!(info.max_interval, Duration::from_millis(2));
        assert_eq!(info.mean_interval, Duration::from_nanos(3_500_000 / 3));
        assert_eq!(info.resets, 1);
    }

    #[test]
    fn test_empty() {
        assert_eq!(TimingInfo::from_records(&[]), None);
    }
}
