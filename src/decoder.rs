//! Turns consecutive register snapshots into per-interval channel occupancy.
//!
//! The busy registers are free running tick counters, so every interval is
//! the difference of two snapshots. Two things make that less simple than it
//! sounds:
//!
//! * The driver zeroes the counters from time to time (a MIB reset). When the
//!   MAC counter did not move forward we take the current raw values as the
//!   ticks elapsed since the reset.
//! * The registers are not latched together, so a tx/rx/ed delta can come out
//!   larger than the MAC delta it is a subset of. Those deltas are dropped to 0.

use tracing::{debug, trace};

use crate::sample::RawCounterSample;

/// The part of a snapshot the decoder carries from one interval to the next
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct CounterState {
    pub k_time: u64,
    pub mac_busy: u32,
    pub tx_busy: u32,
    pub rx_busy: u32,
    pub ed_busy: u32,
}

impl From<&RawCounterSample> for CounterState {
    fn from(s: &RawCounterSample) -> Self {
        Self {
            k_time: s.k_time,
            mac_busy: s.mac_busy,
            tx_busy: s.tx_busy,
            rx_busy: s.rx_busy,
            ed_busy: s.ed_busy,
        }
    }
}

/// Which rule produced the deltas of a record
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Branch {
    /// The MAC counter moved forward, deltas are differences
    Monotonic,
    /// The MAC counter did not move forward, raw values are the deltas
    Reset,
}

/// Share of the interval spent in each state, in percent of `d_mac`
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Percentages {
    pub tx: f64,
    pub rx: f64,
    pub idle: f64,
    pub others: f64,
}

impl Percentages {
    pub fn sum(&self) -> f64 {
        self.tx + self.rx + self.idle + self.others
    }
}

/// Occupancy of an interval. `Undefined` when no MAC ticks elapsed, so there
/// is nothing to normalize against.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum Occupancy {
    Defined(Percentages),
    Undefined,
}

impl Occupancy {
    pub fn percentages(&self) -> Option<&Percentages> {
        match self {
            Occupancy::Defined(p) => Some(p),
            Occupancy::Undefined => None,
        }
    }

    pub fn is_defined(&self) -> bool {
        matches!(self, Occupancy::Defined(_))
    }
}

/// Decoded interval between two consecutive snapshots
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct OccupancyRecord {
    /// Capture time of the snapshot closing the interval (ns)
    pub k_time: u64,
    pub k_time_start: u64,
    pub k_time_stop: u64,
    pub d_mac: u32,
    pub d_tx: u32,
    pub d_rx: u32,
    pub d_idle: u32,
    pub d_others: u32,
    /// Raw ACK failure register of the closing snapshot, not a delta
    pub d_fack: u32,
    pub branch: Branch,
    /// Set when a tx, rx or ed delta exceeded `d_mac` and was dropped to 0.
    /// Idle and others being floored at 0 does not set it, use
    /// [`OccupancyRecord::is_conserved`] to check the parts add up.
    pub clamped: bool,
    pub occupancy: Occupancy,
}

impl OccupancyRecord {
    /// Fraction of the interval attributed to foreign energy, `None` when
    /// `d_mac` is 0
    pub fn interference_ratio(&self) -> Option<f64> {
        if self.d_mac == 0 {
            None
        } else {
            Some(self.d_others as f64 / self.d_mac as f64)
        }
    }

    /// Whether the four states add up to exactly the MAC busy time
    pub fn is_conserved(&self) -> bool {
        let parts =
            self.d_tx as u64 + self.d_rx as u64 + self.d_idle as u64 + self.d_others as u64;
        parts == self.d_mac as u64
    }

    /// Interval length in ns
    pub fn duration_ns(&self) -> u64 {
        self.k_time_stop.saturating_sub(self.k_time_start)
    }
}

// A subset counter can never have advanced further than the MAC counter
fn clamp_to_mac(delta: u32, d_mac: u32, clamped: &mut bool) -> u32 {
    if delta > d_mac {
        *clamped = true;
        0
    } else {
        delta
    }
}

fn percent(part: u32, whole: u32) -> f64 {
    part as f64 / whole as f64 * 100f64
}

/// Decode the interval closed by `curr`
pub fn decode_pair(prev: &CounterState, curr: &RawCounterSample) -> OccupancyRecord {
    let (branch, d_mac, d_tx, d_rx, d_ed) = if curr.mac_busy > prev.mac_busy {
        (
            Branch::Monotonic,
            curr.mac_busy - prev.mac_busy,
            curr.tx_busy.wrapping_sub(prev.tx_busy),
            curr.rx_busy.wrapping_sub(prev.rx_busy),
            curr.ed_busy.wrapping_sub(prev.ed_busy),
        )
    } else {
        debug!(
            k_time = curr.k_time,
            prev_mac = prev.mac_busy,
            curr_mac = curr.mac_busy,
            "MIB reset"
        );
        (
            Branch::Reset,
            curr.mac_busy,
            curr.tx_busy,
            curr.rx_busy,
            curr.ed_busy,
        )
    };

    let mut clamped = false;
    let d_tx = clamp_to_mac(d_tx, d_mac, &mut clamped);
    let d_rx = clamp_to_mac(d_rx, d_mac, &mut clamped);
    let d_ed = clamp_to_mac(d_ed, d_mac, &mut clamped);
    if clamped {
        trace!(k_time = curr.k_time, d_mac, "Dropped racy counter delta");
    }

    let d_idle = d_mac.saturating_sub(d_ed);
    let d_others = d_ed.saturating_sub(d_tx).saturating_sub(d_rx);

    let occupancy = if d_mac > 0 {
        Occupancy::Defined(Percentages {
            tx: percent(d_tx, d_mac),
            rx: percent(d_rx, d_mac),
            idle: percent(d_idle, d_mac),
            others: percent(d_others, d_mac),
        })
    } else {
        debug!(k_time = curr.k_time, "No MAC ticks in interval");
        Occupancy::Undefined
    };

    OccupancyRecord {
        k_time: curr.k_time,
        k_time_start: prev.k_time,
        k_time_stop: curr.k_time,
        d_mac,
        d_tx,
        d_rx,
        d_idle,
        d_others,
        d_fack: curr.ack_fail_count,
        branch,
        clamped,
        occupancy,
    }
}

/// Streaming decoder, one [`OccupancyRecord`] per consecutive pair of samples.
///
/// Only the previous sample is kept around, so this works on traces of any
/// length. Fewer than two samples decode to nothing.
pub struct CounterDecoder<I> {
    samples: I,
    prev: Option<CounterState>,
}

impl<I> CounterDecoder<I>
where
    I: Iterator<Item = RawCounterSample>,
{
    pub fn new<T: IntoIterator<IntoIter = I>>(samples: T) -> Self {
        Self {
            samples: samples.into_iter(),
            prev: None,
        }
    }
}

impl<I> Iterator for CounterDecoder<I>
where
    I: Iterator<Item = RawCounterSample>,
{
    type Item = OccupancyRecord;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let curr = self.samples.next()?;
            let state = CounterState::from(&curr);
            match self.prev.replace(state) {
                Some(prev) => return Some(decode_pair(&prev, &curr)),
                // First sample only primes the state
                None => continue,
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let (lo, hi) = self.samples.size_hint();
        let primed = usize::from(self.prev.is_some());
        let adjust = |n: usize| (n + primed).saturating_sub(1);
        (adjust(lo), hi.map(adjust))
    }
}

/// Decode a whole sequence of samples
pub fn decode<T: IntoIterator<Item = RawCounterSample>>(samples: T) -> Vec<OccupancyRecord> {
    CounterDecoder::new(samples).collect()
}
