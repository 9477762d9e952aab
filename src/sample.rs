//! Raw register snapshots and the textual line format they are stored in.

use std::str::FromStr;

use thiserror::Error;

/// Number of whitespace separated tokens in one trace line
pub const FIELDS_PER_LINE: usize = 11;

// Field names in wire order, used for error reporting
const FIELD_NAMES: [&str; FIELDS_PER_LINE] = [
    "k_time",
    "tsf",
    "mac_busy",
    "tx_busy",
    "rx_busy",
    "ed_busy",
    "tsf_aux",
    "ack_fail_count",
    "reserved0",
    "reserved1",
    "reserved2",
];

/// One snapshot of the MAC-state registers, taken once per sampling tick.
///
/// The busy counters are free running 32 bit tick counters. `mac_busy` is a
/// superset of the other three, `ed_busy` includes our own tx/rx time plus
/// whatever else the PHY sensed as energy on the channel.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct RawCounterSample {
    /// Monotonic kernel capture time in ns
    pub k_time: u64,
    /// Free running radio timer
    pub tsf: u64,
    pub mac_busy: u32,
    pub tx_busy: u32,
    pub rx_busy: u32,
    pub ed_busy: u32,
    /// Second timer component, carried as-is
    pub tsf_aux: u64,
    /// Cumulative ACK failure register
    pub ack_fail_count: u32,
    /// Opaque registers, never interpreted
    pub reserved: [u32; 3],
}

/// How register tokens are written in a trace
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub enum Radix {
    /// Hexadecimal, with or without a leading `0x`
    #[default]
    Hex,
    Decimal,
}

impl Radix {
    fn parse_u64(self, token: &str) -> Option<u64> {
        match self {
            Radix::Hex => {
                let digits = token
                    .strip_prefix("0x")
                    .or_else(|| token.strip_prefix("0X"))
                    .unwrap_or(token);
                u64::from_str_radix(digits, 16).ok()
            }
            Radix::Decimal => token.parse().ok(),
        }
    }
}

impl FromStr for Radix {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hex" | "16" => Ok(Radix::Hex),
            "dec" | "decimal" | "10" => Ok(Radix::Decimal),
            other => Err(format!("unknown radix `{other}`, expected hex or dec")),
        }
    }
}

/// A trace record that could not be turned into a [`RawCounterSample`]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("record {index}: expected 11 fields, found {found}")]
    FieldCount { index: usize, found: usize },
    #[error("record {index}: invalid {field} `{token}`")]
    InvalidField {
        index: usize,
        field: &'static str,
        token: String,
    },
    #[error("record {index}: not valid UTF-8")]
    Encoding { index: usize },
}

impl DecodeError {
    /// Index of the offending record within its trace
    pub fn index(&self) -> usize {
        match self {
            DecodeError::FieldCount { index, .. }
            | DecodeError::InvalidField { index, .. }
            | DecodeError::Encoding { index } => *index,
        }
    }
}

/// Lines that carry no record at all
pub fn is_blank(line: &str) -> bool {
    let line = line.trim();
    line.is_empty() || line.starts_with('#')
}

/// Parse one trace line. `index` is only used to label errors.
pub fn parse_line(index: usize, line: &str, radix: Radix) -> Result<RawCounterSample, DecodeError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() != FIELDS_PER_LINE {
        return Err(DecodeError::FieldCount {
            index,
            found: tokens.len(),
        });
    }

    let invalid = |field: usize| DecodeError::InvalidField {
        index,
        field: FIELD_NAMES[field],
        token: tokens[field].to_owned(),
    };
    // The kernel timestamp is always decimal
    let k_time = tokens[0].parse::<u64>().map_err(|_| invalid(0))?;
    let wide = |field: usize| radix.parse_u64(tokens[field]).ok_or_else(|| invalid(field));
    let narrow = |field: usize| {
        wide(field).and_then(|v| u32::try_from(v).map_err(|_| invalid(field)))
    };

    Ok(RawCounterSample {
        k_time,
        tsf: wide(1)?,
        mac_busy: narrow(2)?,
        tx_busy: narrow(3)?,
        rx_busy: narrow(4)?,
        ed_busy: narrow(5)?,
        tsf_aux: wide(6)?,
        ack_fail_count: narrow(7)?,
        reserved: [narrow(8)?, narrow(9)?, narrow(10)?],
    })
}
