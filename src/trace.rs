//! Loading RegMon trace files from disk

use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::{Path, PathBuf},
};

use flate2::read::GzDecoder;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    decoder::{decode, OccupancyRecord},
    sample::{is_blank, parse_line, DecodeError, Radix, RawCounterSample},
};

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("reading trace {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// The samples of one trace, plus the records that could not be parsed
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Trace {
    pub samples: Vec<RawCounterSample>,
    pub skipped: Vec<DecodeError>,
}

impl Trace {
    /// Parse a trace from any line source. Record indices are zero-based line
    /// numbers. Bad records are kept in `skipped` and parsing carries on.
    pub fn read<R: BufRead>(mut reader: R, radix: Radix) -> io::Result<Self> {
        let mut trace = Trace::default();
        let mut buf = Vec::new();
        let mut index = 0usize;
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            let parsed = match std::str::from_utf8(&buf) {
                Ok(line) if is_blank(line) => None,
                Ok(line) => Some(parse_line(index, line, radix)),
                Err(_) => Some(Err(DecodeError::Encoding { index })),
            };
            index += 1;
            match parsed {
                Some(Ok(sample)) => trace.samples.push(sample),
                Some(Err(e)) => {
                    warn!("Skipping {}", e);
                    trace.skipped.push(e);
                }
                None => {}
            }
        }
        Ok(trace)
    }

    pub fn decode(&self) -> Vec<OccupancyRecord> {
        decode(self.samples.iter().copied())
    }
}

fn is_gzip(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == "gz")
}

/// Load a trace file, transparently decompressing `.gz` files
pub fn load_trace(path: &Path, radix: Radix) -> Result<Trace, TraceError> {
    let with_path = |source| TraceError::Io {
        path: path.to_owned(),
        source,
    };
    let file = File::open(path).map_err(with_path)?;
    let trace = if is_gzip(path) {
        Trace::read(BufReader::new(GzDecoder::new(file)), radix)
    } else {
        Trace::read(BufReader::new(file), radix)
    }
    .map_err(with_path)?;
    debug!(
        path = %path.display(),
        samples = trace.samples.len(),
        skipped = trace.skipped.len(),
        "Loaded trace"
    );
    Ok(trace)
}
