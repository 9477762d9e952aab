//! Running the decoder and estimator over a tree of experiment directories.
//!
//! Every experiment is independent, so they are fanned out over a few worker
//! threads. A broken experiment never stops the batch, it ends up in the
//! report's failure list with its directory and the reason.

use std::{
    fs, io,
    path::{Path, PathBuf},
    thread,
};

use crossbeam_channel::{bounded, unbounded};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
    estimator::{AirtimeEstimate, AirtimeEstimator},
    experiment::{is_experiment_dir, ConfigError, ExperimentConfig},
    sample::{DecodeError, Radix},
    timing::TimingInfo,
    trace::{load_trace, TraceError},
};

#[derive(Clone, Copy, Debug)]
pub struct BatchOptions {
    pub radix: Radix,
    pub estimator: AirtimeEstimator,
    pub workers: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            radix: Radix::default(),
            estimator: AirtimeEstimator::default(),
            workers: 4,
        }
    }
}

#[derive(Debug, Error)]
pub enum ExperimentError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Trace(#[from] TraceError),
    #[error("trace has {samples} usable samples, need at least 2")]
    NoIntervals { samples: usize },
    #[error("worker stopped before finishing this experiment")]
    WorkerLost,
}

/// Everything computed from a single trace
#[derive(Clone, Debug)]
pub struct TraceAnalysis {
    pub samples: usize,
    pub estimate: AirtimeEstimate,
    pub timing: TimingInfo,
    pub skipped: Vec<DecodeError>,
}

#[derive(Clone, Debug)]
pub struct ExperimentOutcome {
    pub dir: PathBuf,
    pub meas_name: String,
    pub analysis: TraceAnalysis,
}

#[derive(Debug)]
pub struct ExperimentFailure {
    pub dir: PathBuf,
    pub error: ExperimentError,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub successes: Vec<ExperimentOutcome>,
    pub failures: Vec<ExperimentFailure>,
}

impl BatchReport {
    pub fn len(&self) -> usize {
        self.successes.len() + self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Load, decode and estimate a single trace file
pub fn analyze_trace(path: &Path, opts: &BatchOptions) -> Result<TraceAnalysis, ExperimentError> {
    let trace = load_trace(path, opts.radix)?;
    let records = trace.decode();
    let timing = TimingInfo::from_records(&records).ok_or(ExperimentError::NoIntervals {
        samples: trace.samples.len(),
    })?;
    debug!(path = %path.display(), "{}", timing);
    let estimate = opts.estimator.estimate(&records);
    Ok(TraceAnalysis {
        samples: trace.samples.len(),
        estimate,
        timing,
        skipped: trace.skipped,
    })
}

/// Process one experiment directory
pub fn run_experiment(dir: &Path, opts: &BatchOptions) -> Result<ExperimentOutcome, ExperimentError> {
    let config = ExperimentConfig::load(dir)?;
    let analysis = analyze_trace(&config.regmon_path(dir), opts)?;
    Ok(ExperimentOutcome {
        dir: dir.to_owned(),
        meas_name: config.common.meas_name,
        analysis,
    })
}

/// All experiment directories under `root` (including `root` itself), sorted
pub fn find_experiments(root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut pending = vec![root.to_owned()];
    let mut first = true;
    while let Some(dir) = pending.pop() {
        if is_experiment_dir(&dir) {
            found.push(dir.clone());
        }
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            // Only an unreadable root is fatal
            Err(e) if !first => {
                warn!(dir = %dir.display(), "Can't list directory: {}", e);
                continue;
            }
            Err(e) => return Err(e),
        };
        first = false;
        for entry in entries {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            }
        }
    }
    found.sort();
    Ok(found)
}

/// Run every experiment under `root` on `opts.workers` threads
pub fn run_batch(root: &Path, opts: &BatchOptions) -> io::Result<BatchReport> {
    let dirs = find_experiments(root)?;
    info!(root = %root.display(), experiments = dirs.len(), "Starting batch");

    let workers = opts.workers.clamp(1, dirs.len().max(1));
    let (job_sender, job_receiver) = bounded::<(usize, PathBuf)>(workers * 2);
    let (result_sender, result_receiver) = unbounded();

    let handles: Vec<_> = (0..workers)
        .map(|_| {
            let jobs = job_receiver.clone();
            let results = result_sender.clone();
            let opts = *opts;
            thread::spawn(move || {
                for (idx, dir) in jobs {
                    debug!(dir = %dir.display(), "Parsing folder");
                    let outcome = run_experiment(&dir, &opts);
                    // The collector only goes away if we're shutting down anyway
                    let _ = results.send((idx, dir, outcome));
                }
            })
        })
        .collect();
    drop(job_receiver);
    drop(result_sender);

    for job in dirs.iter().cloned().enumerate() {
        if job_sender.send(job).is_err() {
            break;
        }
    }
    drop(job_sender);

    let mut slots: Vec<Option<(PathBuf, Result<ExperimentOutcome, ExperimentError>)>> =
        dirs.iter().map(|_| None).collect();
    for (idx, dir, outcome) in result_receiver {
        slots[idx] = Some((dir, outcome));
    }
    for handle in handles {
        if handle.join().is_err() {
            error!("Batch worker panicked");
        }
    }

    let mut report = BatchReport::default();
    for (slot, dir) in slots.into_iter().zip(dirs) {
        let (dir, outcome) = slot.unwrap_or((dir, Err(ExperimentError::WorkerLost)));
        match outcome {
            Ok(outcome) => report.successes.push(outcome),
            Err(error) => {
                warn!(dir = %dir.display(), "Failed to parse: {}", error);
                report.failures.push(ExperimentFailure { dir, error });
            }
        }
    }
    info!(
        ok = report.successes.len(),
        failed = report.failures.len(),
        "Finished batch"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Four intervals, one of them with 50% foreign energy
    const TRACE: &str = "\
1000 0 0 0 0 0 0 0 0 0 0
2000 0 64 0 0 0 0 0 0 0 0
3000 0 c8 0 0 32 0 0 0 0 0
4000 0 12c 0 0 32 0 0 0 0 0
5000 0 190 0 0 32 0 0 0 0 0
";

    fn write_experiment(dir: &Path, name: &str, trace: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(
            dir.join("config.json"),
            format!(
                r#"{{"common": {{"meas_name": "{name}"}}, "regmon": {{"result_file": "regmon.txt"}}}}"#
            ),
        )
        .unwrap();
        fs::write(dir.join("regmon.txt"), trace).unwrap();
    }

    #[test]
    fn test_analyze_trace() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("regmon.txt");
        fs::write(&path, TRACE).unwrap();
        let analysis = analyze_trace(&path, &BatchOptions::default()).unwrap();
        assert_eq!(analysis.samples, 5);
        assert_eq!(analysis.timing.records, 4);
        assert_eq!(analysis.estimate.effective_airtime, 0.75);
        assert!(analysis.skipped.is_empty());
    }

    #[test]
    fn test_single_sample_is_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("regmon.txt");
        fs::write(&path, "1000 0 0 0 0 0 0 0 0 0 0\n").unwrap();
        let err = analyze_trace(&path, &BatchOptions::default()).unwrap_err();
        assert!(matches!(err, ExperimentError::NoIntervals { samples: 1 }));
    }

    #[test]
    fn test_batch_reports_failures_by_name() {
        let root = tempfile::tempdir().unwrap();
        write_experiment(&root.path().join("a"), "exp_a", TRACE);
        write_experiment(&root.path().join("nested/b"), "exp_b", TRACE);
        // Config points at a trace that isn't there
        let broken = root.path().join("nested/c");
        write_experiment(&broken, "exp_c", TRACE);
        fs::remove_file(broken.join("regmon.txt")).unwrap();
        // Not an experiment at all
        fs::create_dir_all(root.path().join("plots")).unwrap();

        let opts = BatchOptions {
            workers: 2,
            ..Default::default()
        };
        let report = run_batch(root.path(), &opts).unwrap();
        assert_eq!(report.len(), 3);

        let names: Vec<_> = report
            .successes
            .iter()
            .map(|o| o.meas_name.as_str())
            .collect();
        assert_eq!(names, vec!["exp_a", "exp_b"]);
        for o in &report.successes {
            assert_eq!(o.analysis.estimate.effective_airtime, 0.75);
        }

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].dir, broken);
        assert!(matches!(
            report.failures[0].error,
            ExperimentError::Trace(TraceError::Io { .. })
        ));
    }

    #[test]
    fn test_empty_tree() {
        let root = tempfile::tempdir().unwrap();
        let report = run_batch(root.path(), &BatchOptions::default()).unwrap();
        assert!(report.is_empty());
    }

    #[test]
    fn test_missing_root() {
        let root = tempfile::tempdir().unwrap();
        assert!(find_experiments(&root.path().join("missing")).is_err());
    }
}
