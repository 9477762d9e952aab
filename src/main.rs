use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use regmon_airtime::{
    args::{convert_filter, Args},
    batch::{analyze_trace, run_batch, BatchOptions, BatchReport, TraceAnalysis},
    estimator::AirtimeEstimator,
};
use tracing::info;

fn print_analysis(label: &str, analysis: &TraceAnalysis) {
    let est = &analysis.estimate;
    println!(
        "{:<40} {:>9.6} {:>9.6} {:>8} {:>8}",
        label,
        est.effective_airtime,
        est.interference_duty_cycle,
        est.intervals_considered,
        analysis.skipped.len()
    );
}

fn print_header(threshold: f64) {
    println!(
        "# ED detector, threshold {}, {}",
        threshold,
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!(
        "{:<40} {:>9} {:>9} {:>8} {:>8}",
        "measurement", "airtime", "duty", "bins", "skipped"
    );
}

fn print_report(report: &BatchReport) {
    for outcome in &report.successes {
        print_analysis(&outcome.meas_name, &outcome.analysis);
    }
    if !report.failures.is_empty() {
        println!("# {} failed", report.failures.len());
        for failure in &report.failures {
            println!("# {}: {}", failure.dir.display(), failure.error);
        }
    }
}

fn main() -> anyhow::Result<()> {
    // Get the CLI options
    let args = Args::parse();

    // Setup logging
    tracing_subscriber::fmt()
        .with_max_level(convert_filter(args.verbose.log_level_filter()))
        .init();

    let opts = BatchOptions {
        radix: args.radix,
        estimator: AirtimeEstimator::new(args.threshold)?,
        workers: args.workers.into(),
    };

    info!("Running the ED detector ... start");
    print_header(args.threshold);
    if args.path.is_dir() {
        let report = run_batch(&args.path, &opts)
            .with_context(|| format!("walking {}", args.path.display()))?;
        print_report(&report);
    } else {
        let analysis = analyze_trace(&args.path, &opts)?;
        info!("{}", analysis.timing);
        print_analysis(&args.path.display().to_string(), &analysis);
    }
    info!("Running the ED detector ... stop");
    Ok(())
}
