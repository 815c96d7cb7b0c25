use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use time_lapse::args::Args;
use time_lapse::logging::{init_logging, LogConfig};
use time_lapse::processor::Processor;

fn main() {
    let args = Args::parse();
    let quiet = args.quiet;

    let log_config = LogConfig::for_input(&args.input)
        .with_debug(args.debug)
        .with_console(!quiet);
    let log_guard = match init_logging(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(args) {
        error!("{:#}", e);
        // The console layer already echoed it unless quiet
        if quiet {
            eprintln!("Error: {:#}", e);
        }
        drop(log_guard);
        std::process::exit(1);
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let config = args.into_config().context("Invalid arguments")?;
    info!("Processing {} at {} fps", config.input_dir.display(), config.fps);

    let summary = Processor::new(config).run()?;
    info!(
        "Wrote {} frames of {} to {} in {:.1}s (skipped={}, verified={})",
        summary.frames_written,
        summary.frame_size,
        summary.output.display(),
        summary.elapsed.as_secs_f64(),
        summary.frames_skipped,
        summary.verified
    );
    info!("Done");
    Ok(())
}
