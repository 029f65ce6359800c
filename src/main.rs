//! gradient-infill CLI
//!
//! Rewrites a sliced G-Code program so extrusion is increased around the
//! reinforcement targets of a job file.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use gradient_infill::{init_logging, run_job, JobConfig, LogFormat};

#[derive(Parser)]
#[command(name = "gradient-infill")]
#[command(version, long_version = LONG_VERSION)]
#[command(about = "Gradient infill reinforcement post-processor for G-Code", long_about = None)]
struct Cli {
    /// Input G-Code file, `-` for stdin
    input: PathBuf,

    /// Job configuration (.json or .toml)
    #[arg(short, long)]
    config: PathBuf,

    /// Output file (stdout if omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Only load and validate the job configuration
    #[arg(long)]
    validate: bool,

    /// Print the rewrite report as JSON on stdout (requires --output)
    #[arg(long, requires = "output")]
    report: bool,

    /// Log record format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

const LONG_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (built ", env!("BUILD_DATE"), ")");

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read G-Code from stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read G-Code from {}", path.display()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format)?;

    let job = JobConfig::load_from_file(&cli.config)
        .with_context(|| format!("Invalid job configuration {}", cli.config.display()))?;

    if cli.validate {
        tracing::info!(
            "{} is valid: {} targets",
            cli.config.display(),
            job.targets.len()
        );
        return Ok(());
    }

    let gcode = read_input(&cli.input)?;
    let output = run_job(&job, &gcode)?;

    match &cli.output {
        Some(path) => {
            std::fs::write(path, &output.gcode)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!("Wrote {}", path.display());

            if cli.report {
                let report = serde_json::to_string_pretty(&output.report)
                    .context("Failed to serialize report")?;
                println!("{}", report);
            }
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(output.gcode.as_bytes())
                .context("Failed to write G-Code to stdout")?;
            stdout.flush()?;
        }
    }

    Ok(())
}
