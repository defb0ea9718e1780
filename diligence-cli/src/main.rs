//! Diligence CLI
//!
//! Builds a scored due-diligence report from a protocol record.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use diligence_core::{format_usd, HackRecord, ProtocolDetail, ResearchReport, Target};
use diligence_runtime::{DiligenceConfig, ResearchMode, Researcher};

#[derive(Parser)]
#[command(name = "diligence")]
#[command(author, version, about = "Diligence: DeFi protocol due-diligence reports", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level (0-3)
    #[arg(short, long, default_value = "1", global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a report from a protocol record
    Report {
        /// Protocol detail JSON as served by the TVL aggregator
        #[arg(short, long)]
        detail: PathBuf,

        /// Hack records JSON (an array; records naming other protocols are ignored)
        #[arg(long)]
        hacks: Option<PathBuf>,

        /// Include third-party research (default: verified protocol data only)
        #[arg(long)]
        full: bool,

        /// Days of TVL history in the snapshot
        #[arg(long)]
        days: Option<usize>,

        /// TOML configuration file
        #[arg(short, long, env = "DILIGENCE_CONFIG")]
        config: Option<PathBuf>,

        /// Single-line JSON instead of pretty-printed
        #[arg(long)]
        compact: bool,

        /// Write the report to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Recompute the score of a saved report
    Score {
        /// Report JSON produced by `diligence report`
        #[arg(short, long)]
        report: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => Level::ERROR,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    match cli.command {
        Commands::Report {
            detail,
            hacks,
            full,
            days,
            config,
            compact,
            output,
        } => {
            let mut config = DiligenceConfig::load_optional(config.as_deref())?;
            if let Some(days) = days {
                config.report.history_days = days;
            }
            let mode = if full { ResearchMode::Full } else { ResearchMode::VerifiedOnly };
            run_report(&detail, hacks.as_deref(), mode, &config, compact, output).await?;
        }
        Commands::Score { report } => {
            run_score(&report)?;
        }
    }

    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read {} from {}", what, path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {} in {}", what, path.display()))
}

/// Keep unnamed records and records naming this protocol
fn hacks_for(protocol: &str, hacks: Vec<HackRecord>) -> Vec<HackRecord> {
    hacks
        .into_iter()
        .filter(|h| match &h.name {
            Some(name) => name.trim().eq_ignore_ascii_case(protocol.trim()),
            None => true,
        })
        .collect()
}

async fn run_report(
    detail_path: &Path,
    hacks_path: Option<&Path>,
    mode: ResearchMode,
    config: &DiligenceConfig,
    compact: bool,
    output: Option<PathBuf>,
) -> Result<()> {
    let detail: ProtocolDetail = read_json(detail_path, "protocol detail")?;
    let hacks = match hacks_path {
        Some(path) => hacks_for(&detail.name, read_json(path, "hack records")?),
        None => Vec::new(),
    };

    eprintln!("🔎 Researching {} ({:?})", detail.name, mode);
    let researcher = Researcher::new(config)?;
    let report = researcher.research(&Target::new(detail, hacks), mode).await?;

    let json = if compact {
        serde_json::to_string(&report)?
    } else {
        serde_json::to_string_pretty(&report)?
    };

    match output {
        Some(path) => {
            fs::write(&path, &json).with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Report saved to {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{}", json)?;
        }
    }

    print_summary(&report);
    Ok(())
}

fn print_summary(report: &ResearchReport) {
    eprintln!(
        "📊 {}: {}/10 ({}) | TVL {} | confidence {:?}",
        report.protocol.name,
        report.score.score,
        report.score.label,
        format_usd(report.protocol.current_tvl_usd),
        report.confidence
    );
    for risk in report.top_risks.iter().take(3) {
        eprintln!("   ⚠️  {}", risk);
    }
}

fn run_score(path: &Path) -> Result<()> {
    let report: ResearchReport = read_json(path, "report")?;
    let score = report.rescore();
    println!("{}", serde_json::to_string_pretty(&score)?);
    if score != report.score {
        eprintln!("⚠️  Stored score {} differs from recomputed {}", report.score.score, score.score);
    }
    Ok(())
}
