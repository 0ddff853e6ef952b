//! `booking` CLI: expand availability, check conflicts, render calendar artifacts and
//! replay booking scenarios from the command line.
//!
//! ## Usage
//!
//! ```sh
//! # Expand a weekly availability request into concrete windows
//! booking expand --start 2024-01-01T09:00:00Z --duration 45 --recurrence weekly --until 2024-01-22T09:00:00Z
//!
//! # Expand an RFC 5545 rule body
//! booking expand --start 2026-03-03T15:00:00Z --duration 60 --rule "FREQ=WEEKLY;BYDAY=TU,TH;COUNT=4"
//!
//! # Check a candidate window against existing intervals (stdin → stdout)
//! cat intervals.json | booking check --start 2024-01-01T09:15:00Z --end 2024-01-01T09:45:00Z
//!
//! # Render the .ics artifact for a booking notice
//! booking ics -i notice.json -o booking.ics
//!
//! # Replay a scenario against the in-memory engine
//! RUST_LOG=booking_engine=debug booking simulate -i scenario.json
//! ```

mod scenario;

use anyhow::{Context, Result};
use booking_engine::calendar::CalendarEncoder;
use booking_engine::conflict::find_conflicts;
use booking_engine::model::{ProfessionalId, Service, ServiceId};
use booking_engine::{BookingNotice, EngineConfig, IcsEncoder, RecurrenceKind, SlotGenerator, TimeWindow};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::io::{self, Read};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "booking",
    version,
    about = "Appointment scheduling engine CLI"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Expand an availability request into candidate windows
    Expand {
        /// First occurrence start (RFC 3339)
        #[arg(long)]
        start: DateTime<Utc>,
        /// Service duration in minutes
        #[arg(long)]
        duration: u32,
        /// none, daily, weekly or monthly
        #[arg(long, default_value = "none")]
        recurrence: String,
        /// Inclusive end of the series (RFC 3339)
        #[arg(long)]
        until: Option<DateTime<Utc>>,
        /// RFC 5545 rule body; takes precedence over --recurrence
        #[arg(long)]
        rule: Option<String>,
        /// Output file (writes to stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Check a candidate window against a JSON array of existing windows
    Check {
        /// Input file with `[{"start": .., "end": ..}, ..]` (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
        /// Candidate start (RFC 3339)
        #[arg(long)]
        start: DateTime<Utc>,
        /// Candidate end (RFC 3339)
        #[arg(long)]
        end: DateTime<Utc>,
    },
    /// Render the iCalendar artifact for a booking notice
    Ics {
        /// Input notice JSON (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
        /// Output file (writes to stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
        /// PRODID for the calendar (defaults to BOOKING_CALENDAR_PRODID)
        #[arg(long, allow_hyphen_values = true)]
        prodid: Option<String>,
    },
    /// Replay a scenario against the in-memory engine
    Simulate {
        /// Scenario JSON (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = EngineConfig::from_env();

    match cli.command {
        Commands::Expand {
            start,
            duration,
            recurrence,
            until,
            rule,
            output,
        } => {
            let service = Service {
                id: ServiceId::new(),
                professional_id: ProfessionalId::new(),
                name: "expand".to_string(),
                duration_minutes: duration,
                price_cents: 0,
                active: true,
            };
            let generator = SlotGenerator::new(config.max_occurrences);
            let windows: Vec<TimeWindow> = match rule.as_deref() {
                Some(rule) => generator
                    .generate_rule(&service, start, rule, until)
                    .context("Failed to expand rule")?,
                None => {
                    let kind: RecurrenceKind = recurrence
                        .parse()
                        .context("Invalid --recurrence")?;
                    generator
                        .generate(&service, start, kind, until)
                        .context("Failed to expand availability")?
                        .collect()
                }
            };
            tracing::info!(count = windows.len(), "expanded availability");
            let pretty = serde_json::to_string_pretty(&windows)?;
            write_output(output.as_deref(), &pretty)?;
        }
        Commands::Check { input, start, end } => {
            let candidate = TimeWindow::new(start, end).context("Invalid candidate window")?;
            let raw = read_input(input.as_deref())?;
            let existing: Vec<TimeWindow> =
                serde_json::from_str(&raw).context("Failed to parse intervals JSON")?;
            for window in &existing {
                TimeWindow::new(window.start, window.end)
                    .with_context(|| format!("Invalid interval {} - {}", window.start, window.end))?;
            }

            let conflicts = find_conflicts(&[candidate], &existing);
            let report = json!({
                "conflict": !conflicts.is_empty(),
                "conflicts": conflicts,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Ics {
            input,
            output,
            prodid,
        } => {
            let raw = read_input(input.as_deref())?;
            let notice: BookingNotice =
                serde_json::from_str(&raw).context("Failed to parse booking notice JSON")?;
            let encoder = IcsEncoder::new(prodid.unwrap_or(config.calendar_prodid));
            let ics = encoder
                .encode(&notice)
                .context("Failed to render calendar artifact")?;
            write_output(output.as_deref(), &ics)?;
        }
        Commands::Simulate { input } => {
            let raw = read_input(input.as_deref())?;
            let scenario: scenario::Scenario =
                serde_json::from_str(&raw).context("Failed to parse scenario JSON")?;
            let runtime = tokio::runtime::Runtime::new().context("Failed to start runtime")?;
            let lines = runtime.block_on(scenario::run(scenario, config))?;
            for line in lines {
                println!("{}", serde_json::to_string(&line)?);
            }
        }
    }

    Ok(())
}

/// Log to stderr so stdout stays machine-readable.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("booking=info,booking_engine=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn read_input(path: Option<&str>) -> Result<String> {
    match path {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path))
        }
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read from stdin")?;
            Ok(buf)
        }
    }
}

fn write_output(path: Option<&str>, content: &str) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write file: {}", path))?;
        }
        None => {
            print!("{}", content);
        }
    }
    Ok(())
}
