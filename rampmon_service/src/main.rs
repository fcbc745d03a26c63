//! rampmon - lake level at the boat ramp.
//!
//! Modes:
//! - default: a single pass that fetches (or hits the cache), applies `--ramp` and renders
//! - `--interactive`: read ramp elevations from stdin, one pass per line
//! - `--verify`: probe the configured station against the live endpoint

use anyhow::{Context, Result, anyhow};
use chrono::{Local, NaiveDate};
use clap::{Parser, ValueEnum};
use rampmon_service::analysis::depth::summarize;
use rampmon_service::config::AppConfig;
use rampmon_service::ingest::hydromet::{HttpSource, HydrometSource};
use rampmon_service::levels::LevelFetcher;
use rampmon_service::logging::{self, Component};
use rampmon_service::model::{Dataset, EndDatePolicy};
use rampmon_service::render::{
    AxisLabels, ChartRenderer, CsvRenderer, JsonRenderer, RenderError, Renderer, TableRenderer,
};
use rampmon_service::stations::{builtin_stations, find_station, load_stations};
use rampmon_service::verify::run_verification;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "rampmon",
    about = "Reservoir water depth at a boat ramp, from Reclamation Hydromet data"
)]
struct Cli {
    /// Path to a TOML config file. Defaults to ./rampmon.toml if present.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Hydromet station code (e.g. hpd).
    #[arg(long)]
    station: Option<String>,

    /// Last day of the window (YYYY-MM-DD). Defaults per --end-policy.
    #[arg(long)]
    end_date: Option<NaiveDate>,

    /// Which day closes the window when --end-date is absent: today or yesterday.
    #[arg(long)]
    end_policy: Option<EndDatePolicy>,

    /// Days of history before the end date.
    #[arg(long)]
    window_days: Option<i64>,

    /// Ramp (reference) elevation in feet. Defaults to the station's value.
    #[arg(long)]
    ramp: Option<f64>,

    /// Output format.
    #[arg(long, value_enum, default_value_t = Format::Dashboard)]
    format: Format,

    /// Read successive ramp elevations from stdin.
    #[arg(long, default_value_t = false)]
    interactive: bool,

    /// Check the station against the live endpoint and print a JSON report.
    #[arg(long, default_value_t = false)]
    verify: bool,

    /// Timestamped console log lines.
    #[arg(long, default_value_t = false)]
    timestamps: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    /// Summary, chart and raw data table.
    Dashboard,
    Table,
    Chart,
    Json,
    Csv,
}

impl Format {
    fn label(self) -> &'static str {
        match self {
            Format::Dashboard => "dashboard",
            Format::Table => "table",
            Format::Chart => "chart",
            Format::Json => "json",
            Format::Csv => "csv",
        }
    }
}

struct PassSettings {
    end_date: Option<NaiveDate>,
    end_policy: EndDatePolicy,
    window_days: i64,
    format: Format,
}

impl PassSettings {
    fn end_date(&self) -> NaiveDate {
        self.end_date
            .unwrap_or_else(|| self.end_policy.resolve(Local::now().date_naive()))
    }
}

fn render_dashboard(dataset: &Dataset, title: &str, labels: &AxisLabels) -> Result<(), RenderError> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    writeln!(out, "{}", title)?;
    if let Some(summary) = summarize(dataset) {
        writeln!(
            out,
            "Depth at ramp ({:.1} ft): {:.2} ft on {}  (range {:.2} to {:.2}, change {:+.2})",
            summary.reference_elevation_ft,
            summary.latest_depth_ft,
            summary.latest_timestamp.format("%Y-%m-%d"),
            summary.min_depth_ft,
            summary.max_depth_ft,
            summary.change_ft
        )?;
    }
    writeln!(out)?;

    let mut chart = ChartRenderer::new(&mut out);
    chart.render(dataset, labels)?;

    writeln!(out)?;
    writeln!(out, "raw data from usbr.gov")?;
    let mut table = TableRenderer::new(&mut out);
    table.render(dataset, labels)?;
    Ok(())
}

fn run_pass<S: HydrometSource>(
    fetcher: &mut LevelFetcher<S>,
    settings: &PassSettings,
    reference: f64,
) -> Result<()> {
    let dataset = fetcher.depth_at_ramp(settings.end_date(), settings.window_days, reference)?;
    let labels = AxisLabels::default();
    let stdout = io::stdout();

    let rendered = match settings.format {
        Format::Dashboard => {
            let title = format!("{} level at ramp", fetcher.station().name);
            render_dashboard(&dataset, &title, &labels)
        }
        Format::Table => TableRenderer::new(stdout.lock()).render(&dataset, &labels),
        Format::Chart => ChartRenderer::new(stdout.lock()).render(&dataset, &labels),
        Format::Json => JsonRenderer::new(stdout.lock()).render(&dataset, &labels),
        Format::Csv => CsvRenderer::new(stdout.lock()).render(&dataset, &labels),
    };
    rendered.inspect_err(|e| {
        logging::log_render_failure(&fetcher.station().code, settings.format.label(), e)
    })?;
    Ok(())
}

fn run_interactive<S: HydrometSource>(
    fetcher: &mut LevelFetcher<S>,
    settings: &PassSettings,
    initial_reference: f64,
) -> Result<()> {
    let mut reference = initial_reference;
    let mut passes = 0;
    let mut failed = 0;

    let stdin = io::stdin();
    loop {
        eprint!("ramp elevation [{}] (q to quit): ", reference);
        io::stderr().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.eq_ignore_ascii_case("q") || input.eq_ignore_ascii_case("quit") {
            break;
        }
        if !input.is_empty() {
            match input.parse::<f64>() {
                Ok(value) => reference = value,
                Err(_) => {
                    logging::warn(Component::System, None, &format!("'{}' is not a number", input));
                    continue;
                }
            }
        }

        passes += 1;
        if let Err(e) = run_pass(fetcher, settings, reference) {
            failed += 1;
            logging::error(Component::System, Some(&fetcher.station().code), &format!("{:#}", e));
        }
    }

    logging::log_session_summary(passes, failed, fetcher.network_fetches());
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(station) = cli.station {
        config.station = station;
    }
    if let Some(days) = cli.window_days {
        config.window_days = days;
    }
    if let Some(policy) = cli.end_policy {
        config.end_date_policy = policy;
    }
    config.validate()?;

    logging::init_logger(config.log_level, config.log_file.as_deref(), cli.timestamps);

    let stations = match &config.stations_file {
        Some(path) => load_stations(path)?,
        None => builtin_stations(),
    };
    let station = find_station(&stations, &config.station)
        .cloned()
        .ok_or_else(|| anyhow!("unknown station '{}'", config.station))?;

    if cli.verify {
        let report = run_verification(&config, std::slice::from_ref(&station))?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let reference = cli.ramp.unwrap_or(station.default_reference_ft);
    let settings = PassSettings {
        end_date: cli.end_date,
        end_policy: config.end_date_policy,
        window_days: config.window_days,
        format: cli.format,
    };

    let source = HttpSource::new(config.http_timeout())?;
    let mut fetcher = LevelFetcher::from_config(source, &config, station);

    if cli.interactive {
        run_interactive(&mut fetcher, &settings, reference)
    } else {
        run_pass(&mut fetcher, &settings, reference)
    }
}
