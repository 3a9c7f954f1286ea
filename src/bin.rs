//! Binary entry point for `survey-bot`.
//!
//! This module provides the command-line interface for survey-bot with options
//! for configuration file paths, logging verbosity, and trace export. It initializes
//! logging, loads the configuration, and starts the bot.

use clap::Parser;
use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::{Protocol, WithExportConfig};
use survey_bot::base::{config::Config, types::Void};
use tracing::error;
use tracing_subscriber::{Layer, fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt};

/// Survey-bot: answers greetings in a Mattermost channel.
///
/// Configuration comes from `MM_*` environment variables (a `.env` file is honored),
/// optionally layered over a TOML file.
#[derive(Parser, Debug)]
#[command(version, author, about, long_about = None)]
struct Args {
    /// Override the config file path (optional).
    ///
    /// By default, the bot will look for a config file at `.hidden/config.toml`
    /// in the current directory.
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,
    /// Increase log verbosity (-v, -vv, etc.).
    ///
    /// Use multiple times to increase verbosity:
    /// - No flag: INFO level
    /// - -v: DEBUG level
    /// - -vv or more: TRACE level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
    /// Export spans to an OTLP collector over HTTP.
    ///
    /// The endpoint is taken from the standard `OTEL_EXPORTER_OTLP_*` variables.
    #[arg(long)]
    otlp: bool,
}

/// Main entry point for the survey-bot binary.
///
/// Sets up logging based on verbosity, loads configuration, and starts the bot.
#[tokio::main]
async fn main() -> Void {
    let args = Args::parse();

    // Construct the level filter.

    let level = match args.verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    let level_filter = tracing_subscriber::filter::LevelFilter::from_level(level);

    // Prepare the log layer.

    let stdout = tracing_subscriber::fmt::layer()
        .with_ansi(true)
        .with_level(true)
        .with_file(false)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE);

    // Prepare the otlp layer, if asked for.

    let otel = if args.otlp {
        let exporter = opentelemetry_otlp::SpanExporter::builder().with_http().with_protocol(Protocol::HttpBinary).build()?;
        let tracer = opentelemetry_sdk::trace::SdkTracerProvider::builder().with_simple_exporter(exporter).build().tracer("survey-bot");
        Some(tracing_opentelemetry::layer().with_tracer(tracer).boxed())
    } else {
        None
    };

    tracing_subscriber::registry().with(otel).with(level_filter).with(stdout).init();

    let result = match Config::load(args.config.as_deref()) {
        Ok(config) => survey_bot::start(config).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        error!("{:#}", e);
        return Err(e);
    }

    Ok(())
}
