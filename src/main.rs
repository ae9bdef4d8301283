mod config;
mod data;
mod error;
mod forecast;
mod invocation;
mod output;
mod report;
mod table;
#[cfg(test)]
mod test_support;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use clap::{Args, Parser, Subcommand};
use std::sync::Arc;
use config::{Config, EnvConfig, SourceKind};
use data::clickhouse::ClickHouseSource;
use data::snapshot::SnapshotStore;
use data::types::{parse_timestamp, TimeWindow};
use data::window::context_window;
use data::LoadSource;
use forecast::endpoint::HttpInferenceClient;
use forecast::handler::ForecastHandler;
use forecast::types::ForecastEvent;
use invocation::{invoke_forecast, FunctionInvoker, HttpFunctionInvoker, LocalInvoker};
use output::csv::{write_frame_to, ReportWriter};

#[derive(Parser, Debug)]
#[command(author, version, about = "Zero-shot load forecasts from total_load_data", long_about = None)]
struct Cli {
    /// Path to the TOML configuration
    #[arg(long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the forecast handler in-process and print its response
    Forecast(ForecastArgs),
    /// Invoke the remote forecast function and print the forecast table
    Invoke(InvokeArgs),
    /// Merge recent history with one or more forecasts into a CSV file
    Report {
        /// Initialization timestamps, one forecast each
        #[arg(long = "init", required = true, value_parser = parse_cli_timestamp)]
        inits: Vec<NaiveDateTime>,
        /// History starts this many days before the latest initialization timestamp
        #[arg(long)]
        lookback_days: Option<u32>,
        #[command(flatten)]
        shape: ShapeArgs,
        /// Comma-separated quantile levels; the remote function picks its own
        #[arg(long, value_delimiter = ',', requires = "local")]
        quantiles: Option<Vec<f64>>,
        /// Run the handler in-process instead of invoking the function
        #[arg(long, default_value_t = false)]
        local: bool,
        #[arg(long, default_value = "forecast_report.csv")]
        output: String,
    },
    /// Copy a context window from ClickHouse into the SQLite snapshot
    Snapshot {
        #[arg(long, value_parser = parse_cli_timestamp)]
        init: NaiveDateTime,
        #[arg(long)]
        frequency: Option<u32>,
        #[arg(long)]
        context_length: Option<u32>,
    },
}

#[derive(Args, Debug)]
struct ForecastArgs {
    #[arg(long, value_parser = parse_cli_timestamp)]
    init: NaiveDateTime,
    #[command(flatten)]
    shape: ShapeArgs,
    /// Comma-separated, e.g. 0.1,0.5,0.9
    #[arg(long, value_delimiter = ',')]
    quantiles: Option<Vec<f64>>,
}

/// The remote payload has no quantile field, so none is accepted here.
#[derive(Args, Debug)]
struct InvokeArgs {
    #[arg(long, value_parser = parse_cli_timestamp)]
    init: NaiveDateTime,
    #[command(flatten)]
    shape: ShapeArgs,
}

/// Overrides for the `[forecast]` defaults.
#[derive(Args, Debug)]
struct ShapeArgs {
    #[arg(long)]
    frequency: Option<u32>,
    #[arg(long)]
    context_length: Option<u32>,
    #[arg(long)]
    prediction_length: Option<u32>,
}

fn parse_cli_timestamp(s: &str) -> Result<NaiveDateTime, String> {
    parse_timestamp(s).map_err(|e| format!("expected YYYY-MM-DD HH:MM:SS or ISO form: {}", e))
}

impl ShapeArgs {
    /// Event for a remote invoke: no quantile levels.
    fn event(&self, config: &Config, init: NaiveDateTime) -> ForecastEvent {
        let defaults = &config.forecast;
        ForecastEvent {
            initialization_timestamp: init,
            frequency: self.frequency.unwrap_or(defaults.frequency),
            context_length: self.context_length.unwrap_or(defaults.context_length),
            prediction_length: self.prediction_length.unwrap_or(defaults.prediction_length),
            quantile_levels: None,
        }
    }

    /// Event for an in-process run, quantiles falling back to `[forecast]`.
    fn local_event(&self, config: &Config, init: NaiveDateTime, quantiles: Option<&[f64]>) -> ForecastEvent {
        ForecastEvent {
            quantile_levels: Some(
                quantiles
                    .map(<[f64]>::to_vec)
                    .unwrap_or_else(|| config.forecast.quantile_levels.clone()),
            ),
            ..self.event(config, init)
        }
    }
}

fn build_source(config: &Config, env: &EnvConfig) -> Result<Arc<dyn LoadSource>> {
    match config.source.kind {
        SourceKind::Clickhouse => Ok(Arc::new(clickhouse_source(config, env))),
        SourceKind::Sqlite => Ok(Arc::new(
            SnapshotStore::new(&config.source.sqlite_path, &config.source.table)
                .with_context(|| format!("Failed to open snapshot: {}", config.source.sqlite_path))?,
        )),
    }
}

fn clickhouse_source(config: &Config, env: &EnvConfig) -> ClickHouseSource {
    ClickHouseSource::new(
        config.clickhouse.url.clone(),
        config.clickhouse.database.clone(),
        config.source.table.clone(),
        env.clickhouse_user.clone(),
        env.clickhouse_password.clone(),
    )
}

fn build_handler(config: &Config, env: &EnvConfig) -> Result<ForecastHandler> {
    let model = HttpInferenceClient::new(
        config.inference.base_url.clone(),
        config.inference.model_id.clone(),
        env.inference_api_key.clone(),
    );
    Ok(ForecastHandler::new(build_source(config, env)?, Arc::new(model)))
}

fn build_invoker(config: &Config, env: &EnvConfig) -> HttpFunctionInvoker {
    HttpFunctionInvoker::new(
        config.function.base_url.clone(),
        config.function.function_name.clone(),
        env.function_api_key.clone(),
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    tracing::info!("Loading configuration from {}", cli.config);
    let env_config = EnvConfig::load()?;
    let mut config = Config::load(&cli.config)?;
    config.apply_env(&env_config);
    tracing::info!("Data source: {:?} ({})", config.source.kind, config.source.table);

    match cli.command {
        Command::Forecast(args) => {
            let event = args.shape.local_event(&config, args.init, args.quantiles.as_deref());
            let handler = build_handler(&config, &env_config)?;
            let response = handler.handle(&event).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Invoke(args) => {
            let event = args.shape.event(&config, args.init);
            let invoker = build_invoker(&config, &env_config);
            let df = invoke_forecast(&invoker, &event).await?;
            write_frame_to(std::io::stdout().lock(), &df)?;
        }
        Command::Report { inits, lookback_days, shape, quantiles, local, output } => {
            let source = build_source(&config, &env_config)?;
            let invoker: Box<dyn FunctionInvoker> = if local {
                Box::new(LocalInvoker::new(Arc::new(build_handler(&config, &env_config)?)))
            } else {
                Box::new(build_invoker(&config, &env_config))
            };

            let events: Vec<ForecastEvent> = inits
                .iter()
                .map(|init| {
                    if local {
                        shape.local_event(&config, *init, quantiles.as_deref())
                    } else {
                        shape.event(&config, *init)
                    }
                })
                .collect();
            let anchor = inits.iter().max().copied().context("no initialization timestamps")?;
            let lookback = lookback_days.unwrap_or(config.forecast.history_lookback_days);

            let df = report::build_report(source.as_ref(), invoker.as_ref(), anchor, lookback, &events).await?;
            ReportWriter::new(output.clone()).write_frame(&df)?;
            tracing::info!("Wrote {} rows to {}", df.height(), output);
        }
        Command::Snapshot { init, frequency, context_length } => {
            let window: TimeWindow = context_window(
                init,
                frequency.unwrap_or(config.forecast.frequency),
                context_length.unwrap_or(config.forecast.context_length),
            )?;
            let rows = clickhouse_source(&config, &env_config).query(&window).await?;
            let store = SnapshotStore::new(&config.source.sqlite_path, &config.source.table)?;
            store.insert_observations(&rows)?;
            tracing::info!("Snapshot now holds {} rows", store.count()?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const INIT: &str = "2025-08-19 00:00:00";

    fn config() -> Config {
        Config::parse(
            r#"
            [inference]
            base_url = "http://localhost:8080"
            model_id = "chronos-bolt-base"

            [function]
            base_url = "http://localhost:9000"
            function_name = "chronos-forecast"
            "#,
        )
        .unwrap()
    }

    #[test]
    fn test_invoke_rejects_quantiles() {
        let parsed = Cli::try_parse_from(["loadcast", "invoke", "--init", INIT, "--quantiles", "0.1,0.9"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_remote_report_rejects_quantiles() {
        let parsed = Cli::try_parse_from(["loadcast", "report", "--init", INIT, "--quantiles", "0.1,0.9"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_local_report_takes_quantiles() {
        let cli = Cli::try_parse_from([
            "loadcast", "report", "--init", INIT, "--local", "--quantiles", "0.2,0.8",
        ])
        .unwrap();

        match cli.command {
            Command::Report { shape, quantiles, local, .. } => {
                assert!(local);
                let event = shape.local_event(&config(), parse_timestamp(INIT).unwrap(), quantiles.as_deref());
                assert_eq!(event.quantile_levels, Some(vec![0.2, 0.8]));
            }
            other => panic!("expected report, got {:?}", other),
        }
    }

    #[test]
    fn test_remote_event_has_no_quantiles() {
        let cli = Cli::try_parse_from(["loadcast", "invoke", "--init", INIT, "--prediction-length", "8"]).unwrap();

        match cli.command {
            Command::Invoke(args) => {
                let event = args.shape.event(&config(), args.init);
                assert_eq!(event.quantile_levels, None);
                assert_eq!(event.prediction_length, 8);
            }
            other => panic!("expected invoke, got {:?}", other),
        }
    }

    #[test]
    fn test_forecast_quantiles_default_from_config() {
        let cli = Cli::try_parse_from(["loadcast", "forecast", "--init", INIT]).unwrap();
        let config = config();

        match cli.command {
            Command::Forecast(args) => {
                let event = args.shape.local_event(&config, args.init, args.quantiles.as_deref());
                assert_eq!(event.quantile_levels, Some(config.forecast.quantile_levels.clone()));
            }
            other => panic!("expected forecast, got {:?}", other),
        }
    }
}
