use crate::env::{env_or, LOKI_JSON_LOG_LEVEL_ENV};
use crate::formatter::JsonFormat;
use crate::layer::JsonEventFormat;
use serde::{Deserialize, Serialize};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry};

/// Stream the JSON lines are written to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputTarget {
    #[default]
    Stdout,
    Stderr,
}

/// Configuration of the installed subscriber.
///
/// **Fields**
/// - `default_level`: filter directive used when `RUST_LOG` is not set,
///   e.g. `"info"` or `"warn,my_service=debug"`.
/// - `target`: stream the JSON lines go to.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerConfig {
    pub default_level: String,
    pub target: OutputTarget,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            default_level: env_or(LOKI_JSON_LOG_LEVEL_ENV, "info"),
            target: OutputTarget::Stdout,
        }
    }
}

/// Error type returned when installing the global subscriber.
#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error("invalid level filter {directive:?}")]
    Filter {
        directive: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },

    #[error(transparent)]
    SetGlobal(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Initialize the global `tracing` subscriber with `formatter` and
/// [`LayerConfig`].
///
/// **Parameters**
/// - `formatter`: any [`JsonFormat`]; each event becomes one JSON line.
/// - `config`: [`LayerConfig`] selecting the fallback filter and stream.
///
/// **Effects**
///
/// Installs a [`Registry`] combined with an [`EnvFilter`] and a `fmt`
/// layer using [`JsonEventFormat`] as the global default subscriber.
/// Fails if a global subscriber is already set.
pub fn init_tracing_with_config<F>(formatter: F, config: LayerConfig) -> Result<(), InitError>
where
    F: JsonFormat + 'static,
{
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.default_level).map_err(|source| InitError::Filter {
            directive: config.default_level.clone(),
            source,
        })?,
    };
    let format = JsonEventFormat::new(formatter);

    // The writer is part of the layer type, so each stream gets its own
    // subscriber.
    match config.target {
        OutputTarget::Stdout => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .event_format(format)
                .with_writer(std::io::stdout);
            let subscriber = Registry::default().with(filter).with(fmt_layer);
            tracing::subscriber::set_global_default(subscriber)?;
        }
        OutputTarget::Stderr => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .event_format(format)
                .with_writer(std::io::stderr);
            let subscriber = Registry::default().with(filter).with(fmt_layer);
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }

    tracing::debug!(target: "tracing_loki_json", ?config, "json logging initialized");
    Ok(())
}

/// Initialize tracing with sensible defaults.
///
/// Equivalent to calling [`init_tracing_with_config`] with
/// [`LayerConfig::default`].
pub fn init_tracing<F>(formatter: F) -> Result<(), InitError>
where
    F: JsonFormat + 'static,
{
    init_tracing_with_config(formatter, LayerConfig::default())
}
