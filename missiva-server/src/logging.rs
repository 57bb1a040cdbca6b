use anyhow::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Inizializza il subscriber globale. RUST_LOG, se presente, vince su `log_level`.
pub fn init_logging(log_level: &str, log_format: &str) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))?;

    let registry = tracing_subscriber::registry().with(env_filter);
    match log_format {
        "json" => registry.with(fmt::layer().json()).try_init()?,
        "pretty" => registry.with(fmt::layer().pretty()).try_init()?,
        _ => registry.with(fmt::layer().compact()).try_init()?,
    }
    Ok(())
}
