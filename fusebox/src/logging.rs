//! Structured logging init, grounded on the teacher's `init_logging` (its
//! `lib.rs`): a `tracing_subscriber::FmtSubscriber` with an `EnvFilter`,
//! installed once as the global default. Setting the subscriber twice in a
//! process (e.g. once per test) is not an error — the second call is ignored.

use tracing_subscriber::EnvFilter;

/// Installs a global `tracing` subscriber. `filter` overrides the default
/// (`fusebox=info`); pass `None` to defer to `RUST_LOG` via `EnvFilter::from_default_env`.
pub fn init(filter: Option<&str>) {
    let env_filter = match filter {
        Some(directive) => EnvFilter::new(directive.to_string()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fusebox=info")),
    };

    let subscriber = tracing_subscriber::fmt().with_env_filter(env_filter).finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::debug!("tracing subscriber already installed, ignoring");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_does_not_panic_when_called_more_than_once() {
        init(Some("fusebox=debug"));
        init(Some("fusebox=warn"));
    }
}
