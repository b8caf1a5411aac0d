use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    EnvFilter, filter::Targets, fmt, prelude::__tracing_subscriber_SubscriberExt,
    util::SubscriberInitExt,
};

/// Dependencies that are chatty at debug level: HTTP plumbing and the
/// storage engine's compaction and journal events.
const NOISY_TARGETS: [&str; 4] = ["hyper_util", "reqwest", "fjall", "lsm_tree"];

/// Default filter when `RUST_LOG` is unset. Quiet runs only show provider
/// failures, rejected rates and stale warnings.
fn default_directives(verbose: bool) -> String {
    if !verbose {
        return "warn".to_string();
    }
    NOISY_TARGETS
        .iter()
        .fold("info,ratekeeper=debug".to_string(), |acc, target| {
            format!("{acc},{target}=warn")
        })
}

/// Installs the global subscriber.
///
/// `timestamps` is meant for the long running `watch` command, where the
/// spacing between refresh cycles matters; one-shot commands omit them.
pub fn init_logging(verbose: bool, timestamps: bool) {
    let app_level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    let app_filter = Targets::new()
        .with_target("ratekeeper", app_level)
        .with_default(LevelFilter::WARN);
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)));

    tracing_subscriber::registry()
        .with(timestamps.then(|| fmt::layer().pretty()))
        .with((!timestamps).then(|| fmt::layer().pretty().without_time()))
        .with(app_filter)
        .with(env_filter)
        .init();
}
