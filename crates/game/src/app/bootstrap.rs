use std::time::Duration;

use idle_engine::LoopConfig;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const BASE_URL_ENV_VAR: &str = "IDLE_API_BASE_URL";
const POLL_INTERVAL_ENV_VAR: &str = "IDLE_POLL_INTERVAL_MS";
const STALE_AFTER_ENV_VAR: &str = "IDLE_STALE_AFTER_MS";
const REQUEST_TIMEOUT_ENV_VAR: &str = "IDLE_REQUEST_TIMEOUT_MS";
const WORKER_THREADS_ENV_VAR: &str = "IDLE_WORKER_THREADS";
const MAX_RENDER_FPS_ENV_VAR: &str = "IDLE_MAX_RENDER_FPS";

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
}

pub(crate) fn build_app() -> AppWiring {
    init_tracing();
    info!("=== Idle Game Startup ===");

    let config = loop_config_from(|name| std::env::var(name).ok());
    AppWiring { config }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

/// Overlays environment settings on the defaults. Unparseable values are
/// logged and ignored.
fn loop_config_from(lookup: impl Fn(&str) -> Option<String>) -> LoopConfig {
    let mut config = LoopConfig::default();

    if let Some(base_url) = lookup(BASE_URL_ENV_VAR) {
        let trimmed = base_url.trim();
        if trimmed.is_empty() {
            warn!(env_var = BASE_URL_ENV_VAR, "empty_base_url_using_default");
        } else {
            config.api.base_url = trimmed.to_string();
        }
    }
    if let Some(ms) = parse_positive(POLL_INTERVAL_ENV_VAR, lookup(POLL_INTERVAL_ENV_VAR)) {
        config.sync.poll_interval = Duration::from_millis(ms);
    }
    if let Some(ms) = parse_positive(STALE_AFTER_ENV_VAR, lookup(STALE_AFTER_ENV_VAR)) {
        config.sync.stale_after = Duration::from_millis(ms);
    }
    if let Some(ms) = parse_positive(REQUEST_TIMEOUT_ENV_VAR, lookup(REQUEST_TIMEOUT_ENV_VAR)) {
        config.api.request_timeout = Duration::from_millis(ms);
    }
    if let Some(threads) = parse_positive(WORKER_THREADS_ENV_VAR, lookup(WORKER_THREADS_ENV_VAR))
    {
        config.api.worker_threads = threads as usize;
    }
    if let Some(raw) = lookup(MAX_RENDER_FPS_ENV_VAR) {
        match raw.trim().parse::<u32>() {
            // 0 turns the cap off
            Ok(0) => config.max_render_fps = None,
            Ok(fps) => config.max_render_fps = Some(fps),
            Err(_) => warn!(
                env_var = MAX_RENDER_FPS_ENV_VAR,
                value = raw.as_str(),
                "invalid_env_value_using_default"
            ),
        }
    }

    config
}

fn parse_positive(env_var: &'static str, raw: Option<String>) -> Option<u64> {
    let raw = raw?;
    match raw.trim().parse::<u64>() {
        Ok(value) if value > 0 => Some(value),
        _ => {
            warn!(
                env_var,
                value = raw.as_str(),
                "invalid_env_value_using_default"
            );
            None
        }
    }
}
