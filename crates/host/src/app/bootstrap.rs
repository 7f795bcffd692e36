use std::env;
use std::path::Path;
use std::time::Duration;

use engine::{load_settings, EngineSettings, CONFIG_ENV_VAR};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use super::loop_runner::{AppError, LoopConfig};

const RUN_SECONDS_ENV_VAR: &str = "AUTOCAST_RUN_SECONDS";
const SEED_ENV_VAR: &str = "AUTOCAST_SEED";
const TPS_ENV_VAR: &str = "AUTOCAST_TPS";

pub(crate) struct AppWiring {
    pub(crate) settings: EngineSettings,
    pub(crate) config: LoopConfig,
}

pub(crate) fn build_app() -> Result<AppWiring, AppError> {
    init_tracing();
    info!("=== Autocast Startup ===");

    let settings = load_settings_from_env()?;
    let defaults = LoopConfig::default();
    let config = LoopConfig {
        target_tps: resolve_u64_env(TPS_ENV_VAR)
            .map_or(defaults.target_tps, |tps| tps.min(u32::MAX as u64) as u32),
        run_for: resolve_u64_env(RUN_SECONDS_ENV_VAR)
            .filter(|seconds| *seconds > 0)
            .map(Duration::from_secs),
        seed: resolve_u64_env(SEED_ENV_VAR),
        ..defaults
    };

    Ok(AppWiring { settings, config })
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

fn load_settings_from_env() -> Result<EngineSettings, AppError> {
    match env::var(CONFIG_ENV_VAR) {
        Ok(path) => {
            let settings = load_settings(Path::new(&path))?;
            info!(path = path.as_str(), "settings_loaded");
            Ok(settings)
        }
        Err(env::VarError::NotPresent) => {
            info!(env_var = CONFIG_ENV_VAR, "settings_defaulted");
            Ok(demo_settings())
        }
        Err(source) => Err(AppError::EnvVar {
            var: CONFIG_ENV_VAR,
            source,
        }),
    }
}

/// A handful of rules switched on so the simulated session has something to
/// decide about.
fn demo_settings() -> EngineSettings {
    let mut settings = EngineSettings::default();
    settings.debug = true;
    settings.proximity.require_min_count = true;
    settings.proximity.min_count = 3;
    settings.proximity.rare_min_count = 1;
    settings.blade_flurry.enabled = true;
    settings.blood_rage.enabled = true;
    settings.blood_rage.max_hp_percent = 90.0;
    settings.steel_skin.enabled = true;
    settings.steel_skin.max_hp_percent = 60.0;
    settings.immortal_call.enabled = true;
    settings.immortal_call.max_hp_percent = 35.0;
    settings.phase_run.movement.enabled = true;
    settings.phase_run.movement.min_move_time_ms = 800;
    settings
}

fn resolve_u64_env(var: &'static str) -> Option<u64> {
    match env::var(var) {
        Ok(value) => match parse_u64_setting(&value) {
            Some(parsed) => Some(parsed),
            None => {
                warn!(
                    env_var = var,
                    value = value.as_str(),
                    "invalid env var value; falling back to default"
                );
                None
            }
        },
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            warn!(
                env_var = var,
                error = %err,
                "unable to read env var; falling back to default"
            );
            None
        }
    }
}

fn parse_u64_setting(raw: &str) -> Option<u64> {
    raw.trim().parse::<u64>().ok()
}
