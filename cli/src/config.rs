use anyhow::{Context, Result};
use basket_core::coordinator::CoordinatorConfig;
use directories::ProjectDirs;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_PLAN_DAYS: u32 = 7;

pub struct Config {
    pub db_path: PathBuf,
    /// Length of the meal-plan window the shopping list is built from.
    pub plan_days: u32,
    pub coordinator: CoordinatorConfig,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let db_path = match lookup("BASKET_DB").filter(|v| !v.trim().is_empty()) {
            Some(path) => PathBuf::from(path),
            None => {
                let proj_dirs = ProjectDirs::from("", "", "basket")
                    .context("Could not determine home directory")?;
                proj_dirs.data_dir().join("basket.db")
            }
        };

        if let Some(data_dir) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(data_dir).with_context(|| {
                format!("Failed to create data directory: {}", data_dir.display())
            })?;
        }

        let defaults = CoordinatorConfig::default();
        let plan_days = parse_var(&lookup, "BASKET_PLAN_DAYS")?.unwrap_or(DEFAULT_PLAN_DAYS);
        let debounce = parse_var::<u64>(&lookup, "BASKET_DEBOUNCE_MS")?
            .map_or(defaults.debounce, Duration::from_millis);
        let max_retries = parse_var(&lookup, "BASKET_MAX_RETRIES")?.unwrap_or(defaults.max_retries);

        Ok(Config {
            db_path,
            plan_days: plan_days.max(1),
            coordinator: CoordinatorConfig {
                debounce,
                max_retries,
            },
        })
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow::anyhow!("Invalid value '{raw}' for {key}")),
    }
}
