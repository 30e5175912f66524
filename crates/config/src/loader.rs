use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{env_subst::substitute_env, schema::WaypostConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "waypost.toml",
    "waypost.yaml",
    "waypost.yml",
    "waypost.json",
];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<WaypostConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Load config from the given path, falling back to defaults when the file
/// cannot be read or parsed. The failure is logged, not propagated: a broken
/// config file must not keep the bridge from starting.
pub fn load_or_default(path: &Path) -> WaypostConfig {
    match load_config(path) {
        Ok(config) => config,
        Err(error) => {
            warn!(path = %path.display(), %error, "failed to load config, using defaults");
            WaypostConfig::default()
        },
    }
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./waypost.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/waypost/waypost.{toml,yaml,yml,json}` (user-global)
///
/// Returns `WaypostConfig::default()` if no config file is found.
pub fn discover_and_load() -> WaypostConfig {
    match find_config_file() {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            load_or_default(&path)
        },
        None => {
            debug!("no config file found, using defaults");
            WaypostConfig::default()
        },
    }
}

/// Find the first config file in standard locations.
fn find_config_file() -> Option<PathBuf> {
    let local = CONFIG_FILENAMES.iter().copied().map(PathBuf::from);
    let global = directories::ProjectDirs::from("", "", "waypost")
        .into_iter()
        .flat_map(|dirs| {
            let dir = dirs.config_dir().to_path_buf();
            CONFIG_FILENAMES.iter().copied().map(move |name| dir.join(name))
        });
    local.chain(global).find(|p| p.exists())
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<WaypostConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}
