mod identity;
mod settings;

pub use identity::Actor;
pub use settings::{BackendSettings, Config, DisplaySettings, OperatorSettings};

use crate::error::{BillingError, Result};
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_URL: &str = "BILLING_URL";
pub const ENV_API_KEY: &str = "BILLING_API_KEY";
pub const ENV_ACTOR: &str = "BILLING_ACTOR";

/// Get the config directory path (XDG config dir, or ~/.billing/)
pub fn config_dir() -> Result<PathBuf> {
    if let Some(proj_dirs) = ProjectDirs::from("", "", "billing") {
        return Ok(proj_dirs.config_dir().to_path_buf());
    }

    // Fallback to ~/.billing/
    let home = std::env::var_os("HOME").map(PathBuf::from).ok_or_else(|| {
        BillingError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Could not determine home directory",
        ))
    })?;

    Ok(home.join(".billing"))
}

/// Load config.toml, then apply BILLING_URL / BILLING_API_KEY overrides
pub fn load_config(config_dir: &Path) -> Result<Config> {
    let mut config = read_config_file(config_dir)?;

    if let Some(url) = env_value(ENV_URL) {
        config.backend.url = url;
    }
    if let Some(key) = env_value(ENV_API_KEY) {
        config.backend.api_key = Some(key);
    }

    Ok(config)
}

fn read_config_file(config_dir: &Path) -> Result<Config> {
    let path = config_dir.join("config.toml");
    if !path.exists() {
        return Err(BillingError::ConfigFileNotFound(path));
    }
    let content = fs::read_to_string(&path)?;
    toml::from_str(&content).map_err(|e| BillingError::ConfigParse { path, source: e })
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Resolve the operator identity for mutating commands
pub fn resolve_actor(flag: Option<&str>, config: &Config) -> Result<Actor> {
    let env = env_value(ENV_ACTOR);
    Actor::resolve(flag, env.as_deref(), config.operator.name.as_deref())
}

/// Create the config directory with a template config.toml
pub fn init_config_dir(config_dir: &Path) -> Result<PathBuf> {
    if config_dir.exists() {
        return Err(BillingError::AlreadyInitialized(config_dir.to_path_buf()));
    }

    fs::create_dir_all(config_dir)?;
    let path = config_dir.join("config.toml");
    fs::write(&path, CONFIG_TEMPLATE)?;
    Ok(path)
}

/// Template content for config.toml
pub const CONFIG_TEMPLATE: &str = r#"[backend]
url = "https://your-project.example.com"   # REST endpoint, without /rest/v1
# api_key = "..."                          # or set BILLING_API_KEY

[operator]
# name = "jane.doe"    # recorded on every change; --as or BILLING_ACTOR override it

[display]
currency_symbol = "€"
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_parses() {
        let config: Config = toml::from_str(CONFIG_TEMPLATE).unwrap();
        assert_eq!(config.backend.url, "https://your-project.example.com");
        assert_eq!(config.backend.api_key, None);
        assert_eq!(config.operator.name, None);
        assert_eq!(config.display.currency_symbol, "€");
    }

    #[test]
    fn test_display_section_is_optional() {
        let config: Config =
            toml::from_str("[backend]\nurl = \"http://localhost:3000\"\n").unwrap();
        assert_eq!(config.display.currency_symbol, "€");
    }
}
