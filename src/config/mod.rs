pub mod schema;

pub use schema::AgentConfig;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Fatal configuration problems.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("WALLET_MNEMONIC is not set; configure a wallet mnemonic or enable mock mode")]
    MissingMnemonic,

    #[error("OPENAI_API_KEY is not set; configure an inference API key")]
    MissingInferenceKey,

    #[error("Invalid configuration value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Default agent home directory (~/.stacks-agent).
pub fn default_home_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().join(".stacks-agent"))
        .unwrap_or_else(|| PathBuf::from(".stacks-agent"))
}

/// Default config file path (~/.stacks-agent/agent.toml).
pub fn default_config_path() -> PathBuf {
    default_home_dir().join("agent.toml")
}

/// Load config from the given path, or return defaults.
pub fn load_config(path: &Path) -> Result<AgentConfig> {
    if path.exists() {
        let contents = std::fs::read_to_string(path).context("Failed to read agent config file")?;
        let config: AgentConfig =
            toml::from_str(&contents).context("Failed to parse agent config (TOML)")?;
        Ok(config)
    } else {
        debug!("No config at {}, using defaults", path.display());
        Ok(AgentConfig::default())
    }
}

/// Load config from a file, then apply `.env` and environment overrides.
pub fn load_with_env(path: &Path) -> Result<AgentConfig> {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();
    let mut config = load_config(path)?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    Ok(config)
}

/// Overlay environment values onto a config. `lookup` abstracts the
/// environment so the mapping can be exercised without mutating process state.
pub fn apply_env_overrides<F>(config: &mut AgentConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("WALLET_MNEMONIC") {
        config.wallet_mnemonic = v;
    }
    if let Some(v) = get("HIRO_API_KEY") {
        config.hiro_api_key = v;
    }
    if let Some(v) = get("OPENAI_API_KEY") {
        config.inference_api_key = v;
    }
    if let Some(v) = get("OPENAI_MODEL") {
        config.inference_model = v;
    }
    if let Some(v) = get("INFERENCE_API_URL") {
        config.inference_api_url = v;
    }
    if let Some(v) = get("BIND_ADDRESS") {
        config.bind_address = v;
    }
    if let Some(v) = get("MOCK_MODE") {
        config.mock_mode = parse_flag(&v).ok_or_else(|| ConfigError::Invalid {
            field: "MOCK_MODE",
            reason: format!("expected true/false, got '{}'", v),
        })?;
    }
    Ok(())
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Save config to the given path (TOML format).
pub fn save_config(config: &AgentConfig, path: &Path) -> Result<()> {
    let contents = toml::to_string_pretty(config).context("Failed to serialize config")?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents).context("Failed to write config file")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stacks::StacksNetwork;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_sensible() {
        let config = AgentConfig::default();
        assert_eq!(config.max_steps, 5);
        assert_eq!(config.network, StacksNetwork::Mainnet);
        assert!(!config.mock_mode);
        assert_eq!(config.effective_model(None), "gpt-4o");
        assert_eq!(config.effective_model(Some("gpt-4o-mini")), "gpt-4o-mini");
        assert_eq!(config.effective_model(Some("  ")), "gpt-4o");
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: AgentConfig = toml::from_str(
            r#"
            network = "testnet"
            mock_mode = true
            max_steps = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.network, StacksNetwork::Testnet);
        assert!(config.mock_mode);
        assert_eq!(config.max_steps, 3);
        assert_eq!(config.hiro_api_url, "https://api.hiro.so");
    }

    #[test]
    fn env_overrides_secrets_and_flags() {
        let mut config = AgentConfig::default();
        apply_env_overrides(
            &mut config,
            env(&[
                ("WALLET_MNEMONIC", "abandon about"),
                ("HIRO_API_KEY", "hiro-key"),
                ("OPENAI_API_KEY", "sk-test"),
                ("MOCK_MODE", "true"),
                ("OPENAI_MODEL", ""),
            ]),
        )
        .unwrap();
        assert_eq!(config.wallet_mnemonic, "abandon about");
        assert_eq!(config.hiro_api_key, "hiro-key");
        assert_eq!(config.inference_api_key, "sk-test");
        assert!(config.mock_mode);
        assert_eq!(config.inference_model, "gpt-4o");
    }

    #[test]
    fn bad_mock_flag_is_rejected() {
        let mut config = AgentConfig::default();
        let err = apply_env_overrides(&mut config, env(&[("MOCK_MODE", "maybe")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "MOCK_MODE", .. }));
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = std::env::temp_dir().join(format!("stacks-agent-test-{}", ulid::Ulid::new()));
        let path = dir.join("agent.toml");
        let mut config = AgentConfig::default();
        config.name = "saved".into();
        save_config(&config, &path).unwrap();
        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.name, "saved");
        let _ = std::fs::remove_dir_all(dir);
    }
}
