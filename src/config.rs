use crate::cli::ConnectionArgs;
use crate::error::AplcheckError;
use crate::time_filter::DEFAULT_TIME_RANGE;
use directories::ProjectDirs;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

pub const URL_ENV: &str = "AXIOM_PLAY_URL";
pub const TOKEN_ENV: &str = "AXIOM_PLAY_TOKEN";
pub const ORG_ID_ENV: &str = "AXIOM_PLAY_ORG_ID";

const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Connection settings for the Axiom query endpoint.
#[derive(Debug)]
pub struct AxiomConfig {
    pub url: String,
    pub token: SecretString,
    pub org_id: Option<String>,
}

impl Clone for AxiomConfig {
    fn clone(&self) -> Self {
        Self {
            url: self.url.clone(),
            token: clone_secret(&self.token),
            org_id: self.org_id.clone(),
        }
    }
}

impl AxiomConfig {
    pub fn new(url: impl Into<String>, token: impl Into<String>, org_id: Option<String>) -> Self {
        Self {
            url: url.into(),
            token: SecretString::from(token.into()),
            org_id,
        }
    }

    /// Read `AXIOM_PLAY_URL`, `AXIOM_PLAY_TOKEN` and `AXIOM_PLAY_ORG_ID`.
    /// `None` when the URL or token is missing or empty.
    pub fn from_env() -> Option<Self> {
        let url = env_non_empty(URL_ENV)?;
        let token = env_non_empty(TOKEN_ENV)?;
        Some(Self::new(url, token, env_non_empty(ORG_ID_ENV)))
    }
}

/// Top-level application configuration.
#[derive(Debug)]
pub struct AppConfig {
    /// `None` when no URL/token pair could be resolved; executions then fail
    /// locally with a config-missing result.
    pub axiom: Option<AxiomConfig>,
    pub timeout_secs: u64,
    pub time_range: String,
    pub verbose: bool,
    pub show_secrets: bool,
}

// --- TOML config file structs ---

#[derive(Debug, Deserialize, Default)]
struct TomlConfig {
    #[serde(default)]
    defaults: TomlDefaults,
    #[serde(default)]
    profiles: HashMap<String, TomlProfile>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlDefaults {
    timeout: Option<u64>,
    verbose: Option<bool>,
    time_range: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
struct TomlProfile {
    url: Option<String>,
    token: Option<String>,
    token_env: Option<String>,
    org_id: Option<String>,
}

/// Config path plus whether it was requested explicitly.
struct ResolvedConfigPath {
    path: PathBuf,
    /// true if given via --config or APLCHECK_CONFIG
    explicit: bool,
}

/// Resolve the config file path: --config flag > env var > platform default.
fn resolve_config_path(cli_config: Option<&PathBuf>) -> Option<ResolvedConfigPath> {
    if let Some(path) = cli_config {
        return Some(ResolvedConfigPath { path: path.clone(), explicit: true });
    }
    if let Some(path) = env_non_empty("APLCHECK_CONFIG") {
        return Some(ResolvedConfigPath { path: PathBuf::from(path), explicit: true });
    }
    ProjectDirs::from("", "", "aplcheck").map(|dirs| ResolvedConfigPath {
        path: dirs.config_dir().join("config.toml"),
        explicit: false,
    })
}

/// Load and parse the TOML config file (if it exists).
fn load_toml_config(resolved: Option<&ResolvedConfigPath>) -> Result<TomlConfig, AplcheckError> {
    let Some(resolved) = resolved else {
        return Ok(TomlConfig::default());
    };

    if !resolved.path.exists() {
        if resolved.explicit {
            return Err(AplcheckError::Config {
                message: format!("config file not found: {}", resolved.path.display()),
            });
        }
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(&resolved.path).map_err(|e| AplcheckError::Config {
        message: format!("cannot read config file {}: {}", resolved.path.display(), e),
    })?;

    toml::from_str(&content).map_err(|e| AplcheckError::Config {
        message: format!("invalid config file {}: {}", resolved.path.display(), e),
    })
}

/// `Some(value)` unless the value is missing or empty.
pub fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

/// Read an env var, treating empty as unset.
pub fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Resolve a token from a direct value, then env indirection, then the
/// profile's literal value.
fn resolve_secret(
    direct: Option<&str>,
    env_key: Option<&str>,
    literal: Option<&str>,
) -> Option<SecretString> {
    non_empty(direct)
        .or_else(|| env_key.and_then(env_non_empty))
        .or_else(|| non_empty(literal))
        .map(SecretString::from)
}

pub fn clone_secret(secret: &SecretString) -> SecretString {
    SecretString::from(secret.expose_secret().to_string())
}

/// Build the application config. Connection values come from CLI flags or
/// their env vars first, then the selected profile.
pub fn load(
    args: &ConnectionArgs,
    verbose: bool,
    show_secrets: bool,
    config_path: Option<&PathBuf>,
) -> Result<AppConfig, AplcheckError> {
    let resolved_path = resolve_config_path(config_path);
    let toml_config = load_toml_config(resolved_path.as_ref())?;

    let profile = args
        .profile
        .as_ref()
        .map(|name| {
            toml_config.profiles.get(name).cloned().ok_or_else(|| AplcheckError::Config {
                message: format!("profile '{}' not found in config file", name),
            })
        })
        .transpose()?
        .unwrap_or_default();

    let url = non_empty(args.url.as_deref()).or_else(|| non_empty(profile.url.as_deref()));
    let token = resolve_secret(
        args.token.as_deref(),
        profile.token_env.as_deref(),
        profile.token.as_deref(),
    );
    let org_id = non_empty(args.org_id.as_deref()).or_else(|| non_empty(profile.org_id.as_deref()));

    let axiom = match (url, token) {
        (Some(url), Some(token)) => Some(AxiomConfig { url, token, org_id }),
        _ => None,
    };

    // timeout: CLI/ENV > TOML > 60
    let timeout_secs = args
        .timeout
        .unwrap_or_else(|| toml_config.defaults.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS));

    let time_range = toml_config
        .defaults
        .time_range
        .unwrap_or_else(|| DEFAULT_TIME_RANGE.to_string());

    // verbose: CLI/ENV OR TOML default
    let verbose = verbose || toml_config.defaults.verbose.unwrap_or(false);

    Ok(AppConfig {
        axiom,
        timeout_secs,
        time_range,
        verbose,
        show_secrets,
    })
}
