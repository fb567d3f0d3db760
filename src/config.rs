use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

// ── Profile ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    /// Base URL of the chat backend (e.g. "http://localhost:8080")
    pub server: String,
    /// Seconds with no stream data before a turn is abandoned.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

fn default_idle_timeout_secs() -> u64 {
    90
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            server: "http://localhost:8080".to_string(),
            idle_timeout_secs: default_idle_timeout_secs(),
        }
    }
}

// ── Config file ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigFile {
    /// Which profile to use when none is specified
    #[serde(default = "default_profile_name")]
    pub default_profile: String,

    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

fn default_profile_name() -> String {
    "default".to_string()
}

impl ConfigFile {
    /// Load from disk, or return a default config if the file doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file at {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file at {}", path.display()))
    }

    /// Write a starter config file to disk (only if it doesn't exist).
    pub fn write_default_if_missing() -> Result<PathBuf> {
        let path = config_path();
        if path.exists() {
            return Ok(path);
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, DEFAULT_CONFIG_TOML)?;
        Ok(path)
    }

    /// Resolve the active profile given an optional override name.
    pub fn resolve_profile(&self, name: Option<&str>) -> Option<&Profile> {
        let key = name.unwrap_or(&self.default_profile);
        self.profiles.get(key)
    }
}

// ── Resolved runtime config (after merging file + CLI overrides) ──────────────

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub server: String,
    pub idle_timeout_secs: u64,
    /// Profile name that was resolved (for display)
    pub profile_name: String,
}

impl ResolvedConfig {
    /// Merge config file profile with CLI overrides.
    /// Priority: CLI args > env vars (handled by clap) > config file profile > built-in defaults
    pub fn resolve(
        file: &ConfigFile,
        profile_override: Option<&str>,
        server_override: Option<&str>,
        idle_timeout_override: Option<u64>,
    ) -> Self {
        let profile_name = profile_override
            .unwrap_or(&file.default_profile)
            .to_string();

        let base = file
            .resolve_profile(profile_override)
            .cloned()
            .unwrap_or_default();

        Self {
            server: server_override
                .map(str::to_string)
                .unwrap_or(base.server),
            idle_timeout_secs: idle_timeout_override.unwrap_or(base.idle_timeout_secs),
            profile_name,
        }
    }
}

// ── Paths ─────────────────────────────────────────────────────────────────────

pub fn config_path() -> PathBuf {
    dirs_config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("banter")
        .join("config.toml")
}

fn dirs_config_dir() -> Option<PathBuf> {
    // XDG_CONFIG_HOME or ~/.config on Linux/macOS
    std::env::var("XDG_CONFIG_HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join(".config"))
        })
}

// ── Default config template written on first run ──────────────────────────────

const DEFAULT_CONFIG_TOML: &str = r#"# banter configuration
# Run `banter --init` to regenerate this file.

default_profile = "local"

# ── Local backend (default) ───────────────────────────────────────────────────
[profiles.local]
server            = "http://localhost:8080"
idle_timeout_secs = 90

# ── A remote deployment example ───────────────────────────────────────────────
# [profiles.prod]
# server            = "https://chat.example.com"
# idle_timeout_secs = 120
"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn file_with(name: &str, profile: Profile) -> ConfigFile {
        let mut profiles = HashMap::new();
        profiles.insert(name.to_string(), profile);
        ConfigFile { default_profile: name.to_string(), profiles }
    }

    #[test]
    fn test_default_template_parses() {
        let file: ConfigFile = toml::from_str(DEFAULT_CONFIG_TOML).unwrap();
        assert_eq!(file.default_profile, "local");
        let profile = file.resolve_profile(None).unwrap();
        assert_eq!(profile.server, "http://localhost:8080");
        assert_eq!(profile.idle_timeout_secs, 90);
    }

    #[test]
    fn test_cli_override_beats_profile() {
        let file = file_with(
            "local",
            Profile { server: "http://profile:1".to_string(), idle_timeout_secs: 30 },
        );
        let resolved = ResolvedConfig::resolve(&file, None, Some("http://cli:2"), Some(45));
        assert_eq!(resolved.server, "http://cli:2");
        assert_eq!(resolved.idle_timeout_secs, 45);
        assert_eq!(resolved.profile_name, "local");
    }

    #[test]
    fn test_unknown_profile_falls_back_to_builtin_defaults() {
        let file = ConfigFile::default();
        let resolved = ResolvedConfig::resolve(&file, Some("missing"), None, None);
        assert_eq!(resolved.server, "http://localhost:8080");
        assert_eq!(resolved.idle_timeout_secs, 90);
        assert_eq!(resolved.profile_name, "missing");
    }

    #[test]
    fn test_idle_timeout_defaults_when_absent_from_toml() {
        let file: ConfigFile = toml::from_str(
            "default_profile = \"p\"\n[profiles.p]\nserver = \"http://x\"\n",
        )
        .unwrap();
        assert_eq!(file.resolve_profile(None).unwrap().idle_timeout_secs, 90);
    }
}
