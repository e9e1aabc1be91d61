use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};

/// File looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "clubhub.toml";

/// Placeholder secret; the server warns at startup while it is in use
pub const DEFAULT_JWT_SECRET: &str = "change-me";

/// Centralized configuration for the clubhub server
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClubhubConfig {
    pub server: ServerSection,
    pub database: DatabaseSection,
    pub auth: AuthSection,
    pub seed: SeedSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub bind_addr: String,
    /// Allow any origin. When false only localhost origins are accepted.
    pub cors_permissive: bool,
    /// Directory served under `/static`
    pub public_dir: PathBuf,
    /// Sub-directory of `public_dir` receiving uploads
    pub upload_dir: String,
    pub max_upload_bytes: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:9000".to_string(),
            cors_permissive: true,
            public_dir: PathBuf::from("public"),
            upload_dir: "uploads".to_string(),
            max_upload_bytes: 5 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            url: "sqlite://clubhub.db".to_string(),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSection {
    pub jwt_secret: String,
    pub token_ttl_secs: u64,
    pub bcrypt_cost: u32,
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            token_ttl_secs: 24 * 60 * 60,
            bcrypt_cost: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedSection {
    pub admin_account: String,
    pub admin_password: String,
    /// Insert demo categories, leaders, clubs and activities
    pub demo_data: bool,
}

impl Default for SeedSection {
    fn default() -> Self {
        Self {
            admin_account: "admin".to_string(),
            admin_password: "123456".to_string(),
            demo_data: true,
        }
    }
}

impl ClubhubConfig {
    /// Load config and apply environment overrides.
    ///
    /// An explicit `path` must exist. Without one, `./clubhub.toml` is used
    /// when present and defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(CoreError::ConfigMissing {
                        path: path.to_path_buf(),
                    });
                }
                Self::from_file(path)?
            }
            None => {
                let local = Path::new(DEFAULT_CONFIG_FILE);
                if local.exists() {
                    Self::from_file(local)?
                } else {
                    tracing::debug!("no {} found, using defaults", DEFAULT_CONFIG_FILE);
                    Self::default()
                }
            }
        };

        config.apply_env_with(|key| env::var(key).ok())?;
        Ok(config)
    }

    /// Parse a TOML file without applying overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|source| CoreError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// production, a map in tests).
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("CLUBHUB_BIND_ADDR") {
            self.server.bind_addr = addr;
        }
        if let Some(url) = lookup("DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(secret) = lookup("CLUBHUB_JWT_SECRET") {
            if secret.is_empty() {
                return Err(CoreError::invalid_env("CLUBHUB_JWT_SECRET", "must not be empty"));
            }
            self.auth.jwt_secret = secret;
        }
        if let Some(ttl) = lookup("CLUBHUB_TOKEN_TTL_SECS") {
            self.auth.token_ttl_secs = ttl
                .trim()
                .parse()
                .map_err(|e| CoreError::invalid_env("CLUBHUB_TOKEN_TTL_SECS", format!("{e}")))?;
        }
        if let Some(dir) = lookup("CLUBHUB_PUBLIC_DIR") {
            self.server.public_dir = PathBuf::from(dir);
        }
        Ok(())
    }

    pub fn uses_default_secret(&self) -> bool {
        self.auth.jwt_secret == DEFAULT_JWT_SECRET
    }

    /// Directory uploads are written to
    pub fn upload_path(&self) -> PathBuf {
        self.server.public_dir.join(self.server.upload_dir.trim_matches('/'))
    }

    /// Copy with secrets masked, for display
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.auth.jwt_secret = "********".to_string();
        copy.seed.admin_password = "********".to_string();
        copy
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Default config rendered as a commented TOML document
    pub fn default_toml() -> Result<String> {
        let body = Self::default().to_toml()?;
        Ok(format!(
            "# clubhub configuration\n\
             # Environment overrides: CLUBHUB_BIND_ADDR, DATABASE_URL, CLUBHUB_JWT_SECRET,\n\
             # CLUBHUB_TOKEN_TTL_SECS, CLUBHUB_PUBLIC_DIR\n\
             # Set [auth].jwt_secret before exposing the server.\n\n{body}"
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn defaults() {
        let config = ClubhubConfig::default();
        assert_eq!(config.server.bind_addr, "0.0.0.0:9000");
        assert_eq!(config.auth.token_ttl_secs, 86_400);
        assert!(config.uses_default_secret());
        assert_eq!(config.upload_path(), PathBuf::from("public/uploads"));
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clubhub.toml");
        fs::write(&path, "[auth]\njwt_secret = \"s3cret\"\n").unwrap();

        let config = ClubhubConfig::from_file(&path).unwrap();
        assert_eq!(config.auth.jwt_secret, "s3cret");
        assert_eq!(config.auth.bcrypt_cost, 10);
        assert_eq!(config.database.max_connections, 5);
    }

    #[test]
    fn explicit_missing_path_fails() {
        let dir = tempdir().unwrap();
        let err = ClubhubConfig::load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(err, CoreError::ConfigMissing { .. }));
    }

    #[test]
    fn invalid_toml_reports_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[server\nbind_addr = 1").unwrap();

        let err = ClubhubConfig::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("CLUBHUB_BIND_ADDR", "127.0.0.1:8080"),
            ("DATABASE_URL", "sqlite::memory:"),
            ("CLUBHUB_TOKEN_TTL_SECS", "60"),
        ]
        .into_iter()
        .collect();

        let mut config = ClubhubConfig::default();
        config
            .apply_env_with(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.server.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.auth.token_ttl_secs, 60);
    }

    #[test]
    fn bad_ttl_override_is_an_error() {
        let mut config = ClubhubConfig::default();
        let err = config
            .apply_env_with(|k| (k == "CLUBHUB_TOKEN_TTL_SECS").then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidEnv {
                var: "CLUBHUB_TOKEN_TTL_SECS",
                ..
            }
        ));
    }

    #[test]
    fn default_toml_parses_back() {
        let rendered = ClubhubConfig::default_toml().unwrap();
        assert!(rendered.starts_with("# clubhub configuration"));
        let parsed: ClubhubConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, ClubhubConfig::default());
    }

    #[test]
    fn redaction_masks_secrets() {
        let shown = ClubhubConfig::default().redacted();
        assert_eq!(shown.auth.jwt_secret, "********");
        assert_eq!(shown.seed.admin_password, "********");
    }
}
