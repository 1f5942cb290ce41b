//! Configuration for the Gobo Eiffel driver.
//!
//! Settings come from a TOML file. The user file lives at
//! `~/.gobo-eiffel/config.toml`; a `gobo-eiffel.toml` in the current directory
//! overrides it section by section. `GOBO_EIFFEL_CONFIG` names a single file
//! that replaces both.

mod expand;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

pub use expand::{EnvExpander, expand_env_vars};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "GOBO_EIFFEL_CONFIG";

/// Project-local config file name, looked up in the current directory.
pub const LOCAL_CONFIG_FILE: &str = "gobo-eiffel.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config at {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config at {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Read { path, .. } | Self::Parse { path, .. } => path,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
pub struct GoboConfig {
    pub toolchain: Option<ToolchainConfig>,
    pub compile: Option<CompileConfig>,
    pub lint: Option<LintConfig>,
    pub run: Option<RunConfig>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
pub struct ToolchainConfig {
    /// Installation root. Falls back to `$GOBO`, then to `gec` on `PATH`.
    pub gobo: Option<String>,
    /// Publish diagnostics while tools run. The language server is the
    /// primary source of diagnostics, so this is off unless asked for.
    #[serde(default)]
    pub publish_diagnostics: bool,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
pub struct CompileConfig {
    /// Extra `gec` options, placed before the file.
    #[serde(default)]
    pub options: Vec<String>,
    pub ecf_target: Option<String>,
    /// Defaults to the directory of the compiled file.
    pub build_dir: Option<String>,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
pub struct LintConfig {
    /// Extra `gelint` options, placed before `--flat`.
    #[serde(default)]
    pub options: Vec<String>,
    pub ecf_target: Option<String>,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
pub struct RunConfig {
    pub ecf_target: Option<String>,
    pub build_dir: Option<String>,
    /// Defaults to the directory of the compiled file.
    pub working_dir: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
}

impl GoboConfig {
    /// Load the effective configuration. Missing files yield defaults.
    pub fn load() -> Result<Self, ConfigError> {
        if let Some(explicit) = std::env::var_os(CONFIG_ENV).filter(|v| !v.is_empty()) {
            let path = PathBuf::from(explicit);
            return Ok(Self::load_file(&path)?.unwrap_or_default());
        }

        let user = match config_path() {
            Some(path) => Self::load_file(&path)?,
            None => None,
        };
        let local = Self::load_file(Path::new(LOCAL_CONFIG_FILE))?;
        Ok(match (user, local) {
            (Some(user), Some(local)) => user.overridden_by(local),
            (user, local) => local.or(user).unwrap_or_default(),
        })
    }

    /// Parse `path`; `Ok(None)` if it does not exist.
    pub fn load_file(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path).map_err(|source| {
            tracing::warn!("Failed to read config at {path:?}: {source}");
            ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }
        })?;
        let config = Self::parse(&content).map_err(|source| {
            tracing::warn!("Failed to parse config at {path:?}: {source}");
            ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(Some(config))
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Sections present in `other` replace those of `self`.
    #[must_use]
    pub fn overridden_by(self, other: Self) -> Self {
        Self {
            toolchain: other.toolchain.or(self.toolchain),
            compile: other.compile.or(self.compile),
            lint: other.lint.or(self.lint),
            run: other.run.or(self.run),
        }
    }

    /// Expand `$VAR`/`${VAR}` in every path, option, argument and
    /// environment value.
    #[must_use]
    pub fn expanded(self, expander: &EnvExpander) -> Self {
        let expand_opt = |v: Option<String>| v.map(|s| expander.expand(&s));
        let expand_vec = |v: Vec<String>| -> Vec<String> {
            v.iter().map(|s| expander.expand(s)).collect()
        };
        let expand_env = |env: BTreeMap<String, String>| -> BTreeMap<String, String> {
            env.into_iter()
                .map(|(k, v)| {
                    let v = expander.expand(&v);
                    (k, v)
                })
                .collect()
        };
        Self {
            toolchain: self.toolchain.map(|t| ToolchainConfig {
                gobo: expand_opt(t.gobo),
                publish_diagnostics: t.publish_diagnostics,
            }),
            compile: self.compile.map(|c| CompileConfig {
                options: expand_vec(c.options),
                ecf_target: c.ecf_target,
                build_dir: expand_opt(c.build_dir),
                environment: expand_env(c.environment),
            }),
            lint: self.lint.map(|l| LintConfig {
                options: expand_vec(l.options),
                ecf_target: l.ecf_target,
                environment: expand_env(l.environment),
            }),
            run: self.run.map(|r| RunConfig {
                ecf_target: r.ecf_target,
                build_dir: expand_opt(r.build_dir),
                working_dir: expand_opt(r.working_dir),
                args: expand_vec(r.args),
                environment: expand_env(r.environment),
            }),
        }
    }

    #[must_use]
    pub fn gobo_root(&self) -> Option<PathBuf> {
        self.toolchain
            .as_ref()
            .and_then(|t| t.gobo.as_deref())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
    }

    #[must_use]
    pub fn publish_diagnostics(&self) -> bool {
        self.toolchain
            .as_ref()
            .is_some_and(|t| t.publish_diagnostics)
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }
}

fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".gobo-eiffel").join("config.toml"))
}
