//! Application configuration management.
//!
//! Settings are layered with figment, later layers winning:
//!
//! 1. Built-in defaults
//! 2. TOML config file (`--config <path>`, or `config.toml` in the
//!    platform config directory)
//! 3. Environment variables prefixed `LINKVAULT_` (e.g. `LINKVAULT_LIBRARY`)
//! 4. CLI flags, applied by [`Config::apply_cli`]

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::cli::{Cli, Commands};

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "LINKVAULT_";

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Library root directory.
    #[serde(default)]
    pub library: Option<PathBuf>,

    /// Extension globs; `*.*` accepts every file.
    #[serde(default = "default_patterns")]
    pub patterns: Vec<String>,

    /// Append-only log file.
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Cleanup sends masters to the system trash instead of deleting them.
    #[serde(default)]
    pub use_trash: bool,

    /// Wait for a key press before exiting.
    #[serde(default)]
    pub pause_on_exit: bool,
}

fn default_patterns() -> Vec<String> {
    vec!["*.*".to_string()]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            library: None,
            patterns: default_patterns(),
            log_file: None,
            use_trash: false,
            pause_on_exit: false,
        }
    }
}

impl Config {
    /// Load defaults, the config file and the environment.
    ///
    /// With `explicit` set, that file must exist. Otherwise the default
    /// platform path is used when present.
    ///
    /// # Errors
    ///
    /// Fails if an explicit file is missing or any layer has invalid values.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        match explicit {
            Some(path) => {
                anyhow::ensure!(path.is_file(), "config file not found: {}", path.display());
                figment = figment.merge(Toml::file(path));
            }
            None => {
                if let Some(path) = Self::config_path().filter(|p| p.is_file()) {
                    log::debug!("Using config file {}", path.display());
                    figment = figment.merge(Toml::file(path));
                }
            }
        }

        figment
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()
            .context("invalid configuration")
    }

    /// Overlay CLI flags on top of the loaded layers.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(ref log_file) = cli.log_file {
            self.log_file = Some(log_file.clone());
        }
        if cli.pause {
            self.pause_on_exit = true;
        }

        match &cli.command {
            Commands::Dedupe(args) => {
                if let Some(ref library) = args.library {
                    self.library = Some(library.clone());
                }
                if !args.patterns.is_empty() {
                    self.patterns = args.patterns.clone();
                }
            }
            Commands::Cleanup(args) => {
                if let Some(ref library) = args.library {
                    self.library = Some(library.clone());
                }
                if args.trash {
                    self.use_trash = true;
                }
            }
        }
    }

    /// The library root, required by every command.
    ///
    /// # Errors
    ///
    /// Fails when neither the CLI, the environment nor a config file set it.
    pub fn library_root(&self) -> Result<&Path> {
        self.library.as_deref().context(
            "no library root given; pass --library, set LINKVAULT_LIBRARY, or add `library` to the config file",
        )
    }

    /// Default platform-specific configuration path.
    #[must_use]
    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "linkvault", "linkvault")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}
