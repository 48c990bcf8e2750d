//! Site configuration management for `collie.toml`.
//!
//! The config file is optional: a missing file means every section takes its
//! defaults. Paths are resolved against the project root (`--root`, default
//! the current directory) and normalized to absolute paths after loading.
//!
//! # Sections
//!
//! | Section     | Purpose                                          |
//! |-------------|--------------------------------------------------|
//! | `[build]`   | Template discovery, output dir, compiler command |
//! | `[serve]`   | Served directory, fallback, port, watch          |
//! | `[loader]`  | Generated loader script, placeholder naming      |
//!
//! # Example
//!
//! ```toml
//! [build]
//! source = "."
//! output = "public/collie/dist"
//!
//! [serve]
//! root = "public"
//! port = 5173
//!
//! [loader]
//! placeholder_suffix = "collie"
//! ```

mod build;
pub mod defaults;
mod error;
mod loader;
mod serve;

pub use build::{BuildConfig, CompilerConfig, CompilerFormat};
pub use error::ConfigError;
pub use loader::{LoaderConfig, ToggleConfig};
pub use serve::ServeConfig;

use crate::cli::{Cli, Commands};
use anyhow::{Context, Result, bail};
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure representing collie.toml
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    /// Absolute project root (set after loading)
    #[serde(skip)]
    #[educe(Default = PathBuf::from("./"))]
    pub root: PathBuf,

    /// Absolute path to the config file (set after loading, may not exist)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Build settings
    #[serde(default)]
    pub build: BuildConfig,

    /// Static server settings
    #[serde(default)]
    pub serve: ServeConfig,

    /// Client loader settings
    #[serde(default)]
    pub loader: LoaderConfig,
}

impl SiteConfig {
    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: SiteConfig = toml::from_str(content).map_err(ConfigError::from)?;
        Ok(config)
    }

    /// Load configuration from file path
    pub fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        Self::from_str(&content).with_context(|| format!("in {}", path.display()))
    }

    /// Load the config for a CLI invocation, falling back to defaults when
    /// the config file does not exist, then apply CLI and environment overrides.
    pub fn load(cli: &Cli) -> Result<Self> {
        let root = cli.root.as_deref().unwrap_or(Path::new("./"));
        let config_path = root.join(&cli.config);

        let mut config = if config_path.is_file() {
            Self::from_path(&config_path)?
        } else {
            Self::default()
        };

        config.update_with_cli(cli);
        config.apply_port_env(|name| std::env::var(name).ok())?;
        if let Commands::Serve { port: Some(port), .. } = &cli.command {
            config.serve.port = *port;
        }
        config.validate(cli)?;

        Ok(config)
    }

    /// Get the root directory path
    pub fn get_root(&self) -> &Path {
        &self.root
    }

    /// Update configuration with CLI arguments and normalize paths.
    ///
    /// The `--port` flag is applied by [`SiteConfig::load`] after the port
    /// variable so that the flag wins.
    pub fn update_with_cli(&mut self, cli: &Cli) {
        let root = cli.root.as_deref().unwrap_or(Path::new("./"));
        self.config_path = Self::normalize_path(&root.join(&cli.config));
        self.update_path_with_root(root);

        if let Commands::Serve {
            interface, watch, ..
        } = &cli.command
        {
            Self::update_option(&mut self.serve.interface, interface.as_ref());
            Self::update_option(&mut self.serve.watch, watch.as_ref());
        }
    }

    /// Override `serve.port` from the configured environment variable.
    pub fn apply_port_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let Some(value) = lookup(&self.serve.port_env) else {
            return Ok(());
        };
        let value = value.trim();
        if value.is_empty() {
            return Ok(());
        }
        self.serve.port = value.parse().map_err(|_| {
            ConfigError::Validation(format!(
                "${} must be a port number, got `{value}`",
                self.serve.port_env
            ))
        })?;
        Ok(())
    }

    /// Update config option if CLI value is provided
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    /// Resolve all paths against the root and normalize to absolute paths
    pub fn update_path_with_root(&mut self, root: &Path) {
        let root = Self::normalize_path(root);

        self.build.source = Self::normalize_path(&root.join(&self.build.source));
        self.build.output = Self::normalize_path(&root.join(&self.build.output));
        self.serve.root = Self::normalize_path(&root.join(&self.serve.root));
        self.root = root;
    }

    /// Normalize a path to absolute, using canonicalize if the path exists
    fn normalize_path(path: &Path) -> PathBuf {
        path.canonicalize().unwrap_or_else(|_| {
            // For non-existent paths, manually make them absolute
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                std::env::current_dir()
                    .map(|cwd| cwd.join(path))
                    .unwrap_or_else(|_| path.to_path_buf())
            }
        })
    }

    /// Validate configuration for the current command
    pub fn validate(&self, cli: &Cli) -> Result<()> {
        if self.build.extension.trim_start_matches('.').is_empty() {
            bail!(ConfigError::Validation(
                "[build.extension] must not be empty".into()
            ));
        }

        if self.loader.placeholder_suffix.is_empty() {
            bail!(ConfigError::Validation(
                "[loader.placeholder_suffix] must not be empty".into()
            ));
        }

        if self.serve.fallback.is_absolute() {
            bail!(ConfigError::Validation(
                "[serve.fallback] must be relative to [serve.root]".into()
            ));
        }

        if self.loader.script.is_absolute() {
            bail!(ConfigError::Validation(
                "[loader.script] must be relative to [serve.root]".into()
            ));
        }

        match &cli.command {
            Commands::Build | Commands::Serve { .. } => {
                Self::check_command_installed(
                    "[build.compiler.command]",
                    &self.build.compiler.command,
                )?;
            }
            Commands::Check => {}
        }

        Ok(())
    }

    /// Check if a command is installed and available
    fn check_command_installed(field: &str, command: &[String]) -> Result<()> {
        if command.is_empty() {
            bail!(ConfigError::Validation(format!(
                "{field} must have at least one element"
            )));
        }

        let cmd = &command[0];
        which::which(cmd)
            .with_context(|| format!("`{cmd}` not found. Please install it first."))?;

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("collie-site").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_from_str_empty_uses_defaults() {
        let config = SiteConfig::from_str("").unwrap();
        assert_eq!(config.build.extension, "collie");
        assert_eq!(config.serve.port, 5173);
    }

    #[test]
    fn test_from_str_rejects_unknown_section() {
        let result = SiteConfig::from_str("[deploy]\nforce = true\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_from_path_missing_file() {
        let err = SiteConfig::from_path(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(err.downcast_ref::<ConfigError>().is_some());
    }

    #[test]
    fn test_paths_resolved_against_root() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let root_str = root.to_str().unwrap();

        let mut config = SiteConfig::default();
        config.update_with_cli(&cli(&["--root", root_str, "build"]));

        assert_eq!(config.root, root);
        assert_eq!(config.build.source, root);
        assert_eq!(config.build.output, root.join("public/collie/dist"));
        assert_eq!(config.serve.root, root.join("public"));
        assert_eq!(config.config_path, root.join("collie.toml"));
    }

    #[test]
    fn test_serve_cli_overrides() {
        let dir = TempDir::new().unwrap();
        let root_str = dir.path().to_str().unwrap();

        let mut config = SiteConfig::default();
        config.update_with_cli(&cli(&["--root", root_str, "serve", "-i", "0.0.0.0", "--watch"]));

        assert_eq!(config.serve.interface, "0.0.0.0");
        assert!(config.serve.watch);
    }

    #[test]
    fn test_port_env_overrides_config() {
        let mut config = SiteConfig::from_str("[serve]\nport = 3000\n").unwrap();
        config
            .apply_port_env(|name| (name == "PORT").then(|| "8081".to_string()))
            .unwrap();
        assert_eq!(config.serve.port, 8081);
    }

    #[test]
    fn test_port_env_unset_keeps_default() {
        let mut config = SiteConfig::default();
        config.apply_port_env(|_| None).unwrap();
        assert_eq!(config.serve.port, 5173);

        config.apply_port_env(|_| Some("  ".into())).unwrap();
        assert_eq!(config.serve.port, 5173);
    }

    #[test]
    fn test_port_env_custom_name_and_invalid_value() {
        let mut config = SiteConfig::from_str("[serve]\nport_env = \"APP_PORT\"\n").unwrap();
        config
            .apply_port_env(|name| (name == "APP_PORT").then(|| "9000".to_string()))
            .unwrap();
        assert_eq!(config.serve.port, 9000);

        let result = config.apply_port_env(|_| Some("not-a-port".into()));
        assert!(result.is_err());
        assert_eq!(config.serve.port, 9000);
    }

    #[test]
    fn test_validate_rejects_empty_extension() {
        let mut config = SiteConfig::default();
        config.build.extension = ".".into();
        assert!(config.validate(&cli(&["check"])).is_err());
    }

    #[test]
    fn test_validate_rejects_empty_compiler_command() {
        let mut config = SiteConfig::default();
        config.build.compiler.command.clear();
        let err = config.validate(&cli(&["build"])).unwrap_err();
        assert!(err.to_string().contains("[build.compiler.command]"));
    }

    #[test]
    fn test_validate_check_skips_compiler_lookup() {
        let mut config = SiteConfig::default();
        config.build.compiler.command = vec!["surely-not-an-installed-compiler".into()];
        assert!(config.validate(&cli(&["check"])).is_ok());
        assert!(config.validate(&cli(&["build"])).is_err());
    }
}
