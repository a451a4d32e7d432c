//! Project configuration management for `devloop.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # Configuration section definitions
//! │   ├── build      # [build]
//! │   ├── module     # [[module]]
//! │   └── serve      # [serve]
//! ├── types/         # Utility types
//! │   ├── error      # ConfigError, ConfigDiagnostics
//! │   └── handle     # Global config handle
//! └── mod.rs         # DevloopConfig (this file)
//! ```
//!
//! # Sections
//!
//! | Section        | Purpose                                          |
//! |----------------|--------------------------------------------------|
//! | `[build]`      | Build command, goals, failure report, timeout    |
//! | `[serve]`      | Development server (interface, port, watch)      |
//! | `[classifier]` | Exception class names per failure shape          |
//! | `[[module]]`   | Module layout and depends-on edges, build order  |

pub mod section;
pub mod types;
mod util;

use util::find_config_file;

pub use section::{BuildConfig, ModuleConfig, ServeConfig, validate_modules};
pub use types::{ConfigDiagnostics, ConfigError, cfg, init_config};

use crate::build::ExceptionShapes;
use crate::cli::{Cli, Commands};
use crate::log;
use crate::project::ModuleGraph;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing devloop.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DevloopConfig {
    /// Absolute path to the config file (internal use only)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Project root directory - parent of config file (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    #[serde(default)]
    pub build: BuildConfig,

    /// Development server settings
    #[serde(default)]
    pub serve: ServeConfig,

    /// Exception class names recognized by the failure classifier
    #[serde(default)]
    pub classifier: ExceptionShapes,

    /// Modules in build order
    #[serde(rename = "module", default)]
    pub modules: Vec<ModuleConfig>,
}

impl DevloopConfig {
    /// Load configuration from CLI arguments.
    ///
    /// Searches upward from cwd to find the config file.
    /// The project root is the config file's parent directory.
    pub fn load(cli: &Cli) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current working directory")?;
        let Some(config_path) = find_config_file(&cli.config, &cwd) else {
            bail!(ConfigError::Io(
                cli.config.clone(),
                std::io::Error::new(std::io::ErrorKind::NotFound, "config file not found"),
            ));
        };

        let mut config = Self::from_path(&config_path)?;
        config.config_path = crate::utils::path::normalize_path(&config_path);
        config.root = config
            .config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or(cwd);
        config.apply_command_options(cli);
        config.validate()?;

        Ok(config)
    }

    /// Parse configuration from TOML string
    #[cfg(test)]
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Load configuration from file path with unknown field detection.
    fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)?;
        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }

        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>)> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })
        .map_err(ConfigError::Toml)?;
        Ok((config, ignored))
    }

    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "unknown fields in {}, ignoring:", display_path);
        for field in fields {
            eprintln!("- {}", field);
        }
    }

    /// Apply command-specific configuration options.
    fn apply_command_options(&mut self, cli: &Cli) {
        if let Commands::Serve {
            interface,
            port,
            watch,
        } = &cli.command
        {
            Self::update_option(&mut self.serve.interface, interface.as_ref());
            Self::update_option(&mut self.serve.port, port.as_ref());
            Self::update_option(&mut self.serve.watch, watch.as_ref());
        }
    }

    /// Update config option if CLI value is provided.
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    // ========================================================================
    // derived values
    // ========================================================================

    /// Modules with absolute paths, in declaration order.
    pub fn module_graph(&self) -> Result<ModuleGraph, ConfigError> {
        let modules = self
            .modules
            .iter()
            .map(|m| m.to_module(&self.root))
            .collect();
        ModuleGraph::new(modules).map_err(|e| ConfigError::Validation(e.to_string()))
    }

    /// Index of the module dev mode runs from.
    pub fn main_module_index(&self) -> Result<usize, ConfigError> {
        match &self.build.main_module {
            Some(name) => self
                .modules
                .iter()
                .position(|m| &m.name == name)
                .ok_or_else(|| ConfigError::Validation(format!("unknown main module `{name}`"))),
            None => self
                .modules
                .len()
                .checked_sub(1)
                .ok_or_else(|| ConfigError::Validation("no modules declared".into())),
        }
    }

    /// Failure report path, absolute.
    pub fn failure_report(&self) -> PathBuf {
        crate::utils::path::normalize_path(&self.root.join(&self.build.failure_report))
    }

    // ========================================================================
    // validation
    // ========================================================================

    /// Validate the whole configuration.
    ///
    /// Collects all validation errors and returns them at once.
    pub fn validate(&self) -> Result<()> {
        let mut diag = ConfigDiagnostics::new();

        self.build.validate(&mut diag);
        validate_modules(&self.modules, &mut diag);

        if let Some(name) = &self.build.main_module
            && !self.modules.iter().any(|m| &m.name == name)
        {
            diag.error_with_hint(
                "build.main_module",
                format!("unknown main module `{name}`"),
                "leave it unset to use the last declared module",
            );
        }

        diag.into_result()
            .map_err(|e| ConfigError::Diagnostics(e).into())
    }
}

// ============================================================================
// Test Helpers (available to all modules via `use crate::config::test_*`)
// ============================================================================

/// Parse config with a single `core` module declared first.
/// Panics if there are unknown fields (to catch config typos in tests).
#[cfg(test)]
pub fn test_parse_config(extra: &str) -> DevloopConfig {
    // Sections must come before the array table they would otherwise belong to.
    let (sections, modules) = match extra.find("[[module]]") {
        Some(i) => extra.split_at(i),
        None => (extra, ""),
    };
    let config = format!("{sections}\n[[module]]\nname = \"core\"\n{modules}");
    let (parsed, ignored) = DevloopConfig::parse_with_ignored(&config).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}

// ============================================================================
// tests
// ============================================================================
