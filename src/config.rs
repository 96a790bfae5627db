//! Configuration and color scheme management for console.
//!
//! This module provides:
//! - TOML configuration file loading from `~/.console/config.toml`
//! - Built-in color schemes for the status bar and selections
//!
//! # Configuration File
//!
//! ```toml
//! # Child shell (argv)
//! shell = ["bash", "--noediting", "--noprofile", "--norc"]
//!
//! # Fed the pending multi-line command on stdin; non-zero exit or any
//! # diagnostics mean the command is not complete yet
//! syntax_check = ["sh", "-n"]
//!
//! # Mirror copies into the desktop clipboard
//! system_clipboard = true
//!
//! # Color scheme: default, solarized-dark, monokai, nord
//! color_scheme = "nord"
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::protocol::DEFAULT_SHELL;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid configuration in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Main configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Child shell command line
    pub shell: Vec<String>,
    /// Syntax checker for multi-line commands
    pub syntax_check: Vec<String>,
    /// Copy selections to the desktop clipboard as well
    pub system_clipboard: bool,
    /// Color scheme name
    pub color_scheme: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shell: DEFAULT_SHELL.iter().map(|s| s.to_string()).collect(),
            syntax_check: vec!["sh".to_string(), "-n".to_string()],
            system_clipboard: true,
            color_scheme: "default".to_string(),
        }
    }
}

impl Config {
    /// Load `~/.console/config.toml`, falling back to defaults
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        if !path.exists() {
            debug!("No configuration at {}", path.display());
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!("{}; using defaults", e);
                Self::default()
            }
        }
    }

    /// Parse a configuration file
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// `~/.console`, created on first use
    pub fn dir() -> Option<PathBuf> {
        let dir = home_dir()?.join(".console");
        if !dir.exists() {
            let _ = fs::create_dir_all(&dir);
        }
        Some(dir)
    }

    fn config_path() -> Option<PathBuf> {
        Some(Self::dir()?.join("config.toml"))
    }

    /// Log file used when not in debug mode
    pub fn log_path() -> Option<PathBuf> {
        Some(Self::dir()?.join("console.log"))
    }

    /// Get the color scheme
    pub fn color_scheme(&self) -> ColorScheme {
        ColorScheme::by_name(&self.color_scheme)
    }
}

/// Color definition (RGB)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Convert to crossterm Color
    pub fn to_crossterm(&self) -> crossterm::style::Color {
        crossterm::style::Color::Rgb {
            r: self.r,
            g: self.g,
            b: self.b,
        }
    }
}

/// Colors of the overlay; panel text uses the terminal's own colors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorScheme {
    pub name: &'static str,

    pub status_bar_bg: Color,
    pub status_bar_fg: Color,
    /// Status bar while a prompt is open
    pub status_prompt_bg: Color,
    pub status_prompt_fg: Color,

    pub selection_bg: Color,
    pub selection_fg: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self::default_scheme()
    }
}

impl ColorScheme {
    pub fn default_scheme() -> Self {
        Self {
            name: "default",
            status_bar_bg: Color::new(0, 100, 0),
            status_bar_fg: Color::new(255, 255, 255),
            status_prompt_bg: Color::new(200, 200, 0),
            status_prompt_fg: Color::new(0, 0, 0),
            selection_bg: Color::new(255, 255, 255),
            selection_fg: Color::new(0, 0, 0),
        }
    }

    pub fn solarized_dark() -> Self {
        Self {
            name: "solarized-dark",
            status_bar_bg: Color::new(7, 54, 66),
            status_bar_fg: Color::new(147, 161, 161),
            status_prompt_bg: Color::new(181, 137, 0),
            status_prompt_fg: Color::new(0, 43, 54),
            selection_bg: Color::new(38, 139, 210),
            selection_fg: Color::new(253, 246, 227),
        }
    }

    pub fn monokai() -> Self {
        Self {
            name: "monokai",
            status_bar_bg: Color::new(60, 60, 54),
            status_bar_fg: Color::new(248, 248, 242),
            status_prompt_bg: Color::new(249, 38, 114),
            status_prompt_fg: Color::new(248, 248, 242),
            selection_bg: Color::new(73, 72, 62),
            selection_fg: Color::new(248, 248, 242),
        }
    }

    pub fn nord() -> Self {
        Self {
            name: "nord",
            status_bar_bg: Color::new(59, 66, 82),
            status_bar_fg: Color::new(216, 222, 233),
            status_prompt_bg: Color::new(163, 190, 140),
            status_prompt_fg: Color::new(46, 52, 64),
            selection_bg: Color::new(76, 86, 106),
            selection_fg: Color::new(236, 239, 244),
        }
    }

    /// Get scheme by name; unknown names give the default
    pub fn by_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "solarized-dark" | "solarized_dark" => Self::solarized_dark(),
            "monokai" => Self::monokai(),
            "nord" => Self::nord(),
            _ => Self::default_scheme(),
        }
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}
