use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use waxwing::error::{Chainable, NotFound, Result};
use waxwing::subset::CoreAllowlist;
use waxwing::error;

/// Pipeline settings, read from `shrike.toml` when present. Every field
/// has a default; CLI flags override file values.
#[derive(Debug, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Directory of rendered documents to scan. Default: `dist`.
    pub pages: PathBuf,
    /// Vendor stylesheet to subset. Default: `assets/css/icons.min.css`.
    pub stylesheet: PathBuf,
    /// Destination for the subset stylesheet. Default:
    /// `<pages>/assets/css/<stylesheet file name>`.
    pub output: Option<PathBuf>,
    /// Extension of the documents to scan. Default: `html`.
    pub extension: String,
    /// Icon class prefix. Default: `fa`.
    pub prefix: String,
    /// Selector members kept unconditionally.
    pub core_selectors: Vec<String>,
    /// At-rule keywords kept unconditionally.
    pub core_at_rules: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        let allow = CoreAllowlist::default();
        Settings {
            pages: "dist".into(),
            stylesheet: "assets/css/icons.min.css".into(),
            output: None,
            extension: "html".into(),
            prefix: "fa".into(),
            core_selectors: allow.selectors,
            core_at_rules: allow.at_rules,
        }
    }
}

impl Settings {
    /// Reads `path` when given, `shrike.toml` when it exists, and the
    /// defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) if !path.is_file() => {
                return Err(NotFound { path: path.into(), expected: "file" }.into());
            }
            Some(path) => path,
            None if Path::new(crate::CONFIG_FILE).is_file() => Path::new(crate::CONFIG_FILE),
            None => return Ok(Settings::default()),
        };

        let raw = std::fs::read_to_string(path).chain_with(|| error! {
            "failed to read settings",
            "path" => path.display(),
        })?;

        toml::from_str(&raw).chain_with(|| error! {
            "failed to parse settings",
            "path" => path.display(),
        })
    }

    /// The destination path, derived from `pages` when not set explicitly.
    pub fn output(&self) -> PathBuf {
        match &self.output {
            Some(path) => path.clone(),
            None => self.pages
                .join("assets/css")
                .join(self.stylesheet.file_name().unwrap_or_default()),
        }
    }

    pub fn allowlist(&self) -> CoreAllowlist {
        CoreAllowlist {
            at_rules: self.core_at_rules.clone(),
            selectors: self.core_selectors.clone(),
        }
    }
}
