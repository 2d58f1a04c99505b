//! Persisted client-local preferences: UI density and language.
//!
//! Stored under fixed keys in a TOML file, read once at startup and written
//! on explicit change. A missing or unreadable file falls back to defaults;
//! preferences are never worth failing startup over.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ClientError;
use crate::locale::Language;

/// UI spacing preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Density {
    #[default]
    Comfortable,
    Compact,
}

impl Density {
    pub fn toggle(self) -> Self {
        match self {
            Density::Comfortable => Density::Compact,
            Density::Compact => Density::Comfortable,
        }
    }
}

/// Fixed-key preference set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prefs {
    #[serde(default)]
    pub density: Density,
    #[serde(default)]
    pub language: Language,
}

impl Prefs {
    /// Default location: `<config dir>/datachat/prefs.toml`.
    pub fn default_path() -> Option<PathBuf> {
        Some(dirs::config_dir()?.join("datachat").join("prefs.toml"))
    }

    /// Read preferences, falling back to defaults when the file is missing
    /// or does not parse.
    pub fn load(path: &Path) -> Prefs {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(_) => return Prefs::default(),
        };
        match toml::from_str(&raw) {
            Ok(prefs) => prefs,
            Err(e) => {
                warn!(
                    component = "prefs",
                    event = "prefs.parse_failed",
                    path = %path.display(),
                    error = %e,
                    "Ignoring unreadable preferences file"
                );
                Prefs::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ClientError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = toml::to_string_pretty(self).map_err(|e| ClientError::Prefs(e.to_string()))?;
        std::fs::write(path, raw)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_through_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("prefs.toml");

        let prefs = Prefs {
            density: Density::Compact,
            language: Language::Zh,
        };
        prefs.save(&path).expect("save");
        assert_eq!(Prefs::load(&path), prefs);
    }

    #[test]
    fn missing_or_corrupt_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("nope.toml");
        assert_eq!(Prefs::load(&missing), Prefs::default());

        let corrupt = dir.path().join("corrupt.toml");
        std::fs::write(&corrupt, "density = 7").expect("write");
        assert_eq!(Prefs::load(&corrupt), Prefs::default());
    }

    #[test]
    fn density_toggles() {
        assert_eq!(Density::Comfortable.toggle(), Density::Compact);
        assert_eq!(Density::Compact.toggle(), Density::Comfortable);
    }
}
