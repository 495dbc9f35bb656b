//! Settings persistence: a flat string key-value store serialized as TOML.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Whether documentation opens in the tool window instead of a popup.
pub const SHOW_IN_TOOL_WINDOW: &str = "ShowDocumentationInToolWindow";

/// Whether the tool window follows the editor caret.
pub const AUTO_UPDATE_ENABLED: &str = "DocumentationAutoUpdateEnabled";

/// Font size used to render example snippets.
pub const FONT_SIZE: &str = "code.example.font.size";

/// Auto-update is on unless the user turned it off.
const AUTO_UPDATE_DEFAULT: bool = true;

/// Font sizes for rendered documentation, smallest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FontSize {
    /// Extra-extra small.
    XxSmall,
    /// Extra small.
    XSmall,
    /// Small, the default.
    Small,
    /// Medium.
    Medium,
    /// Large.
    Large,
    /// Extra large.
    XLarge,
    /// Extra-extra large.
    XxLarge,
}

impl FontSize {
    /// Every size in ascending order.
    const ALL: [FontSize; 7] = [
        FontSize::XxSmall,
        FontSize::XSmall,
        FontSize::Small,
        FontSize::Medium,
        FontSize::Large,
        FontSize::XLarge,
        FontSize::XxLarge,
    ];

    /// Stored name of the size.
    pub const fn as_str(self) -> &'static str {
        return match self {
            FontSize::XxSmall => "XX_SMALL",
            FontSize::XSmall => "X_SMALL",
            FontSize::Small => "SMALL",
            FontSize::Medium => "MEDIUM",
            FontSize::Large => "LARGE",
            FontSize::XLarge => "X_LARGE",
            FontSize::XxLarge => "XX_LARGE",
        };
    }

    /// Parse a stored name; `None` for anything unrecognized.
    pub fn parse(value: &str) -> Option<Self> {
        return Self::ALL.into_iter().find(|size| return size.as_str() == value);
    }

    /// One step larger, saturating at the largest size.
    #[must_use]
    pub fn larger(self) -> Self {
        let idx = Self::ALL.iter().position(|s| return *s == self).unwrap_or(0);
        return Self::ALL.get(idx.saturating_add(1)).copied().unwrap_or(self);
    }

    /// One step smaller, saturating at the smallest size.
    #[must_use]
    pub fn smaller(self) -> Self {
        let idx = Self::ALL.iter().position(|s| return *s == self).unwrap_or(0);
        return idx.checked_sub(1).and_then(|i| return Self::ALL.get(i).copied()).unwrap_or(self);
    }
}

/// On-disk shape of the settings file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct SettingsFile {
    /// Raw string values by key.
    #[serde(default)]
    values: BTreeMap<String, String>,
}

/// Persisted key-value settings shared by the manager and its collaborators.
/// In-memory only when created without a path.
#[derive(Debug, Default)]
pub struct Settings {
    /// Backing file, if persistent.
    path: Option<PathBuf>,
    /// Current values by key.
    values: BTreeMap<String, String>,
}

impl Settings {
    /// Settings that live only for the process.
    pub fn in_memory() -> Self {
        return Self::default();
    }

    /// Open settings backed by a TOML file. A missing file starts empty.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` for read failures other than not-found,
    /// or `Error::TomlDe` if the file is not valid TOML.
    pub fn open(path: &Path) -> Result<Self, Error> {
        let values = match std::fs::read_to_string(path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(Error::Io(e)),
            Ok(content) => toml::from_str::<SettingsFile>(&content)?.values,
        };
        return Ok(Self {
            path: Some(path.to_path_buf()),
            values,
        });
    }

    /// Raw string value for a key.
    pub fn value(&self, key: &str) -> Option<&str> {
        return self.values.get(key).map(String::as_str);
    }

    /// Boolean value for a key, `default` when unset.
    ///
    /// # Errors
    ///
    /// Returns `Error::SettingsCorrupt` if the stored value is not `true`/`false`.
    pub fn bool_value(&self, key: &str, default: bool) -> Result<bool, Error> {
        return match self.value(key) {
            None => Ok(default),
            Some("true") => Ok(true),
            Some("false") => Ok(false),
            Some(other) => Err(Error::SettingsCorrupt {
                reason: format!("`{key}` must be true or false, found `{other}`"),
            }),
        };
    }

    /// Store a value and persist immediately when file-backed.
    ///
    /// # Errors
    ///
    /// Returns `Error::TomlSer` or `Error::Io` if persisting fails.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), Error> {
        self.values.insert(key.to_string(), value.to_string());
        return self.save();
    }

    /// Store a boolean value.
    ///
    /// # Errors
    ///
    /// Returns `Error::TomlSer` or `Error::Io` if persisting fails.
    pub fn set_bool(&mut self, key: &str, value: bool) -> Result<(), Error> {
        return self.set_value(key, if value { "true" } else { "false" });
    }

    /// Whether documentation should open in the tool window. Corrupt values read as `false`.
    pub fn show_in_tool_window(&self) -> bool {
        return self.bool_value(SHOW_IN_TOOL_WINDOW, false).unwrap_or(false);
    }

    /// Whether auto-update is enabled. Corrupt values read as the default.
    pub fn auto_update_enabled(&self) -> bool {
        return self
            .bool_value(AUTO_UPDATE_ENABLED, AUTO_UPDATE_DEFAULT)
            .unwrap_or(AUTO_UPDATE_DEFAULT);
    }

    /// Font size for snippets; unset or unknown values fall back to SMALL.
    pub fn font_size(&self) -> FontSize {
        return self.value(FONT_SIZE).and_then(FontSize::parse).unwrap_or(FontSize::Small);
    }

    /// Store the snippet font size.
    ///
    /// # Errors
    ///
    /// Returns `Error::TomlSer` or `Error::Io` if persisting fails.
    pub fn set_font_size(&mut self, size: FontSize) -> Result<(), Error> {
        return self.set_value(FONT_SIZE, size.as_str());
    }

    /// Write the settings to their backing file, if any.
    ///
    /// # Errors
    ///
    /// Returns `Error::TomlSer` if serialization fails,
    /// or `Error::Io` if the file cannot be written.
    fn save(&self) -> Result<(), Error> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let file = SettingsFile {
            values: self.values.clone(),
        };
        let content = toml::to_string_pretty(&file)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        return Ok(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".quickdoc/settings.toml");

        let mut settings = Settings::open(&path).unwrap();
        assert!(!settings.show_in_tool_window());
        settings.set_bool(SHOW_IN_TOOL_WINDOW, true).unwrap();
        settings.set_font_size(FontSize::Large).unwrap();

        let reopened = Settings::open(&path).unwrap();
        assert!(reopened.show_in_tool_window());
        assert_eq!(reopened.font_size(), FontSize::Large);
    }

    #[test]
    fn auto_update_defaults_on() {
        assert!(Settings::in_memory().auto_update_enabled());
    }

    #[test]
    fn corrupt_bool_is_reported() {
        let mut settings = Settings::in_memory();
        settings.set_value(SHOW_IN_TOOL_WINDOW, "yes").unwrap();
        assert!(matches!(
            settings.bool_value(SHOW_IN_TOOL_WINDOW, false),
            Err(Error::SettingsCorrupt { .. })
        ));
        assert!(!settings.show_in_tool_window());
    }

    #[test]
    fn font_size_steps_saturate() {
        assert_eq!(FontSize::Small.larger(), FontSize::Medium);
        assert_eq!(FontSize::XxLarge.larger(), FontSize::XxLarge);
        assert_eq!(FontSize::XxSmall.smaller(), FontSize::XxSmall);
        assert_eq!(Settings::in_memory().font_size(), FontSize::Small);
    }
}
