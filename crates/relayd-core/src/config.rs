//! Host configuration for the extension core.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A search-directory pair: where package code lives and where instances of
/// packages found there keep their data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleDirs {
    pub code_dir: PathBuf,
    pub data_dir: PathBuf,
}

/// What happens when an extension name is loaded twice into one container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// A second load of the same name into the same container fails.
    #[default]
    Reject,
    /// Duplicate loads produce independent instances. Note that duplicate
    /// instances in one container share a persistent-store namespace.
    Allow,
}

/// Configuration of the extension core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Search directories, tried in order; the first match wins.
    #[serde(default)]
    pub module_dirs: Vec<ModuleDirs>,

    /// Duplicate-load behavior per container.
    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,

    /// Locale used for translation lookups.
    #[serde(default = "default_locale")]
    pub locale: String,
}

fn default_locale() -> String {
    "en".to_string()
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            module_dirs: Vec::new(),
            duplicate_policy: DuplicatePolicy::default(),
            locale: default_locale(),
        }
    }
}

impl CoreConfig {
    /// Parse a configuration from its TOML form.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Add a search-directory pair.
    pub fn with_module_dir(
        mut self,
        code_dir: impl Into<PathBuf>,
        data_dir: impl Into<PathBuf>,
    ) -> Self {
        self.module_dirs.push(ModuleDirs {
            code_dir: code_dir.into(),
            data_dir: data_dir.into(),
        });
        self
    }

    /// Set the duplicate-load policy.
    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CoreConfig::default();
        assert!(config.module_dirs.is_empty());
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Reject);
        assert_eq!(config.locale, "en");
    }

    #[test]
    fn test_from_toml() {
        let text = r#"
            locale = "de"
            duplicate_policy = "allow"

            [[module_dirs]]
            code_dir = "/usr/lib/relayd/modules"
            data_dir = "/var/lib/relayd/moddata"

            [[module_dirs]]
            code_dir = "/home/user/.relayd/modules"
            data_dir = "/home/user/.relayd/moddata"
        "#;
        let config = CoreConfig::from_toml_str(text).unwrap();
        assert_eq!(config.module_dirs.len(), 2);
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Allow);
        assert_eq!(config.locale, "de");
        assert_eq!(
            config.module_dirs[0].code_dir,
            PathBuf::from("/usr/lib/relayd/modules")
        );
    }

    #[test]
    fn test_builder() {
        let config = CoreConfig::default()
            .with_module_dir("/a", "/b")
            .with_duplicate_policy(DuplicatePolicy::Allow);
        assert_eq!(config.module_dirs.len(), 1);
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Allow);
    }
}
