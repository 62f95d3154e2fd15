//
// config.rs
//
// Client-provided settings for the BuildGraph language server
//

use serde_json::Value;

/// Settings section read from `initializationOptions` and
/// `workspace/didChangeConfiguration`.
pub const SETTINGS_SECTION: &str = "buildGraph";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildGraphConfig {
    /// Upper bound on the size of an include closure
    pub max_dependency_files: usize,
    /// Build tool launcher searched for in the script's ancestors
    pub launcher_name: String,
    /// Show a message when go-to-definition hits a missing include target
    pub warn_on_missing_include: bool,
    /// Whether `#tag` / `$(var)` semantic tokens are advertised
    pub semantic_tokens: bool,
}

impl Default for BuildGraphConfig {
    fn default() -> Self {
        Self {
            max_dependency_files: 2048,
            launcher_name: "RunUAT.bat".to_string(),
            warn_on_missing_include: true,
            semantic_tokens: true,
        }
    }
}

impl BuildGraphConfig {
    /// Parse the `buildGraph` section of a settings object.
    ///
    /// Returns `None` when the section is absent. Fields that are missing keep
    /// their defaults; fields with the wrong type or an unusable value are
    /// ignored with a warning.
    pub fn from_settings(settings: &Value) -> Option<Self> {
        let section = settings.get(SETTINGS_SECTION)?;
        if !section.is_object() {
            log::warn!("Ignoring non-object '{}' settings: {}", SETTINGS_SECTION, section);
            return None;
        }

        let mut config = Self::default();

        if let Some(v) = section.get("maxDependencyFiles") {
            match v.as_u64().filter(|n| *n > 0) {
                Some(n) => config.max_dependency_files = n as usize,
                None => log::warn!("Ignoring invalid maxDependencyFiles: {}", v),
            }
        }
        if let Some(v) = section.get("launcherName") {
            match v.as_str().map(str::trim).filter(|s| !s.is_empty()) {
                Some(name) => config.launcher_name = name.to_string(),
                None => log::warn!("Ignoring invalid launcherName: {}", v),
            }
        }
        if let Some(v) = section.get("warnOnMissingInclude") {
            match v.as_bool() {
                Some(b) => config.warn_on_missing_include = b,
                None => log::warn!("Ignoring invalid warnOnMissingInclude: {}", v),
            }
        }
        if let Some(v) = section.get("semanticTokens") {
            match v.as_bool() {
                Some(b) => config.semantic_tokens = b,
                None => log::warn!("Ignoring invalid semanticTokens: {}", v),
            }
        }

        log::trace!("Parsed configuration: {:?}", config);
        Some(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_values() {
        let config = BuildGraphConfig::default();
        assert_eq!(config.max_dependency_files, 2048);
        assert_eq!(config.launcher_name, "RunUAT.bat");
        assert!(config.warn_on_missing_include);
        assert!(config.semantic_tokens);
    }

    #[test]
    fn test_missing_section() {
        assert!(BuildGraphConfig::from_settings(&json!({})).is_none());
        assert!(BuildGraphConfig::from_settings(&json!({ "buildGraph": 3 })).is_none());
    }

    #[test]
    fn test_partial_settings_keep_defaults() {
        let config =
            BuildGraphConfig::from_settings(&json!({ "buildGraph": { "maxDependencyFiles": 64 } }))
                .unwrap();
        assert_eq!(config.max_dependency_files, 64);
        assert_eq!(config.launcher_name, "RunUAT.bat");
        assert!(config.warn_on_missing_include);
    }

    #[test]
    fn test_all_settings() {
        let config = BuildGraphConfig::from_settings(&json!({
            "buildGraph": {
                "maxDependencyFiles": 10,
                "launcherName": "RunUAT.sh",
                "warnOnMissingInclude": false,
                "semanticTokens": false
            }
        }))
        .unwrap();
        assert_eq!(
            config,
            BuildGraphConfig {
                max_dependency_files: 10,
                launcher_name: "RunUAT.sh".to_string(),
                warn_on_missing_include: false,
                semantic_tokens: false,
            }
        );
    }

    #[test]
    fn test_invalid_values_are_ignored() {
        let config = BuildGraphConfig::from_settings(&json!({
            "buildGraph": {
                "maxDependencyFiles": 0,
                "launcherName": "  ",
                "warnOnMissingInclude": "yes"
            }
        }))
        .unwrap();
        assert_eq!(config, BuildGraphConfig::default());
    }
}
