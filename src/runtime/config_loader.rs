//! Compiler configuration loader.
//!
//! Loads the directive settings from YAML and applies environment overrides.
//!
//! ```yaml
//! directive: shape
//! delete_prefix: "_"
//! ```

use std::env;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::compiler::CompileOptions;

/// Environment variable overriding the configured directive name
pub const DIRECTIVE_ENV: &str = "GRAPHQL_SHAPE_DIRECTIVE";

fn default_directive() -> String {
    CompileOptions::DEFAULT_DIRECTIVE.to_string()
}

fn default_delete_prefix() -> String {
    CompileOptions::DEFAULT_DELETE_PREFIX.to_string()
}

/// Directive settings for compiling queries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapeConfig {
    /// Name of the transform directive, without `@`
    #[serde(default = "default_directive")]
    pub directive: String,

    /// Prefix marking the field-deletion variant of the directive
    #[serde(default = "default_delete_prefix")]
    pub delete_prefix: String,
}

impl Default for ShapeConfig {
    fn default() -> Self {
        Self {
            directive: default_directive(),
            delete_prefix: default_delete_prefix(),
        }
    }
}

impl ShapeConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    /// Returns error if the file cannot be read or is not valid YAML
    ///
    /// # Example
    /// ```ignore
    /// use graphql_shape::runtime::ShapeConfig;
    ///
    /// let config = ShapeConfig::load_from_file("shape.yaml")?;
    /// println!("Directive: @{}", config.directive);
    /// ```
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let path = path.as_ref();

        let contents = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {}", path.display(), e))?;

        Self::from_yaml_str(&contents)
    }

    /// Parse configuration from YAML text
    pub fn from_yaml_str(contents: &str) -> Result<Self, String> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Self =
            serde_yaml::from_str(contents).map_err(|e| format!("Failed to parse YAML: {}", e))?;
        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<(), String> {
        if self.directive.is_empty() {
            return Err("Config field 'directive' must not be empty".to_string());
        }
        if self.directive.starts_with('@') {
            return Err(format!(
                "Config field 'directive' must not include '@': {}",
                self.directive
            ));
        }
        Ok(())
    }

    /// Apply `GRAPHQL_SHAPE_DIRECTIVE` if it is set
    pub fn with_env_overrides(self) -> Self {
        self.with_directive_override(env::var(DIRECTIVE_ENV).ok())
    }

    /// Replace the directive name when `directive` is a non-empty value
    pub fn with_directive_override(mut self, directive: Option<String>) -> Self {
        if let Some(name) = directive.filter(|d| !d.is_empty()) {
            tracing::debug!(directive = %name, "Overriding directive name");
            self.directive = name;
        }
        self
    }

    /// Options for the compiler
    pub fn compile_options(&self) -> CompileOptions {
        CompileOptions {
            directive: self.directive.clone(),
            delete_prefix: self.delete_prefix.clone(),
        }
    }
}
