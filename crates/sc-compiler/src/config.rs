use std::collections::BTreeMap;
use std::fmt;

use crate::error::{CompileError, Result};

/// A typed stage configuration value.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Bool(bool),
    Str(String),
    Num(f64),
}

impl ConfigValue {
    fn type_name(&self) -> &'static str {
        match self {
            ConfigValue::Bool(_) => "bool",
            ConfigValue::Str(_) => "string",
            ConfigValue::Num(_) => "number",
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Bool(b) => write!(f, "{b}"),
            ConfigValue::Str(s) => write!(f, "{s:?}"),
            ConfigValue::Num(n) => write!(f, "{n}"),
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(v: bool) -> Self {
        ConfigValue::Bool(v)
    }
}

impl From<&str> for ConfigValue {
    fn from(v: &str) -> Self {
        ConfigValue::Str(v.to_string())
    }
}

impl From<f64> for ConfigValue {
    fn from(v: f64) -> Self {
        ConfigValue::Num(v)
    }
}

/// Ordered key/value configuration carried by a pipeline stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageConfig {
    entries: BTreeMap<String, ConfigValue>,
}

impl StageConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: &str, value: impl Into<ConfigValue>) -> Self {
        self.entries.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.entries.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// `Ok(None)` when absent, an error when present with another type.
    pub fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        match self.get(key) {
            None => Ok(None),
            Some(ConfigValue::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(type_error(key, "bool", other)),
        }
    }

    pub fn get_str(&self, key: &str) -> Result<Option<&str>> {
        match self.get(key) {
            None => Ok(None),
            Some(ConfigValue::Str(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(type_error(key, "string", other)),
        }
    }

    pub fn get_num(&self, key: &str) -> Result<Option<f64>> {
        match self.get(key) {
            None => Ok(None),
            Some(ConfigValue::Num(n)) => Ok(Some(*n)),
            Some(other) => Err(type_error(key, "number", other)),
        }
    }
}

fn type_error(key: &str, expected: &str, got: &ConfigValue) -> CompileError {
    CompileError::ConfigType {
        key: key.to_string(),
        expected: expected.to_string(),
        got: got.type_name().to_string(),
    }
}

/// Which passes a stage enables. Absent keys mean disabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassOptions {
    /// Algebraic identities (`x+0`, `x*1`, `--x`).
    pub simplify: bool,
    /// Re-infer and verify every node's metadata.
    pub check_shapes: bool,
    /// Rewrite `a-b` into `a+(-b)` for backend lowering.
    pub decompose: bool,
    /// Drop nodes unreachable from the outputs.
    pub eliminate_dead_code: bool,
}

impl PassOptions {
    pub const SIMPLIFY: &'static str = "simplify";
    pub const CHECK_SHAPES: &'static str = "check_shapes";
    pub const DECOMPOSE: &'static str = "decompose";
    pub const ELIMINATE_DEAD_CODE: &'static str = "eliminate_dead_code";

    /// Every pass enabled.
    pub fn all() -> Self {
        PassOptions {
            simplify: true,
            check_shapes: true,
            decompose: true,
            eliminate_dead_code: true,
        }
    }

    pub fn from_config(config: &StageConfig) -> Result<Self> {
        Ok(PassOptions {
            simplify: config.get_bool(Self::SIMPLIFY)?.unwrap_or(false),
            check_shapes: config.get_bool(Self::CHECK_SHAPES)?.unwrap_or(false),
            decompose: config.get_bool(Self::DECOMPOSE)?.unwrap_or(false),
            eliminate_dead_code: config.get_bool(Self::ELIMINATE_DEAD_CODE)?.unwrap_or(false),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_getters() {
        let config = StageConfig::new()
            .with("simplify", true)
            .with("label", "frontend")
            .with("opt_level", 2.0);
        assert_eq!(config.get_bool("simplify").unwrap(), Some(true));
        assert_eq!(config.get_str("label").unwrap(), Some("frontend"));
        assert_eq!(config.get_num("opt_level").unwrap(), Some(2.0));
        assert_eq!(config.get_bool("missing").unwrap(), None);
    }

    #[test]
    fn test_wrong_type_is_an_error() {
        let config = StageConfig::new().with("simplify", "yes");
        let err = config.get_bool("simplify").unwrap_err();
        assert_eq!(
            err.to_string(),
            "stage config key 'simplify': expected bool, got string"
        );
        assert!(PassOptions::from_config(&config).is_err());
    }

    #[test]
    fn test_pass_options_default_off() {
        let options = PassOptions::from_config(&StageConfig::new()).unwrap();
        assert_eq!(options, PassOptions::default());

        let config = StageConfig::new().with("decompose", true).with("simplify", false);
        let options = PassOptions::from_config(&config).unwrap();
        assert!(options.decompose);
        assert!(!options.simplify);
        assert!(!options.eliminate_dead_code);
    }

    #[test]
    fn test_iteration_is_ordered() {
        let config = StageConfig::new().with("b", true).with("a", false);
        let keys: Vec<&str> = config.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }
}
