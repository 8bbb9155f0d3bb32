//! Typed access to the environment variables that configure a run.

use std::collections::HashMap;
use std::time::Duration;

use tracing::warn;

use crate::error::{HarnessError, Result};

/// Names the active pipeline stage.
pub const STAGE_VAR: &str = "STAGECHECK_STAGE";
/// Enables bisection against the previous stage.
pub const DIFF_VAR: &str = "STAGECHECK_DIFF";
/// Selects the compiled variant that runs through the target backend.
pub const BACKEND_VAR: &str = "STAGECHECK_BACKEND";
/// Exercises the compiled path at all.
pub const JIT_VAR: &str = "STAGECHECK_JIT";
pub const F16_ATOL_VAR: &str = "STAGECHECK_F16_ATOL";
pub const F16_RTOL_VAR: &str = "STAGECHECK_F16_RTOL";
pub const F32_ATOL_VAR: &str = "STAGECHECK_F32_ATOL";
pub const F32_RTOL_VAR: &str = "STAGECHECK_F32_RTOL";
/// Seconds to wait for a bisection child before treating it as failed.
pub const BISECT_TIMEOUT_VAR: &str = "STAGECHECK_BISECT_TIMEOUT_SECS";

/// Where configuration variables are read from.
pub trait EnvSource {
    fn get(&self, key: &str) -> Option<String>;
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

impl EnvSource for HashMap<&str, &str> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).map(|v| v.to_string())
    }
}

/// Result of parsing a boolean-like string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagValue {
    True,
    False,
    Invalid,
}

impl FlagValue {
    pub fn parse(raw: &str) -> FlagValue {
        match raw.trim() {
            "1" | "true" | "True" | "TRUE" | "on" | "ON" => FlagValue::True,
            "0" | "false" | "False" | "FALSE" | "off" | "OFF" => FlagValue::False,
            _ => FlagValue::Invalid,
        }
    }
}

/// Reads a string variable; unset and blank are both `None`.
pub fn read_str(env: &dyn EnvSource, var: &str) -> Option<String> {
    env.get(var)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Reads a boolean flag. Unset is `Ok(None)`; an unparsable value is an error.
pub fn read_flag(env: &dyn EnvSource, var: &str) -> Result<Option<bool>> {
    let Some(raw) = read_str(env, var) else {
        return Ok(None);
    };
    match FlagValue::parse(&raw) {
        FlagValue::True => Ok(Some(true)),
        FlagValue::False => Ok(Some(false)),
        FlagValue::Invalid => Err(HarnessError::InvalidFlag {
            var: var.to_string(),
            value: raw,
        }),
    }
}

/// Reads a non-negative finite number. Invalid values are logged and ignored.
pub fn read_f64(env: &dyn EnvSource, var: &str) -> Option<f64> {
    let raw = read_str(env, var)?;
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Some(v),
        _ => {
            warn!(var, value = %raw, "ignoring invalid numeric setting");
            None
        }
    }
}

/// Reads a duration in seconds. `0` means no limit and is `None`; a value too
/// large for a `Duration` is logged and ignored.
pub fn read_secs(env: &dyn EnvSource, var: &str) -> Option<Duration> {
    let secs = read_f64(env, var)?;
    if secs == 0.0 {
        return None;
    }
    match Duration::try_from_secs_f64(secs) {
        Ok(d) => Some(d),
        Err(err) => {
            warn!(var, secs, %err, "ignoring out-of-range duration");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_parse() {
        for raw in ["1", "true", "True", "TRUE", "on", "ON", " 1 "] {
            assert_eq!(FlagValue::parse(raw), FlagValue::True, "{raw}");
        }
        for raw in ["0", "false", "False", "FALSE", "off", "OFF"] {
            assert_eq!(FlagValue::parse(raw), FlagValue::False, "{raw}");
        }
        for raw in ["yes", "2", "tru", ""] {
            assert_eq!(FlagValue::parse(raw), FlagValue::Invalid, "{raw}");
        }
    }

    #[test]
    fn test_read_flag() {
        let env = HashMap::from([("A", "true"), ("B", "0"), ("C", "maybe"), ("D", "  ")]);
        assert_eq!(read_flag(&env, "A").unwrap(), Some(true));
        assert_eq!(read_flag(&env, "B").unwrap(), Some(false));
        assert_eq!(read_flag(&env, "D").unwrap(), None);
        assert_eq!(read_flag(&env, "missing").unwrap(), None);
        assert_eq!(
            read_flag(&env, "C").unwrap_err(),
            HarnessError::InvalidFlag {
                var: "C".to_string(),
                value: "maybe".to_string()
            }
        );
    }

    #[test]
    fn test_read_f64() {
        let env = HashMap::from([("A", "1e-4"), ("B", "abc"), ("C", "-1"), ("D", "inf")]);
        assert_eq!(read_f64(&env, "A"), Some(1e-4));
        assert_eq!(read_f64(&env, "B"), None);
        assert_eq!(read_f64(&env, "C"), None);
        assert_eq!(read_f64(&env, "D"), None);
        assert_eq!(read_f64(&env, "missing"), None);
    }

    #[test]
    fn test_read_secs() {
        let env = HashMap::from([("A", "0.25"), ("B", "0"), ("C", "1e30"), ("D", "-3")]);
        assert_eq!(read_secs(&env, "A"), Some(Duration::from_millis(250)));
        assert_eq!(read_secs(&env, "B"), None);
        assert_eq!(read_secs(&env, "C"), None);
        assert_eq!(read_secs(&env, "D"), None);
    }
}
