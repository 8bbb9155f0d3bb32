use std::collections::HashMap;
use std::fmt;

use sc_tensor::DType;

use crate::env::{self, EnvSource};

/// Absolute and relative slack for floating-point comparison.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    pub atol: f64,
    pub rtol: f64,
}

impl Tolerance {
    /// Used for any dtype without its own default.
    pub const GLOBAL: Tolerance = Tolerance {
        atol: 1e-6,
        rtol: 1e-6,
    };

    pub fn new(atol: f64, rtol: f64) -> Self {
        Tolerance { atol, rtol }
    }

    /// `|actual - expected| <= atol + rtol * |expected|`.
    ///
    /// Two NaNs are close, and equal infinities are close, so every value is
    /// close to itself.
    pub fn is_close(&self, expected: f64, actual: f64) -> bool {
        if expected.is_nan() || actual.is_nan() {
            return expected.is_nan() && actual.is_nan();
        }
        if expected == actual {
            return true;
        }
        (actual - expected).abs() <= self.atol + self.rtol * expected.abs()
    }
}

impl fmt::Display for Tolerance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "atol={:e}, rtol={:e}", self.atol, self.rtol)
    }
}

/// Per-run replacement of one or both tolerance components.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct ToleranceOverride {
    atol: Option<f64>,
    rtol: Option<f64>,
}

/// Maps a dtype to the tolerance used when comparing its values.
///
/// Lookup order: per-run override, then the dtype default, then
/// `Tolerance::GLOBAL`.
#[derive(Debug, Clone, PartialEq)]
pub struct ToleranceTable {
    defaults: HashMap<DType, Tolerance>,
    overrides: HashMap<DType, ToleranceOverride>,
}

impl Default for ToleranceTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ToleranceTable {
    /// Half precision gets a looser default than single precision.
    pub fn new() -> Self {
        let defaults = HashMap::from([
            (DType::F16, Tolerance::new(1e-3, 1e-3)),
            (DType::F32, Tolerance::new(1e-6, 1e-6)),
        ]);
        ToleranceTable {
            defaults,
            overrides: HashMap::new(),
        }
    }

    /// Replace both components for `dtype` for this run.
    pub fn with_override(mut self, dtype: DType, tolerance: Tolerance) -> Self {
        self.overrides.insert(
            dtype,
            ToleranceOverride {
                atol: Some(tolerance.atol),
                rtol: Some(tolerance.rtol),
            },
        );
        self
    }

    /// Reads the f16/f32 override variables. Missing or invalid values keep
    /// the defaults.
    pub fn from_env(source: &dyn EnvSource) -> Self {
        let mut table = Self::new();
        for (dtype, atol_var, rtol_var) in [
            (DType::F16, env::F16_ATOL_VAR, env::F16_RTOL_VAR),
            (DType::F32, env::F32_ATOL_VAR, env::F32_RTOL_VAR),
        ] {
            let o = ToleranceOverride {
                atol: env::read_f64(source, atol_var),
                rtol: env::read_f64(source, rtol_var),
            };
            if o != ToleranceOverride::default() {
                table.overrides.insert(dtype, o);
            }
        }
        table
    }

    pub fn lookup(&self, dtype: DType) -> Tolerance {
        let base = self.defaults.get(&dtype).copied().unwrap_or(Tolerance::GLOBAL);
        match self.overrides.get(&dtype) {
            Some(o) => Tolerance {
                atol: o.atol.unwrap_or(base.atol),
                rtol: o.rtol.unwrap_or(base.rtol),
            },
            None => base,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let table = ToleranceTable::new();
        assert_eq!(table.lookup(DType::F16), Tolerance::new(1e-3, 1e-3));
        assert_eq!(table.lookup(DType::F32), Tolerance::new(1e-6, 1e-6));
        assert_eq!(table.lookup(DType::F64), Tolerance::GLOBAL);
    }

    #[test]
    fn test_override_wins() {
        let table = ToleranceTable::new().with_override(DType::F32, Tolerance::new(1e-2, 0.0));
        assert_eq!(table.lookup(DType::F32), Tolerance::new(1e-2, 0.0));
        assert_eq!(table.lookup(DType::F16), Tolerance::new(1e-3, 1e-3));
    }

    #[test]
    fn test_from_env_partial_and_invalid() {
        let source = HashMap::from([
            (env::F16_ATOL_VAR, "0.05"),
            (env::F32_ATOL_VAR, "not-a-number"),
            (env::F32_RTOL_VAR, "1e-5"),
        ]);
        let table = ToleranceTable::from_env(&source);
        assert_eq!(table.lookup(DType::F16), Tolerance::new(0.05, 1e-3));
        assert_eq!(table.lookup(DType::F32), Tolerance::new(1e-6, 1e-5));
    }

    #[test]
    fn test_is_close() {
        let tol = Tolerance::GLOBAL;
        assert!(tol.is_close(1.0, 1.0 + 5e-7));
        assert!(!tol.is_close(1.0, 1.0 + 1e-4));
        assert!(tol.is_close(f64::NAN, f64::NAN));
        assert!(!tol.is_close(f64::NAN, 0.0));
        assert!(tol.is_close(f64::INFINITY, f64::INFINITY));
        assert!(!tol.is_close(f64::INFINITY, f64::NEG_INFINITY));
    }

    #[test]
    fn test_relative_component() {
        let tol = Tolerance::new(0.0, 1e-3);
        assert!(tol.is_close(1000.0, 1000.9));
        assert!(!tol.is_close(1.0, 1.01));
    }
}
