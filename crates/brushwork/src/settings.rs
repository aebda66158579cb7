//! Solver settings.

use brushwork_intersect::SolveOptions;
use brushwork_math::{Tolerance, PLANE_DISTANCE_EPSILON};
use serde::{Deserialize, Serialize};

use crate::error::{CsgError, Result};

/// Tuning for intersection passes.
///
/// Every field is optional in TOML; missing ones take their defaults.
///
/// ```
/// use brushwork::SolverSettings;
///
/// let settings = SolverSettings::from_toml_str("parallel = false").unwrap();
/// assert!(!settings.parallel);
/// assert_eq!(settings.min_parallel_brushes, 64);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    /// Plane-distance epsilon for bounds and separating-plane tests.
    pub plane_distance_epsilon: f64,
    /// Run pair tests and encoding on the rayon pool.
    pub parallel: bool,
    /// Below this many brushes passes stay on the calling thread.
    pub min_parallel_brushes: usize,
    /// Check hierarchy consistency after every edit.
    pub verify_consistency: bool,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            plane_distance_epsilon: PLANE_DISTANCE_EPSILON,
            parallel: true,
            min_parallel_brushes: 64,
            verify_consistency: false,
        }
    }
}

impl SolverSettings {
    /// Validate settings.
    pub fn validate(&self) -> Result<()> {
        if !self.plane_distance_epsilon.is_finite() || self.plane_distance_epsilon < 0.0 {
            return Err(CsgError::Settings(
                "plane_distance_epsilon must be finite and non-negative".into(),
            ));
        }
        if self.min_parallel_brushes == 0 {
            return Err(CsgError::Settings(
                "min_parallel_brushes must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let settings: SolverSettings = toml::from_str(source)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Options for [`brushwork_intersect::solve`].
    pub fn solve_options(&self) -> SolveOptions {
        SolveOptions {
            tolerance: Tolerance::new(self.plane_distance_epsilon),
            parallel: self.parallel,
            min_parallel_brushes: self.min_parallel_brushes,
        }
    }

    /// Whether a pass over `brushes` brushes should use the rayon pool.
    pub fn use_parallel(&self, brushes: usize) -> bool {
        self.parallel && brushes >= self.min_parallel_brushes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = SolverSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.plane_distance_epsilon, PLANE_DISTANCE_EPSILON);
        assert_eq!(SolverSettings::from_toml_str("").unwrap(), settings);
    }

    #[test]
    fn test_toml_overrides() {
        let settings = SolverSettings::from_toml_str(
            "plane_distance_epsilon = 0.001\nmin_parallel_brushes = 8\nverify_consistency = true\n",
        )
        .unwrap();
        assert_eq!(settings.plane_distance_epsilon, 0.001);
        assert_eq!(settings.min_parallel_brushes, 8);
        assert!(settings.verify_consistency);
        assert!(settings.parallel);

        let options = settings.solve_options();
        assert_eq!(options.tolerance.plane_distance, 0.001);
        assert_eq!(options.min_parallel_brushes, 8);
        assert!(settings.use_parallel(8));
        assert!(!settings.use_parallel(7));
    }

    #[test]
    fn test_invalid_settings_rejected() {
        assert!(matches!(
            SolverSettings::from_toml_str("plane_distance_epsilon = -1.0"),
            Err(CsgError::Settings(_))
        ));
        assert!(matches!(
            SolverSettings::from_toml_str("min_parallel_brushes = 0"),
            Err(CsgError::Settings(_))
        ));
        assert!(matches!(
            SolverSettings::from_toml_str("parallel = \"yes\""),
            Err(CsgError::TomlParse(_))
        ));
    }
}
