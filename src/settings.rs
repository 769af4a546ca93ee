use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;

/// The deepest level the node lattice of a root can resolve.
pub const MAX_LATTICE_LEVEL: usize = 30;

/// The highest number of nodes per axis an element may have.
pub const MAX_NNODE_1D: usize = 7;

/// Lattice intervals per axis of a cell, divisible by every admissible number of node
/// intervals per axis.
pub(crate) const LATTICE_UNIT: i64 = 60;

/// Limits and tolerances that govern mesh adaptation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptivitySettings {
    /// Leaves at this level are not refined any further.
    pub max_refinement_level: usize,
    /// Sons are not merged into fathers below this level.
    pub min_refinement_level: usize,
    /// Maximum admissible discrepancy in the neighbour self-test.
    pub neighbour_tolerance: f64,
    /// Hanging node weights of smaller magnitude are dropped.
    pub hanging_weight_tolerance: f64,
}

impl Default for AdaptivitySettings {
    fn default() -> Self {
        Self {
            max_refinement_level: 20,
            min_refinement_level: 0,
            neighbour_tolerance: 1e-14,
            hanging_weight_tolerance: 1e-14,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InvalidSettings {
    reason: String,
}

impl fmt::Display for InvalidSettings {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Invalid adaptivity settings: {}", self.reason)
    }
}

impl Error for InvalidSettings {}

impl AdaptivitySettings {
    pub fn validate(&self) -> Result<(), InvalidSettings> {
        let invalid = |reason: String| Err(InvalidSettings { reason });
        if self.max_refinement_level > MAX_LATTICE_LEVEL {
            return invalid(format!(
                "max_refinement_level {} exceeds {}",
                self.max_refinement_level, MAX_LATTICE_LEVEL
            ));
        }
        if self.min_refinement_level > self.max_refinement_level {
            return invalid(format!(
                "min_refinement_level {} exceeds max_refinement_level {}",
                self.min_refinement_level, self.max_refinement_level
            ));
        }
        for (name, value) in [
            ("neighbour_tolerance", self.neighbour_tolerance),
            ("hanging_weight_tolerance", self.hanging_weight_tolerance),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return invalid(format!("{} must be finite and non-negative, got {}", name, value));
            }
        }
        Ok(())
    }
}
