//! Parameters structure for the resolver

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use super::StrikeStyle;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for redundancy resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolverParams {
    /// Smallest singular value of the weighted Jacobian below which the
    /// configuration is treated as singular and damping is applied.
    pub singular_threshold: f64,

    /// Damping factor applied when the smallest singular value reaches zero.
    /// Damping falls off quadratically to zero at `singular_threshold`.
    pub max_damping: f64,

    /// Strike style used when a hit target does not override it.
    pub default_style: StrikeStyle,
}

impl Default for ResolverParams {
    fn default() -> Self {
        Self {
            singular_threshold: 0.05,
            max_damping: 0.1,
            default_style: StrikeStyle::default(),
        }
    }
}
