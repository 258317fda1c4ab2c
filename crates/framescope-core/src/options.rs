//! Configuration options for the analysis engine.

use serde::{Deserialize, Serialize};

/// Engine configuration. Serializable so a frontend can persist it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisOptions {
    /// Screen-space radius in pixels within which a point/line vertex
    /// counts as under the cursor.
    pub pick_radius_px: f32,

    /// Prefer a software fallback adapter (useful for CI).
    pub force_fallback_adapter: bool,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            pick_radius_px: 15.0,
            force_fallback_adapter: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_round_trip_through_json() {
        let opts = AnalysisOptions {
            pick_radius_px: 20.0,
            force_fallback_adapter: true,
        };
        let text = serde_json::to_string(&opts).unwrap();
        let back: AnalysisOptions = serde_json::from_str(&text).unwrap();
        assert_eq!(back.pick_radius_px, 20.0);
        assert!(back.force_fallback_adapter);
    }
}
