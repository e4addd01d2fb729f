//! Traversal settings.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{KernelError, Result};
use crate::lanes::PACKET_WIDTH;

/// Tuning and feature switches for packet traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraversalSettings {
    /// Active-lane count at or below which a packet forks into single rays.
    ///
    /// `0` keeps packets together; `PACKET_WIDTH` traces every lane alone.
    pub switch_threshold: usize,
    /// Re-check the lane count after every descent step, not only on pops.
    pub switch_on_descent: bool,
    /// Reject triangles whose normal faces away from the ray direction.
    pub backface_culling: bool,
    /// Reject triangles whose layer mask does not overlap the ray's.
    pub ray_mask: bool,
}

impl Default for TraversalSettings {
    fn default() -> Self {
        Self {
            switch_threshold: 7,
            switch_on_descent: true,
            backface_culling: false,
            ray_mask: false,
        }
    }
}

impl TraversalSettings {
    /// Settings that never leave packet mode.
    pub fn packet_only() -> Self {
        Self {
            switch_threshold: 0,
            ..Self::default()
        }
    }

    /// Settings that trace every lane on its own.
    pub fn single_only() -> Self {
        Self {
            switch_threshold: PACKET_WIDTH,
            ..Self::default()
        }
    }

    /// Validate settings.
    pub fn validate(&self) -> Result<()> {
        if self.switch_threshold > PACKET_WIDTH {
            return Err(KernelError::InvalidSettings(format!(
                "switch threshold {} exceeds packet width {}",
                self.switch_threshold, PACKET_WIDTH
            )));
        }
        if self.switch_threshold == PACKET_WIDTH {
            warn!("switch threshold equals packet width, packets always trace single rays");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_valid() {
        let settings = TraversalSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.switch_threshold, 7);
        assert!(settings.switch_on_descent);
    }

    #[test]
    fn test_threshold_bounds() {
        assert!(TraversalSettings::packet_only().validate().is_ok());
        assert!(TraversalSettings::single_only().validate().is_ok());
        let settings = TraversalSettings {
            switch_threshold: PACKET_WIDTH + 1,
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(KernelError::InvalidSettings(_))
        ));
    }

    #[test]
    fn test_from_json_partial() {
        let settings: TraversalSettings =
            serde_json::from_str(r#"{ "switch_threshold": 3, "ray_mask": true }"#).unwrap();
        assert_eq!(settings.switch_threshold, 3);
        assert!(settings.ray_mask);
        assert!(settings.switch_on_descent);
        assert!(!settings.backface_culling);
    }
}
