//! Where a view looks: center, radius and rotation.

use serde::{Deserialize, Serialize};

/// A navigable position on the complex plane.
///
/// `radius` is the half-extent of the larger view dimension; the other
/// dimension scales down proportionally to preserve aspect ratio.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViewPosition {
    pub center_x: f64,
    pub center_y: f64,
    pub radius: f64,
    /// Rotation in degrees, counter-clockwise.
    pub angle: f64,
}

impl ViewPosition {
    pub fn new(center_x: f64, center_y: f64, radius: f64) -> Self {
        Self {
            center_x,
            center_y,
            radius,
            angle: 0.0,
        }
    }

    pub fn with_angle(center_x: f64, center_y: f64, radius: f64, angle: f64) -> Self {
        Self {
            center_x,
            center_y,
            radius,
            angle,
        }
    }
}

impl Default for ViewPosition {
    fn default() -> Self {
        Self::new(0.0, 0.0, 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_origin_radius_two() {
        let pos = ViewPosition::default();
        assert_eq!(pos.center_x, 0.0);
        assert_eq!(pos.radius, 2.0);
        assert_eq!(pos.angle, 0.0);
    }

    #[test]
    fn serialize_roundtrip() {
        let pos = ViewPosition::with_angle(-0.5, 0.25, 1e-12, 45.0);
        let json = serde_json::to_string(&pos).unwrap();
        let restored: ViewPosition = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, pos);
    }
}
