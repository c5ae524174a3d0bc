//! Gallery configuration and tunables

use serde::{Deserialize, Serialize};

use crate::ModelSpec;

/// Touch gesture tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    /// Degrees of rotation per pixel of single-finger drag
    pub rotation_speed: f32,
    /// Also rotate around X from vertical drag
    pub dual_axis_rotation: bool,
    /// Multiplier applied to the pinch ratio delta
    pub scale_speed: f32,
    /// Multiplier applied to the two-finger twist angle delta
    pub twist_speed: f32,
    /// Lower scale bound, relative to the scale at attach time
    pub min_scale_factor: f32,
    /// Upper scale bound, relative to the scale at attach time
    pub max_scale_factor: f32,
    /// Element markers whose descendants never start a gesture
    pub ui_markers: Vec<String>,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            rotation_speed: 0.5,
            dual_axis_rotation: false,
            scale_speed: 1.0,
            twist_speed: 1.0,
            min_scale_factor: 0.1,
            max_scale_factor: 10.0,
            ui_markers: vec![
                "ui-element".to_string(),
                "button".to_string(),
                "modal".to_string(),
                "overlay".to_string(),
            ],
        }
    }
}

/// Hit-test tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HitTestConfig {
    /// Results below this confidence are treated as absent
    pub confidence_threshold: f32,
    /// Minimum interval between surface-detection log lines
    pub surface_log_interval_ms: u64,
}

impl Default for HitTestConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.0,
            surface_log_interval_ms: 2000,
        }
    }
}

/// Placement tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    /// Taps this soon after placement is (re-)enabled are dropped
    pub suppress_ms: u64,
    /// Clamp for the computed floor offset, in meters
    pub max_floor_offset: f32,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            suppress_ms: 300,
            max_floor_offset: 5.0,
        }
    }
}

/// Network timeouts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub config_timeout_ms: u64,
    /// Wait for the asset response headers; the body stream is unbounded
    pub asset_response_timeout_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            config_timeout_ms: 3000,
            asset_response_timeout_ms: 10_000,
        }
    }
}

/// Full configuration snapshot, consumed once at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ArConfig {
    pub models: Vec<ModelSpec>,
    pub gestures: GestureConfig,
    pub hit_test: HitTestConfig,
    pub placement: PlacementConfig,
    pub network: NetworkConfig,
}

impl ArConfig {
    pub fn with_models(models: Vec<ModelSpec>) -> Self {
        Self {
            models,
            ..Self::default()
        }
    }

    /// Look up a model by id
    pub fn model(&self, id: &str) -> Option<&ModelSpec> {
        self.models.iter().find(|m| m.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let json = r#"{"gestures": {"scale_speed": 2.0}, "placement": {"suppress_ms": 500}}"#;
        let cfg: ArConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.gestures.scale_speed, 2.0);
        assert_eq!(cfg.gestures.max_scale_factor, 10.0);
        assert_eq!(cfg.placement.suppress_ms, 500);
        assert_eq!(cfg.placement.max_floor_offset, 5.0);
        assert_eq!(cfg.hit_test.surface_log_interval_ms, 2000);
        assert!(cfg.models.is_empty());
    }

    #[test]
    fn test_model_lookup() {
        let cfg = ArConfig::with_models(vec![
            ModelSpec::new("house1", "House", "h1.glb"),
            ModelSpec::new("house2", "Villa", "h2.glb"),
        ]);
        assert_eq!(cfg.model("house2").map(|m| m.name.as_str()), Some("Villa"));
        assert!(cfg.model("missing").is_none());
    }

    #[test]
    fn test_default_ui_markers() {
        let cfg = GestureConfig::default();
        assert!(cfg.ui_markers.iter().any(|m| m == "button"));
    }
}
