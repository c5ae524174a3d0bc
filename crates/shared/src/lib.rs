//! Data model shared between the placement core and the model server.

use serde::{Deserialize, Serialize};

pub mod config;

pub use config::{ArConfig, GestureConfig, HitTestConfig, NetworkConfig, PlacementConfig};

/// Unique identifier of a model in the gallery
pub type ModelId = String;

/// A named sub-node of a model that can be shown or hidden independently
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    /// Node name inside the parsed asset
    pub name: String,
    /// Label shown in the layer list (derived from `name` when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Static descriptor of a gallery model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub id: ModelId,
    /// Display name in the gallery
    pub name: String,
    /// Asset URL (glTF / GLB)
    pub url: String,
    /// Uniform scale used when the asset has degenerate bounds
    #[serde(default = "default_scale")]
    pub default_scale: f32,
    /// Largest real-world dimension of the placed model, in meters
    #[serde(default = "default_target_size")]
    pub target_size_meters: f32,
    /// Explicit layers; empty means auto-discovery
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub layers: Vec<LayerSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

fn default_scale() -> f32 {
    1.0
}

fn default_target_size() -> f32 {
    0.5
}

impl ModelSpec {
    pub fn new(id: impl Into<String>, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            url: url.into(),
            default_scale: default_scale(),
            target_size_meters: default_target_size(),
            layers: Vec::new(),
            thumbnail: None,
        }
    }

    pub fn with_target_size(mut self, meters: f32) -> Self {
        self.target_size_meters = meters;
        self
    }

    pub fn with_layers(mut self, layers: Vec<LayerSpec>) -> Self {
        self.layers = layers;
        self
    }
}

/// Position / rotation / scale as plain arrays, for JSON surfaces
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformData {
    pub position: [f32; 3],
    /// Euler angles in degrees
    pub rotation: [f32; 3],
    pub scale: [f32; 3],
}

impl Default for TransformData {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 0.0],
            rotation: [0.0, 0.0, 0.0],
            scale: [1.0, 1.0, 1.0],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_spec_defaults_from_json() {
        let json = r#"{"id": "house1", "name": "House", "url": "models/house1.glb"}"#;
        let spec: ModelSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.id, "house1");
        assert_eq!(spec.default_scale, 1.0);
        assert_eq!(spec.target_size_meters, 0.5);
        assert!(spec.layers.is_empty());
        assert!(spec.thumbnail.is_none());
    }

    #[test]
    fn test_model_spec_with_layers() {
        let json = r#"{
            "id": "house2",
            "name": "Two Floors",
            "url": "models/house2.glb",
            "target_size_meters": 0.8,
            "layers": [{"name": "roof"}, {"name": "floor_1", "label": "Ground floor"}]
        }"#;
        let spec: ModelSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.target_size_meters, 0.8);
        assert_eq!(spec.layers.len(), 2);
        assert_eq!(spec.layers[1].label.as_deref(), Some("Ground floor"));
    }

    #[test]
    fn test_empty_layers_not_serialized() {
        let spec = ModelSpec::new("a", "A", "a.glb");
        let json = serde_json::to_string(&spec).unwrap();
        assert!(!json.contains("layers"));
    }

    #[test]
    fn test_transform_default_is_identity_scale() {
        let t = TransformData::default();
        assert_eq!(t.scale, [1.0, 1.0, 1.0]);
        assert_eq!(t.position, [0.0; 3]);
    }
}
