use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerType {
    Marker,
    Cluster,
}

impl std::fmt::Display for LayerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LayerType::Marker => write!(f, "marker"),
            LayerType::Cluster => write!(f, "cluster"),
        }
    }
}

/// Trait for layer-like objects that can be handed to the visual layer
///
/// Layers are opaque to this crate apart from their id, which is how the
/// visual side addresses them.
pub trait LayerTrait: Send + Sync {
    /// Get layer ID
    fn id(&self) -> &str;

    /// Get layer type
    fn layer_type(&self) -> LayerType;

    /// Options passed across the boundary when the layer is materialized
    fn options(&self) -> serde_json::Value;

    /// Dynamic casting support
    fn as_any(&self) -> &dyn std::any::Any;
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayerProperties {
    pub id: String,
    pub layer_type: LayerType,
}

impl LayerProperties {
    pub fn new(id: String, layer_type: LayerType) -> Self {
        Self { id, layer_type }
    }
}
