use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{cluster::proxy::MarkerCluster, core::geo::LatLng, prelude::Arc};

/// Inbound interaction event raised by the visual layer
///
/// The payload is opaque to the proxy: whatever the page sends is handed to
/// subscribers unchanged, including a missing or non-string `type`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterEvent {
    payload: Value,
}

impl ClusterEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert("type".to_string(), Value::String(event_type.into()));
        Self {
            payload: Value::Object(fields),
        }
    }

    pub fn from_payload(payload: Value) -> Self {
        Self { payload }
    }

    /// Add a field. Ignored when the payload is not a JSON object.
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        if let Value::Object(fields) = &mut self.payload {
            fields.insert(key.into(), value);
        }
        self
    }

    /// The `type` field, when the page sent it as a string
    pub fn event_type(&self) -> Option<&str> {
        self.get("type").and_then(Value::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn into_payload(self) -> Value {
        self.payload
    }

    /// New position carried by Leaflet `move` events, if present
    pub fn lat_lng(&self) -> Option<LatLng> {
        self.get("latlng")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Previous position carried by Leaflet `move` events, if present
    pub fn old_lat_lng(&self) -> Option<LatLng> {
        self.get("oldLatLng")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// Callback invoked for every `move` notification
///
/// Receives the cluster that raised the event as sender. Errors are logged
/// by the cluster and never stop delivery to the remaining subscribers.
pub type MoveHandler =
    Arc<dyn Fn(&MarkerCluster, &ClusterEvent) -> anyhow::Result<()> + Send + Sync>;

/// Token returned by `MarkerCluster::on_move`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub(crate) u64);

impl SubscriptionId {
    pub fn value(&self) -> u64 {
        self.0
    }
}
