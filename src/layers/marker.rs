use serde::Serialize;

use crate::{
    core::geo::LatLng,
    layers::base::{LayerProperties, LayerTrait, LayerType},
};

/// A point marker that can be grouped by a cluster
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    properties: LayerProperties,
    position: LatLng,
    title: Option<String>,
    popup_text: Option<String>,
    draggable: bool,
}

/// Wire shape of a marker inside a cluster snapshot
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MarkerSnapshot<'a> {
    id: &'a str,
    lat_lng: LatLng,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    popup: Option<&'a str>,
    draggable: bool,
}

impl Marker {
    pub fn new(id: impl Into<String>, position: LatLng) -> Self {
        let properties = LayerProperties::new(id.into(), LayerType::Marker);
        Self {
            properties,
            position,
            title: None,
            popup_text: None,
            draggable: false,
        }
    }

    pub fn with_popup(mut self, text: impl Into<String>) -> Self {
        self.popup_text = Some(text.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn draggable(mut self, draggable: bool) -> Self {
        self.draggable = draggable;
        self
    }

    pub fn position(&self) -> LatLng {
        self.position
    }

    pub fn set_position(&mut self, position: LatLng) {
        self.position = position;
    }

    fn snapshot(&self) -> MarkerSnapshot<'_> {
        MarkerSnapshot {
            id: &self.properties.id,
            lat_lng: self.position,
            title: self.title.as_deref(),
            popup: self.popup_text.as_deref(),
            draggable: self.draggable,
        }
    }
}

impl LayerTrait for Marker {
    crate::impl_layer_trait!(properties);

    fn options(&self) -> serde_json::Value {
        serde_json::to_value(self.snapshot()).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_marker_identity() {
        let marker = Marker::new("m1", LatLng::new(48.85, 2.35));

        assert_eq!(marker.id(), "m1");
        assert_eq!(marker.layer_type(), LayerType::Marker);
        assert_eq!(marker.position(), LatLng::new(48.85, 2.35));
        assert!(marker.as_any().downcast_ref::<Marker>().is_some());
    }

    #[test]
    fn test_marker_options() {
        let marker = Marker::new("m2", LatLng::new(1.0, 2.0))
            .with_title("Depot")
            .with_popup("Open 9-5");

        assert_eq!(
            marker.options(),
            json!({
                "id": "m2",
                "latLng": { "lat": 1.0, "lng": 2.0 },
                "title": "Depot",
                "popup": "Open 9-5",
                "draggable": false
            })
        );
    }

    #[test]
    fn test_marker_options_omit_unset_text() {
        let mut marker = Marker::new("m3", LatLng::default()).draggable(true);
        marker.set_position(LatLng::new(3.0, 4.0));
        let options = marker.options();

        assert!(options.get("title").is_none());
        assert!(options.get("popup").is_none());
        assert_eq!(options["draggable"], json!(true));
        assert_eq!(options["latLng"]["lat"], json!(3.0));
    }
}
