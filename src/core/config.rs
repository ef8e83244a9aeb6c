//! Configuration system for marker cluster behavior tuning
//!
//! This module provides the option snapshot that is handed to the visual
//! layer when a cluster is materialized, together with a small set of
//! presets for common workloads.
//!
//! Options mirror the Leaflet.markercluster option names and are serialized
//! in camelCase. Values are deliberately not range-checked: whatever the
//! owning process sets is what the visual layer receives.

use serde::{Deserialize, Serialize};

use crate::core::constants::{
    DEFAULT_CHUNK_DELAY, DEFAULT_CHUNK_INTERVAL, DEFAULT_MAX_CLUSTER_RADIUS,
    DEFAULT_SPIDERFY_DISTANCE_MULTIPLIER,
};
use crate::Result;

#[derive(Debug, Clone, PartialEq)]
pub enum ClusterProfile {
    Default,
    /// Bulk loading of many markers without freezing the page
    LargeDataset,
    /// Tighter clusters with wider spider legs
    Dense,
    Custom(MarkerClusterOptions),
}

impl ClusterProfile {
    pub fn resolve(&self) -> MarkerClusterOptions {
        match self {
            Self::Default => MarkerClusterOptions::default(),
            Self::LargeDataset => MarkerClusterOptions {
                chunked_loading: true,
                animate_adding_markers: false,
                remove_outside_visible_bounds: true,
                ..MarkerClusterOptions::default()
            },
            Self::Dense => MarkerClusterOptions {
                max_cluster_radius: 40,
                spiderfy_distance_multiplier: 2,
                ..MarkerClusterOptions::default()
            },
            Self::Custom(options) => options.clone(),
        }
    }
}

impl Default for ClusterProfile {
    fn default() -> Self {
        Self::Default
    }
}

/// Options consumed by the visual layer at materialization time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MarkerClusterOptions {
    /// Hovering a cluster shows the bounds of its markers.
    pub show_coverage_on_hover: bool,
    /// Clicking a cluster zooms to its bounds.
    pub zoom_to_bounds_on_click: bool,
    /// Clicking a cluster at the bottom zoom level spiderfies it.
    pub spiderfy_on_max_zoom: bool,
    /// Clusters and markers far from the viewport are dropped from the map.
    pub remove_outside_visible_bounds: bool,
    /// Split / merge cluster children with an animation.
    pub animate: bool,
    /// Animate individually added markers into their cluster.
    pub animate_adding_markers: bool,
    /// At this zoom level and below, markers are not clustered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disable_clustering_at_zoom: Option<i32>,
    /// Maximum radius a cluster covers from its central marker, in pixels.
    pub max_cluster_radius: i16,
    /// Render every marker as a cluster of size one.
    pub single_marker_mode: bool,
    pub spiderfy_distance_multiplier: i16,
    /// Split `addLayers` processing into small intervals.
    pub chunked_loading: bool,
    /// Work period in ms before `addLayers` yields.
    pub chunk_interval: i16,
    /// Pause in ms between two work periods.
    pub chunk_delay: i16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_progress: Option<i16>,
}

impl Default for MarkerClusterOptions {
    fn default() -> Self {
        Self {
            show_coverage_on_hover: true,
            zoom_to_bounds_on_click: true,
            spiderfy_on_max_zoom: true,
            remove_outside_visible_bounds: true,
            animate: true,
            animate_adding_markers: false,
            disable_clustering_at_zoom: None,
            max_cluster_radius: DEFAULT_MAX_CLUSTER_RADIUS,
            single_marker_mode: false,
            spiderfy_distance_multiplier: DEFAULT_SPIDERFY_DISTANCE_MULTIPLIER,
            chunked_loading: false,
            chunk_interval: DEFAULT_CHUNK_INTERVAL,
            chunk_delay: DEFAULT_CHUNK_DELAY,
            chunk_progress: None,
        }
    }
}

impl MarkerClusterOptions {
    pub fn from_profile(profile: &ClusterProfile) -> Self {
        profile.resolve()
    }

    /// Parse options from JSON; missing keys take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// The value passed across the boundary
    pub fn to_js_value(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn with_max_cluster_radius(mut self, radius: i16) -> Self {
        self.max_cluster_radius = radius;
        self
    }

    pub fn with_disable_clustering_at_zoom(mut self, zoom: Option<i32>) -> Self {
        self.disable_clustering_at_zoom = zoom;
        self
    }

    /// Enable chunked loading with the given interval and delay (ms)
    pub fn with_chunked_loading(mut self, interval: i16, delay: i16) -> Self {
        self.chunked_loading = true;
        self.chunk_interval = interval;
        self.chunk_delay = delay;
        self
    }

    pub fn with_animation(mut self, animate: bool, animate_adding_markers: bool) -> Self {
        self.animate = animate;
        self.animate_adding_markers = animate_adding_markers;
        self
    }

    pub fn with_single_marker_mode(mut self, enabled: bool) -> Self {
        self.single_marker_mode = enabled;
        self
    }
}
