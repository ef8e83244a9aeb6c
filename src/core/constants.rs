//! Core constants derived from Leaflet.markercluster defaults and the names
//! used on the JavaScript side of the boundary.
//! Keeping them in a single place makes it easier to track the JS bundle.

/// Maximum radius (pixels) a cluster covers from its central marker.
pub const DEFAULT_MAX_CLUSTER_RADIUS: i16 = 80;

/// Distance multiplier applied to spiderfied markers.
pub const DEFAULT_SPIDERFY_DISTANCE_MULTIPLIER: i16 = 1;

/// Time (ms) `addLayers` works before yielding when chunked loading is on.
pub const DEFAULT_CHUNK_INTERVAL: i16 = 200;

/// Delay (ms) between two chunked-loading work periods.
pub const DEFAULT_CHUNK_DELAY: i16 = 50;

/// Prefix for process-generated cluster ids.
pub const CLUSTER_ID_PREFIX: &str = "marker-cluster";

/// Global JS object holding the interop functions.
pub const DEFAULT_JS_NAMESPACE: &str = "leafletBlazor";

/// Outbound: create the cluster layer on a map. Args: `[mapId, snapshot]`.
pub const ADD_CLUSTER_COMMAND: &str = "addMarkerClusterLayer";

/// Outbound: remove a layer from a cluster. Args: `[clusterId, layerId]`.
pub const REMOVE_LAYER_COMMAND: &str = "removeToClusterLayer";

/// Outbound: replace the option snapshot. Args: `[clusterId, options]`.
pub const SET_OPTIONS_COMMAND: &str = "setMarkerClusterOptions";

/// Inbound: the cluster received a `move` interaction.
pub const NOTIFY_MOVE_METHOD: &str = "NotifyMove";
