//! # markercluster
//!
//! A Rust-side proxy for a marker clustering layer that lives in a browser
//! mapping library (Leaflet.markercluster and friends).
//!
//! The crate owns the cluster's configuration, forwards commands such as
//! "remove this layer from the cluster" across a [`BoundaryChannel`], and fans
//! inbound interaction events (currently `move`) out to local subscribers.
//! Clustering, spiderfying and rendering all stay on the visual side.

pub mod boundary;
pub mod cluster;
pub mod core;
pub mod layers;
pub mod prelude;
#[cfg(feature = "tokio-runtime")]
pub mod runtime;
pub mod traits;
pub use crate::core::constants;

// Re-export public API
pub use crate::core::{
    config::{ClusterProfile, MarkerClusterOptions},
    geo::LatLng,
    id::ClusterId,
};

pub use crate::layers::{base::LayerTrait, marker::Marker};

pub use crate::boundary::{loopback::LoopbackChannel, BoundaryChannel, InboundRouter, InboundTarget};

#[cfg(feature = "tokio-runtime")]
pub use crate::boundary::wire::WireChannel;

pub use crate::cluster::{
    builder::MarkerClusterBuilder,
    events::{ClusterEvent, MoveHandler, SubscriptionId},
    proxy::MarkerCluster,
};

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, ClusterError>;

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Boundary unavailable: {0}")]
    BoundaryUnavailable(String),

    #[error("Remote rejected: {0}")]
    RemoteRejected(String),

    #[error("Boundary call timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("No live cluster registered under id {0}")]
    UnknownTarget(String),

    #[error("Unknown inbound method: {0}")]
    UnknownMethod(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClusterError {
    /// True for failures caused by the transport rather than the remote layer.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::BoundaryUnavailable(_) | Self::Timeout(_))
    }
}

/// Install `env_logger` as the `log` backend.
///
/// Safe to call more than once; later calls are ignored.
#[cfg(feature = "debug")]
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}
