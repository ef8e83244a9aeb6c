pub mod config;
pub mod constants;
pub mod geo;
pub mod id;

pub use config::{ClusterProfile, MarkerClusterOptions};
pub use geo::LatLng;
pub use id::ClusterId;
