pub mod builder;
pub mod events;
pub mod proxy;

// Re-export the essential types
pub use builder::MarkerClusterBuilder;
pub use events::{ClusterEvent, MoveHandler, SubscriptionId};
pub use proxy::MarkerCluster;
