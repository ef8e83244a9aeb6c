//! Prelude module for common markercluster types and traits
//!
//! This module re-exports the most commonly used types, traits, and functions
//! for easy importing with `use markercluster::prelude::*;`

pub use crate::core::{
    config::{ClusterProfile, MarkerClusterOptions},
    geo::LatLng,
    id::ClusterId,
};

pub use crate::layers::{base::LayerTrait, marker::Marker};

pub use crate::boundary::{
    loopback::{LoopbackChannel, RecordedCall},
    BoundaryChannel, InboundRouter, InboundTarget,
};

#[cfg(feature = "tokio-runtime")]
pub use crate::boundary::wire::{WireChannel, WireMessage};

pub use crate::cluster::{
    builder::MarkerClusterBuilder,
    events::{ClusterEvent, MoveHandler, SubscriptionId},
    proxy::MarkerCluster,
};

#[cfg(feature = "tokio-runtime")]
pub use crate::runtime::{runtime, spawn, AsyncHandle, AsyncSpawner};

pub use crate::traits::Configurable;

pub use crate::{ClusterError, Result};

pub use std::{
    pin::Pin,
    sync::{Arc, Mutex, RwLock, Weak},
    time::Duration,
};

pub use fxhash::{FxHashMap as HashMap, FxHashSet as HashSet};

pub use futures::Future;
