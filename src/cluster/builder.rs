//! Cluster builder for fluent API configuration
//!
//! `MarkerClusterBuilder` collects the channel, id, options and initial
//! markers of a cluster and validates them in `build`.

use crate::{
    boundary::BoundaryChannel,
    cluster::proxy::MarkerCluster,
    core::{
        config::{ClusterProfile, MarkerClusterOptions},
        id::ClusterId,
    },
    layers::marker::Marker,
    prelude::Arc,
    ClusterError, Result,
};

/// Builder for creating and configuring MarkerCluster instances
#[derive(Default)]
pub struct MarkerClusterBuilder {
    /// Channel to the visual layer; required
    channel: Option<Arc<dyn BoundaryChannel>>,
    /// Explicit id; generated when absent
    id: Option<ClusterId>,
    profile: ClusterProfile,
    /// Edits applied on top of the resolved profile
    overrides: Vec<Box<dyn FnOnce(&mut MarkerClusterOptions) + Send>>,
    markers: Vec<Marker>,
}

impl MarkerClusterBuilder {
    /// Create a new MarkerClusterBuilder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the channel used to reach the visual layer
    pub fn channel(mut self, channel: Arc<dyn BoundaryChannel>) -> Self {
        self.channel = Some(channel);
        self
    }

    /// Set or clear the channel
    pub fn channel_opt(mut self, channel: Option<Arc<dyn BoundaryChannel>>) -> Self {
        self.channel = channel;
        self
    }

    /// Use a caller-chosen id instead of a generated one. The caller is
    /// responsible for keeping it unique among live clusters.
    pub fn with_id(mut self, id: impl Into<ClusterId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Start from a preset
    pub fn with_profile(mut self, profile: ClusterProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Set custom options
    pub fn with_options(mut self, options: MarkerClusterOptions) -> Self {
        self.profile = ClusterProfile::Custom(options);
        self
    }

    /// Tweak individual options after the profile is resolved
    pub fn configure<F>(mut self, edit: F) -> Self
    where
        F: FnOnce(&mut MarkerClusterOptions) + Send + 'static,
    {
        self.overrides.push(Box::new(edit));
        self
    }

    pub fn with_marker(mut self, marker: Marker) -> Self {
        self.markers.push(marker);
        self
    }

    pub fn with_markers(mut self, markers: impl IntoIterator<Item = Marker>) -> Self {
        self.markers.extend(markers);
        self
    }

    /// Build the cluster and register it for inbound calls.
    ///
    /// Fails with `InvalidArgument` when no channel was supplied.
    pub fn build(self) -> Result<Arc<MarkerCluster>> {
        let channel = self.channel.ok_or_else(|| {
            ClusterError::InvalidArgument("a boundary channel is required".into())
        })?;

        let id = match self.id {
            Some(id) if id.as_str().is_empty() => {
                return Err(ClusterError::InvalidArgument(
                    "cluster id must not be empty".into(),
                ))
            }
            Some(id) => id,
            None => ClusterId::generate(),
        };

        let mut options = self.profile.resolve();
        for edit in self.overrides {
            edit(&mut options);
        }

        Ok(MarkerCluster::from_parts(id, channel, options, self.markers))
    }
}
