use serde_json::{json, Value};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::PoisonError;

use crate::{
    boundary::{BoundaryChannel, InboundTarget},
    cluster::{
        builder::MarkerClusterBuilder,
        events::{ClusterEvent, MoveHandler, SubscriptionId},
    },
    core::{
        config::MarkerClusterOptions,
        constants::{
            ADD_CLUSTER_COMMAND, NOTIFY_MOVE_METHOD, REMOVE_LAYER_COMMAND, SET_OPTIONS_COMMAND,
        },
        id::ClusterId,
    },
    layers::{
        base::{LayerTrait, LayerType},
        marker::Marker,
    },
    prelude::{Arc, Mutex, RwLock, Weak},
    traits::Configurable,
    ClusterError, Result,
};

#[cfg(feature = "tokio-runtime")]
use crate::prelude::Duration;

/// Proxy for a marker cluster that lives on the visual layer
///
/// Holds the option snapshot, forwards commands through its
/// [`BoundaryChannel`] and fans inbound `move` notifications out to local
/// subscribers. Membership of the remote cluster is not tracked here.
pub struct MarkerCluster {
    id: ClusterId,
    channel: Arc<dyn BoundaryChannel>,
    options: RwLock<MarkerClusterOptions>,
    markers: RwLock<Vec<Marker>>,
    materialized: AtomicBool,
    move_handlers: Mutex<Vec<(SubscriptionId, MoveHandler)>>,
    next_subscription: AtomicU64,
    /// The route registered with the channel, removed again on drop
    inbound: Weak<dyn InboundTarget>,
}

impl MarkerCluster {
    /// Create a cluster with default options and a fresh id
    pub fn new(channel: Arc<dyn BoundaryChannel>) -> Arc<Self> {
        Self::from_parts(
            ClusterId::generate(),
            channel,
            MarkerClusterOptions::default(),
            Vec::new(),
        )
    }

    pub fn builder() -> MarkerClusterBuilder {
        MarkerClusterBuilder::new()
    }

    pub(crate) fn from_parts(
        id: ClusterId,
        channel: Arc<dyn BoundaryChannel>,
        options: MarkerClusterOptions,
        markers: Vec<Marker>,
    ) -> Arc<Self> {
        let cluster = Arc::new_cyclic(|this: &Weak<Self>| {
            let inbound: Weak<dyn InboundTarget> = this.clone();
            Self {
                id,
                channel,
                options: RwLock::new(options),
                markers: RwLock::new(markers),
                materialized: AtomicBool::new(false),
                move_handlers: Mutex::new(Vec::new()),
                next_subscription: AtomicU64::new(1),
                inbound,
            }
        });

        cluster
            .channel
            .register_inbound(&cluster.id, cluster.inbound.clone());
        log::debug!("Created cluster {}", cluster.id);

        cluster
    }

    pub fn id(&self) -> &ClusterId {
        &self.id
    }

    pub fn channel(&self) -> &Arc<dyn BoundaryChannel> {
        &self.channel
    }

    /// Snapshot of the current options
    pub fn options(&self) -> MarkerClusterOptions {
        self.options
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the option snapshot.
    ///
    /// After materialization the visual layer keeps its old copy until
    /// [`resync_options`](Self::resync_options) is called.
    pub fn set_options(&self, options: MarkerClusterOptions) {
        *self.options.write().unwrap_or_else(PoisonError::into_inner) = options;
        self.warn_if_stale();
    }

    pub fn update_options<F>(&self, updater: F)
    where
        F: FnOnce(&mut MarkerClusterOptions),
    {
        let mut current = self.options.write().unwrap_or_else(PoisonError::into_inner);
        updater(&mut current);
        drop(current);
        self.warn_if_stale();
    }

    pub fn markers(&self) -> Vec<Marker> {
        self.markers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Queue a marker to be sent along with the cluster when it is
    /// materialized
    pub fn add_marker(&self, marker: Marker) {
        self.markers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(marker);
        if self.is_materialized() {
            log::warn!(
                "Marker added to cluster {} after materialization is not sent to the visual layer",
                self.id
            );
        }
    }

    pub fn is_materialized(&self) -> bool {
        self.materialized.load(Ordering::SeqCst)
    }

    /// Create the cluster on the visual layer, attached to `map_id`.
    ///
    /// The full option snapshot and the queued markers are sent in one call.
    pub async fn materialize(&self, map_id: &str) -> Result<()> {
        if map_id.is_empty() {
            return Err(ClusterError::InvalidArgument("map id must not be empty".into()));
        }
        if self.is_materialized() {
            return Err(ClusterError::InvalidArgument(format!(
                "cluster {} is already materialized",
                self.id
            )));
        }

        let snapshot = self.snapshot()?;
        log::debug!("Materializing cluster {} on map {}", self.id, map_id);
        self.channel
            .invoke(ADD_CLUSTER_COMMAND, vec![json!(map_id), snapshot])
            .await?;
        self.materialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Push the full option snapshot to the visual layer again
    pub async fn resync_options(&self) -> Result<()> {
        let options = self.options().to_js_value()?;
        log::debug!("Re-syncing options of cluster {}", self.id);
        self.channel
            .invoke(SET_OPTIONS_COMMAND, vec![json!(self.id), options])
            .await?;
        Ok(())
    }

    /// Remove a previously added layer from this cluster.
    ///
    /// Completes once the visual layer acknowledges the command. Failures
    /// are returned as-is and never retried.
    pub async fn remove_layer(&self, layer_id: &str) -> Result<()> {
        if layer_id.is_empty() {
            return Err(ClusterError::InvalidArgument("layer id must not be empty".into()));
        }

        log::debug!("Removing layer {} from cluster {}", layer_id, self.id);
        let result = self
            .channel
            .invoke(REMOVE_LAYER_COMMAND, vec![json!(self.id), json!(layer_id)])
            .await;
        if let Err(e) = &result {
            log::debug!("Remove of layer {} from cluster {} failed: {}", layer_id, self.id, e);
        }
        result.map(|_| ())
    }

    pub async fn remove_marker(&self, marker: &Marker) -> Result<()> {
        self.remove_layer(marker.id()).await
    }

    /// Like [`remove_layer`](Self::remove_layer) but gives up after `timeout`.
    ///
    /// On timeout the local wait is abandoned; the visual layer may still
    /// apply the command later.
    #[cfg(feature = "tokio-runtime")]
    pub async fn remove_layer_with_timeout(&self, layer_id: &str, timeout: Duration) -> Result<()> {
        tokio::time::timeout(timeout, self.remove_layer(layer_id))
            .await
            .map_err(|_| ClusterError::Timeout(timeout))?
    }

    /// Subscribe to `move` notifications
    pub fn on_move<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&MarkerCluster, &ClusterEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.add_move_handler(Arc::new(handler))
    }

    /// Subscribe a shared handler. The same handler may be added more than
    /// once and is then invoked once per registration.
    pub fn add_move_handler(&self, handler: MoveHandler) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.handlers().push((id, handler));
        id
    }

    /// Remove the subscription `id`. Returns false if it was not present.
    pub fn off_move(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers();
        match handlers.iter().position(|(sub, _)| *sub == id) {
            Some(index) => {
                handlers.remove(index);
                true
            }
            None => false,
        }
    }

    /// Remove the most recent registration of `handler`
    pub fn remove_move_handler(&self, handler: &MoveHandler) -> bool {
        let mut handlers = self.handlers();
        let target = Arc::as_ptr(handler) as *const u8;
        match handlers
            .iter()
            .rposition(|(_, h)| Arc::as_ptr(h) as *const u8 == target)
        {
            Some(index) => {
                handlers.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn move_subscriber_count(&self) -> usize {
        self.handlers().len()
    }

    /// Deliver a `move` event to every current subscriber, in registration
    /// order.
    ///
    /// Never blocks on the boundary. A handler that returns an error or
    /// panics is logged and skipped; the rest still receive the event.
    pub fn notify_move(&self, event: &ClusterEvent) {
        let handlers: Vec<MoveHandler> =
            self.handlers().iter().map(|(_, h)| h.clone()).collect();

        for handler in handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(self, event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    log::warn!("Move handler on cluster {} failed: {:#}", self.id, e);
                }
                Err(_) => {
                    log::warn!("Move handler on cluster {} panicked", self.id);
                }
            }
        }
    }

    fn snapshot(&self) -> Result<Value> {
        let markers: Vec<Value> = self
            .markers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(LayerTrait::options)
            .collect();

        Ok(json!({
            "id": self.id,
            "options": self.options().to_js_value()?,
            "markers": markers,
        }))
    }

    fn handlers(&self) -> std::sync::MutexGuard<'_, Vec<(SubscriptionId, MoveHandler)>> {
        self.move_handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn warn_if_stale(&self) {
        if self.is_materialized() {
            log::warn!(
                "Cluster {} options changed after materialization; call resync_options to push them",
                self.id
            );
        }
    }
}

impl InboundTarget for MarkerCluster {
    fn handle_inbound(&self, method: &str, payload: Value) -> Result<()> {
        match method {
            NOTIFY_MOVE_METHOD => {
                self.notify_move(&ClusterEvent::from_payload(payload));
                Ok(())
            }
            other => Err(ClusterError::UnknownMethod(other.to_string())),
        }
    }
}

impl Configurable for MarkerCluster {
    type Config = MarkerClusterOptions;

    fn config(&self) -> Self::Config {
        self.options()
    }

    fn set_config(&self, config: Self::Config) -> Result<()> {
        self.set_options(config);
        Ok(())
    }
}

impl std::fmt::Debug for MarkerCluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarkerCluster")
            .field("id", &self.id)
            .field("materialized", &self.is_materialized())
            .field("move_subscribers", &self.move_subscriber_count())
            .finish()
    }
}

/// A cluster is itself a layer on the map, addressed by its cluster id
impl LayerTrait for MarkerCluster {
    fn id(&self) -> &str {
        self.id.as_str()
    }

    fn layer_type(&self) -> LayerType {
        LayerType::Cluster
    }

    fn options(&self) -> Value {
        MarkerCluster::options(self)
            .to_js_value()
            .unwrap_or(Value::Null)
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

impl Drop for MarkerCluster {
    fn drop(&mut self) {
        self.channel.unregister_inbound(&self.id, &self.inbound);
    }
}
