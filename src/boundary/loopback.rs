//! In-process stand-in for the visual layer
//!
//! `LoopbackChannel` keeps just enough remote state to answer commands the
//! way the page would: which clusters exist, their option snapshot and which
//! layers they hold. It records every outbound call and can push inbound
//! notifications, which makes it the channel of choice for headless use and
//! tests.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::{
    boundary::{BoundaryChannel, InboundRouter, InboundTarget},
    cluster::events::ClusterEvent,
    core::{
        constants::{
            ADD_CLUSTER_COMMAND, NOTIFY_MOVE_METHOD, REMOVE_LAYER_COMMAND, SET_OPTIONS_COMMAND,
        },
        id::ClusterId,
    },
    prelude::{Duration, HashMap, Mutex, Weak},
    ClusterError, Result,
};

/// One outbound call as seen by the loopback
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub command: String,
    pub args: Vec<Value>,
}

#[derive(Debug, Default)]
struct RemoteCluster {
    map_id: Option<String>,
    options: Value,
    members: Vec<String>,
}

#[derive(Default)]
struct LoopbackState {
    clusters: HashMap<String, RemoteCluster>,
    calls: Vec<RecordedCall>,
}

pub struct LoopbackChannel {
    open: AtomicBool,
    latency: Option<Duration>,
    state: Mutex<LoopbackState>,
    router: InboundRouter,
}

impl LoopbackChannel {
    pub fn new() -> Self {
        Self {
            open: AtomicBool::new(true),
            latency: None,
            state: Mutex::new(LoopbackState::default()),
            router: InboundRouter::new(),
        }
    }

    /// Delay every answer by `latency` (only honoured with a Tokio runtime)
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Simulate the page going away; later calls fail with
    /// `BoundaryUnavailable`.
    pub fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    pub fn reopen(&self) {
        self.open.store(true, Ordering::SeqCst);
    }

    /// Create a remote cluster directly, as if it had been materialized
    pub fn seed_cluster<I, S>(&self, cluster_id: &ClusterId, members: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Ok(mut state) = self.state.lock() {
            state.clusters.insert(
                cluster_id.to_string(),
                RemoteCluster {
                    members: members.into_iter().map(Into::into).collect(),
                    ..RemoteCluster::default()
                },
            );
        }
    }

    /// Add a layer to an existing remote cluster. Returns false if the
    /// cluster is unknown.
    pub fn add_member(&self, cluster_id: &ClusterId, layer_id: impl Into<String>) -> bool {
        self.state
            .lock()
            .ok()
            .and_then(|mut state| {
                state
                    .clusters
                    .get_mut(cluster_id.as_str())
                    .map(|cluster| cluster.members.push(layer_id.into()))
            })
            .is_some()
    }

    /// Layer ids currently held by a remote cluster
    pub fn members(&self, cluster_id: &ClusterId) -> Option<Vec<String>> {
        self.state
            .lock()
            .ok()?
            .clusters
            .get(cluster_id.as_str())
            .map(|cluster| cluster.members.clone())
    }

    /// Option snapshot the remote cluster was created or re-synced with
    pub fn remote_options(&self, cluster_id: &ClusterId) -> Option<Value> {
        self.state
            .lock()
            .ok()?
            .clusters
            .get(cluster_id.as_str())
            .map(|cluster| cluster.options.clone())
    }

    /// Map the remote cluster was added to, if it was materialized
    pub fn map_of(&self, cluster_id: &ClusterId) -> Option<String> {
        self.state
            .lock()
            .ok()?
            .clusters
            .get(cluster_id.as_str())
            .and_then(|cluster| cluster.map_id.clone())
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state
            .lock()
            .map(|state| state.calls.clone())
            .unwrap_or_default()
    }

    pub fn calls_to(&self, command: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|call| call.command == command)
            .collect()
    }

    pub fn clear_calls(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.calls.clear();
        }
    }

    /// Push an inbound call to whichever proxy owns `target`
    pub fn emit(&self, target: &ClusterId, method: &str, payload: Value) -> Result<()> {
        self.router.dispatch(target, method, payload)
    }

    /// Simulate a user `move` interaction on the remote cluster
    pub fn emit_move(&self, target: &ClusterId, event: &ClusterEvent) -> Result<()> {
        self.emit(target, NOTIFY_MOVE_METHOD, serde_json::to_value(event)?)
    }

    pub fn router(&self) -> &InboundRouter {
        &self.router
    }

    fn apply(&self, command: &str, args: &[Value]) -> Result<Value> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| ClusterError::BoundaryUnavailable("loopback state poisoned".into()))?;

        match command {
            ADD_CLUSTER_COMMAND => {
                let map_id = arg_str(args, 0)?;
                let snapshot = args
                    .get(1)
                    .ok_or_else(|| ClusterError::RemoteRejected("missing cluster snapshot".into()))?;
                let cluster_id = snapshot
                    .get("id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ClusterError::RemoteRejected("snapshot without id".into()))?;
                if state.clusters.contains_key(cluster_id) {
                    return Err(ClusterError::RemoteRejected(format!(
                        "cluster {} already exists",
                        cluster_id
                    )));
                }
                let members = snapshot
                    .get("markers")
                    .and_then(Value::as_array)
                    .map(|markers| {
                        markers
                            .iter()
                            .filter_map(|m| m.get("id").and_then(Value::as_str))
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default();
                state.clusters.insert(
                    cluster_id.to_string(),
                    RemoteCluster {
                        map_id: Some(map_id.to_string()),
                        options: snapshot.get("options").cloned().unwrap_or(Value::Null),
                        members,
                    },
                );
                Ok(Value::Null)
            }
            REMOVE_LAYER_COMMAND => {
                let cluster_id = arg_str(args, 0)?;
                let layer_id = arg_str(args, 1)?;
                let cluster = state.clusters.get_mut(cluster_id).ok_or_else(|| {
                    ClusterError::RemoteRejected(format!("unknown cluster {}", cluster_id))
                })?;
                let position = cluster
                    .members
                    .iter()
                    .position(|member| member == layer_id)
                    .ok_or_else(|| {
                        ClusterError::RemoteRejected(format!(
                            "layer {} is not in cluster {}",
                            layer_id, cluster_id
                        ))
                    })?;
                cluster.members.remove(position);
                Ok(Value::Null)
            }
            SET_OPTIONS_COMMAND => {
                let cluster_id = arg_str(args, 0)?;
                let options = args.get(1).cloned().unwrap_or(Value::Null);
                let cluster = state.clusters.get_mut(cluster_id).ok_or_else(|| {
                    ClusterError::RemoteRejected(format!("unknown cluster {}", cluster_id))
                })?;
                cluster.options = options;
                Ok(Value::Null)
            }
            other => Err(ClusterError::RemoteRejected(format!(
                "unknown command {}",
                other
            ))),
        }
    }
}

impl Default for LoopbackChannel {
    fn default() -> Self {
        Self::new()
    }
}

fn arg_str(args: &[Value], index: usize) -> Result<&str> {
    args.get(index).and_then(Value::as_str).ok_or_else(|| {
        ClusterError::RemoteRejected(format!("argument {} must be a string", index))
    })
}

#[async_trait]
impl BoundaryChannel for LoopbackChannel {
    async fn invoke(&self, command: &str, args: Vec<Value>) -> Result<Value> {
        if !self.is_open() {
            return Err(ClusterError::BoundaryUnavailable(
                "loopback channel is closed".into(),
            ));
        }

        if let Ok(mut state) = self.state.lock() {
            state.calls.push(RecordedCall {
                command: command.to_string(),
                args: args.clone(),
            });
        }

        #[cfg(feature = "tokio-runtime")]
        {
            if let Some(latency) = self.latency {
                tokio::time::sleep(latency).await;
            }
        }

        self.apply(command, &args)
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn register_inbound(&self, id: &ClusterId, target: Weak<dyn InboundTarget>) {
        self.router.register(id, target);
    }

    fn unregister_inbound(&self, id: &ClusterId, target: &Weak<dyn InboundTarget>) {
        self.router.unregister_if(id, target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        futures::executor::block_on(future)
    }

    #[test]
    fn test_remove_member() {
        let channel = LoopbackChannel::new();
        let id = ClusterId::from_raw("c1");
        channel.seed_cluster(&id, ["a", "b"]);

        block_on(channel.invoke(REMOVE_LAYER_COMMAND, vec![json!("c1"), json!("a")])).unwrap();

        assert_eq!(channel.members(&id), Some(vec!["b".to_string()]));
        assert_eq!(channel.calls().len(), 1);
    }

    #[test]
    fn test_unknown_cluster_and_layer_rejected() {
        let channel = LoopbackChannel::new();
        channel.seed_cluster(&ClusterId::from_raw("c1"), ["a"]);

        let err =
            block_on(channel.invoke(REMOVE_LAYER_COMMAND, vec![json!("nope"), json!("a")]))
                .unwrap_err();
        assert!(matches!(err, ClusterError::RemoteRejected(_)));

        let err = block_on(channel.invoke(REMOVE_LAYER_COMMAND, vec![json!("c1"), json!("z")]))
            .unwrap_err();
        assert!(matches!(err, ClusterError::RemoteRejected(_)));
    }

    #[test]
    fn test_closed_channel_records_nothing() {
        let channel = LoopbackChannel::new();
        channel.close();

        let err = block_on(channel.invoke(REMOVE_LAYER_COMMAND, vec![])).unwrap_err();

        assert!(matches!(err, ClusterError::BoundaryUnavailable(_)));
        assert!(channel.calls().is_empty());

        channel.reopen();
        assert!(channel.is_open());
    }

    #[test]
    fn test_add_cluster_snapshot() {
        let channel = LoopbackChannel::new();
        let snapshot = json!({
            "id": "c9",
            "options": { "maxClusterRadius": 80 },
            "markers": [{ "id": "m1" }, { "id": "m2" }]
        });

        block_on(channel.invoke(ADD_CLUSTER_COMMAND, vec![json!("map"), snapshot.clone()]))
            .unwrap();
        let id = ClusterId::from_raw("c9");

        assert_eq!(
            channel.members(&id),
            Some(vec!["m1".to_string(), "m2".to_string()])
        );
        assert_eq!(channel.map_of(&id).as_deref(), Some("map"));
        assert_eq!(
            channel.remote_options(&id),
            Some(json!({ "maxClusterRadius": 80 }))
        );

        let again = block_on(channel.invoke(ADD_CLUSTER_COMMAND, vec![json!("map"), snapshot]));
        assert!(matches!(again, Err(ClusterError::RemoteRejected(_))));
    }

    #[test]
    fn test_unknown_command_rejected() {
        let channel = LoopbackChannel::new();
        let err = block_on(channel.invoke("flyTo", vec![])).unwrap_err();
        assert!(matches!(err, ClusterError::RemoteRejected(msg) if msg.contains("flyTo")));
        assert_eq!(channel.calls_to("flyTo").len(), 1);

        channel.clear_calls();
        assert!(channel.calls().is_empty());
    }

    #[test]
    fn test_add_member_requires_cluster() {
        let channel = LoopbackChannel::new();
        let id = ClusterId::from_raw("c2");
        assert!(!channel.add_member(&id, "x"));

        channel.seed_cluster(&id, Vec::<String>::new());
        assert!(channel.add_member(&id, "x"));
        assert_eq!(channel.members(&id), Some(vec!["x".to_string()]));
    }
}
