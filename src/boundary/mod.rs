//! Boundary abstraction between the proxy and the visual layer
//!
//! A [`BoundaryChannel`] carries outbound commands to the page (or whatever
//! hosts the clustering library) and routes inbound notifications back to the
//! proxy instance they belong to. Concrete transports live in the submodules:
//! an in-process loopback, a JSON-lines wire protocol and a wasm binding.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::{PoisonError, RwLockReadGuard, RwLockWriteGuard};

use crate::{
    core::id::ClusterId,
    prelude::{HashMap, RwLock, Weak},
    ClusterError, Result,
};

pub mod loopback;

#[cfg(feature = "tokio-runtime")]
pub mod wire;

#[cfg(feature = "wasm")]
pub mod wasm;

/// Mechanism used to call into the external visual layer
#[async_trait]
pub trait BoundaryChannel: Send + Sync {
    /// Issue `command` with positional `args` and wait for the remote side
    /// to acknowledge it.
    ///
    /// Fails with [`ClusterError::BoundaryUnavailable`] when the channel is
    /// closed and [`ClusterError::RemoteRejected`] when the remote side
    /// refuses the command.
    async fn invoke(&self, command: &str, args: Vec<Value>) -> Result<Value>;

    /// Whether calls can currently reach the remote side
    fn is_open(&self) -> bool;

    /// Route inbound calls addressed to `id` to `target`
    fn register_inbound(&self, id: &ClusterId, target: Weak<dyn InboundTarget>);

    /// Drop the route for `id`, but only while it still points at `target`
    fn unregister_inbound(&self, id: &ClusterId, target: &Weak<dyn InboundTarget>);
}

/// Receiver of inbound calls coming from the visual layer
pub trait InboundTarget: Send + Sync {
    /// Handle `method` with its JSON `payload`. Must not block.
    fn handle_inbound(&self, method: &str, payload: Value) -> Result<()>;
}

/// Registry of inbound targets keyed by cluster id
///
/// Targets are held weakly; an entry whose target has been dropped is pruned
/// the next time something is routed to it.
#[derive(Default)]
pub struct InboundRouter {
    targets: RwLock<HashMap<ClusterId, Weak<dyn InboundTarget>>>,
}

impl InboundRouter {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<ClusterId, Weak<dyn InboundTarget>>> {
        self.targets.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<ClusterId, Weak<dyn InboundTarget>>> {
        self.targets.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self, id: &ClusterId, target: Weak<dyn InboundTarget>) {
        let replaced = self.write().insert(id.clone(), target);
        if replaced.is_some_and(|old| old.strong_count() > 0) {
            log::warn!("Cluster id {} re-registered while still live", id);
        }
    }

    /// Remove the entry for `id` only if it is still `target`. A newer
    /// registration under the same id is left alone.
    pub fn unregister_if(&self, id: &ClusterId, target: &Weak<dyn InboundTarget>) -> bool {
        let mut targets = self.write();
        if targets.get(id).is_some_and(|current| Weak::ptr_eq(current, target)) {
            targets.remove(id);
            true
        } else {
            false
        }
    }

    /// Deliver one inbound call to the live target registered under `id`
    pub fn dispatch(&self, id: &ClusterId, method: &str, payload: Value) -> Result<()> {
        let target = self.read().get(id).cloned();

        // The lock is released before the target runs so handlers may
        // register or drop clusters themselves.
        match target.and_then(|weak| weak.upgrade()) {
            Some(target) => {
                log::trace!("Routing inbound {} to cluster {}", method, id);
                target.handle_inbound(method, payload)
            }
            None => {
                self.prune(id);
                Err(ClusterError::UnknownTarget(id.to_string()))
            }
        }
    }

    pub fn is_registered(&self, id: &ClusterId) -> bool {
        self.read().get(id).is_some_and(|t| t.strong_count() > 0)
    }

    /// Number of live registrations
    pub fn len(&self) -> usize {
        self.read()
            .values()
            .filter(|t| t.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn prune(&self, id: &ClusterId) {
        let mut targets = self.write();
        if targets.get(id).is_some_and(|t| t.strong_count() == 0) {
            targets.remove(id);
        }
    }
}
