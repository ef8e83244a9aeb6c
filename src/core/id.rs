//! Cluster identity
//!
//! Every proxy is addressed on the visual side by a [`ClusterId`]. Ids handed
//! out by [`ClusterId::generate`] are unique for the lifetime of the process.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::core::constants::CLUSTER_ID_PREFIX;

static NEXT_CLUSTER_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identifier of a cluster across the boundary
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterId(String);

impl ClusterId {
    /// Allocate a fresh, process-unique id
    pub fn generate() -> Self {
        let n = NEXT_CLUSTER_ID.fetch_add(1, Ordering::Relaxed);
        Self(format!("{}-{}", CLUSTER_ID_PREFIX, n))
    }

    /// Wrap an id chosen by the caller (for example one minted by the page)
    pub fn from_raw(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ClusterId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ClusterId {
    fn from(id: &str) -> Self {
        Self::from_raw(id)
    }
}
