//! Stable identifiers for proxies and joints.
//!
//! Proxies are tracked by a UUID string that survives renames and rebuilds.
//! The same value is stamped on the guide built from a proxy and, later, on
//! the joint built from that guide; the two live under different attribute
//! names so they never shadow each other.

use std::collections::HashMap;

use uuid::Uuid;

use crate::constants::{JOINT_ATTR_UUID, PROXY_ATTR_UUID};
use crate::scene::NodeHandle;

/// Length of the short (first block) UUID form.
pub const SHORT_UUID_LEN: usize = 8;

/// Generate a random UUID without dashes (32 lowercase hex characters).
pub fn generate_uuid() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Check whether `value` is a full UUID, with or without dashes.
///
/// Format only: the UUID does not need to resolve to anything.
pub fn is_uuid_valid(value: &str) -> bool {
    matches!(value.len(), 32 | 36) && Uuid::try_parse(value).is_ok()
}

/// Check whether `value` is a short UUID (8 hexadecimal characters).
pub fn is_short_uuid_valid(value: &str) -> bool {
    value.len() == SHORT_UUID_LEN && value.chars().all(|c| c.is_ascii_hexdigit())
}

/// Full or short form.
pub fn is_any_uuid_valid(value: &str) -> bool {
    is_uuid_valid(value) || is_short_uuid_valid(value)
}

/// Attribute slot a UUID is stamped into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UuidNamespace {
    /// Built proxy guides
    Proxy,
    /// Joints built from proxies
    Joint,
}

impl UuidNamespace {
    /// Name of the string attribute holding the UUID.
    pub fn attr_name(&self) -> &'static str {
        match self {
            UuidNamespace::Proxy => PROXY_ATTR_UUID,
            UuidNamespace::Joint => JOINT_ATTR_UUID,
        }
    }

    pub fn from_attr_name(name: &str) -> Option<Self> {
        match name {
            PROXY_ATTR_UUID => Some(UuidNamespace::Proxy),
            JOINT_ATTR_UUID => Some(UuidNamespace::Joint),
            _ => None,
        }
    }
}

/// Map from `(namespace, uuid)` to the backend node carrying it.
///
/// A later registration for the same key replaces the earlier one, matching
/// a stamp that overwrites the attribute value.
#[derive(Clone, Debug, Default)]
pub struct UuidRegistry {
    entries: HashMap<(UuidNamespace, String), NodeHandle>,
    by_node: HashMap<(UuidNamespace, NodeHandle), String>,
}

impl UuidRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `node` as the holder of `uuid` in `namespace`.
    pub fn register(&mut self, namespace: UuidNamespace, uuid: &str, node: NodeHandle) {
        // A node holds one UUID per namespace
        self.remove(namespace, node);
        if let Some(previous) = self.entries.insert((namespace, uuid.to_string()), node) {
            if previous != node {
                self.by_node.remove(&(namespace, previous));
            }
        }
        self.by_node.insert((namespace, node), uuid.to_string());
    }

    /// Resolve a UUID. Returns `None` when nothing carries it.
    pub fn resolve(&self, namespace: UuidNamespace, uuid: &str) -> Option<NodeHandle> {
        self.entries.get(&(namespace, uuid.to_string())).copied()
    }

    /// Drop every entry pointing at `node` (used when a node is deleted).
    pub fn unregister_node(&mut self, node: NodeHandle) {
        for namespace in [UuidNamespace::Proxy, UuidNamespace::Joint] {
            self.remove(namespace, node);
        }
    }

    fn remove(&mut self, namespace: UuidNamespace, node: NodeHandle) {
        if let Some(uuid) = self.by_node.remove(&(namespace, node)) {
            self.entries.remove(&(namespace, uuid));
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
