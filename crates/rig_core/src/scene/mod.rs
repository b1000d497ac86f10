//! Scene backend abstraction.
//!
//! The rig framework never talks to a host application directly. Everything
//! it creates, parents, moves or tags goes through [`SceneBackend`], so the
//! same build code runs against a DCC bridge or the in-memory
//! [`MemoryScene`] used by tests and the CLI.
//!
//! ## Conventions
//!
//! - Transforms passed in and out are world-space.
//! - Parenting keeps the child's world transform (like a DCC `parent` command).
//! - UUID lookups return `None` on a miss and never fail.

use std::fmt;
use std::ops::{Deref, DerefMut};

use rig_math::Transform;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::curve::Curve;
use crate::identity::UuidNamespace;

mod memory;

pub use memory::*;

/// Opaque handle to a backend object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle(pub usize);

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Value of a user attribute on a backend object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Double3([f64; 3]),
}

impl AttrValue {
    /// Convert a JSON value. Returns `None` for nulls, objects and arrays
    /// that are not exactly three numbers.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            AttrValue::Bool(v) => serde_json::Value::from(*v),
            AttrValue::Int(v) => serde_json::Value::from(*v),
            AttrValue::Float(v) => serde_json::Value::from(*v),
            AttrValue::Text(v) => serde_json::Value::from(v.as_str()),
            AttrValue::Double3(v) => serde_json::Value::from(v.to_vec()),
        }
    }

    /// Numeric view (bools and text are not numbers).
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Int(v) => Some(*v as f64),
            AttrValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Float(value)
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Text(value.to_string())
    }
}

/// A user-defined attribute as listed by the backend.
#[derive(Clone, Debug, PartialEq)]
pub struct UserAttr {
    pub name: String,
    pub value: AttrValue,
    pub locked: bool,
}

/// Errors reported by a scene backend.
#[derive(Error, Debug)]
pub enum SceneError {
    #[error("Node not found: {0}")]
    NodeNotFound(NodeHandle),

    #[error("Cannot parent {child} under {parent}: it would create a cycle")]
    ParentCycle { child: NodeHandle, parent: NodeHandle },

    #[error("Attribute {attr} on {node} is locked")]
    LockedAttribute { node: NodeHandle, attr: String },

    #[error("Backend rejected {operation}: {message}")]
    Rejected { operation: String, message: String },
}

/// Result type for backend operations.
pub type SceneResult<T> = Result<T, SceneError>;

/// Object-level capabilities the rig framework needs from a host scene.
pub trait SceneBackend {
    /// Create an empty transform group at the world origin.
    fn create_group(&mut self, name: &str) -> SceneResult<NodeHandle>;

    /// Create a curve-shaped guide.
    fn create_curve_guide(&mut self, curve: &Curve, name: &str) -> SceneResult<NodeHandle>;

    /// Create an unparented joint at the world origin.
    fn create_joint(&mut self, name: &str) -> SceneResult<NodeHandle>;

    /// Create a visualization line from `start` to `end`.
    fn create_line(&mut self, name: &str, start: NodeHandle, end: NodeHandle)
        -> SceneResult<NodeHandle>;

    /// Create a setup node scaling the shape of `target` by its `driver_attr` value.
    fn create_scale_driver(&mut self, target: NodeHandle, driver_attr: &str)
        -> SceneResult<NodeHandle>;

    /// Delete a node and everything below it.
    fn delete(&mut self, node: NodeHandle) -> SceneResult<()>;

    fn exists(&self, node: NodeHandle) -> bool;

    /// Parent `child` under `parent`, or under the world when `parent` is `None`.
    fn parent(&mut self, child: NodeHandle, parent: Option<NodeHandle>) -> SceneResult<()>;

    fn get_parent(&self, node: NodeHandle) -> Option<NodeHandle>;

    fn apply_world_transform(&mut self, node: NodeHandle, transform: &Transform)
        -> SceneResult<()>;

    fn get_world_transform(&self, node: NodeHandle) -> SceneResult<Transform>;

    /// Set a user attribute, creating it when missing.
    fn set_scalar_attr(&mut self, node: NodeHandle, name: &str, value: AttrValue)
        -> SceneResult<()>;

    fn get_scalar_attr(&self, node: NodeHandle, name: &str) -> Option<AttrValue>;

    /// Add a locked, display-only attribute used to group others in editors.
    fn add_separator_attr(&mut self, node: NodeHandle, name: &str) -> SceneResult<()>;

    /// User-defined attributes in creation order.
    fn list_user_attrs(&self, node: NodeHandle) -> Vec<UserAttr>;

    fn find_by_uuid(&self, uuid: &str, namespace: UuidNamespace) -> Option<NodeHandle>;

    /// Write `uuid` into the namespace attribute of `node`.
    fn stamp_uuid(&mut self, node: NodeHandle, uuid: &str, namespace: UuidNamespace)
        -> SceneResult<()>;

    /// Full path (`|root|child|node`).
    fn long_name(&self, node: NodeHandle) -> Option<String>;

    fn short_name(&self, node: NodeHandle) -> Option<String>;

    fn suspend_redraw(&mut self);

    fn resume_redraw(&mut self);

    /// Force a redraw.
    fn refresh(&mut self);

    /// Move `target` to the world position of `source`, keeping its rotation and scale.
    fn match_translate(&mut self, source: NodeHandle, target: NodeHandle) -> SceneResult<()> {
        let position = self.get_world_transform(source)?.position;
        let current = self.get_world_transform(target)?;
        self.apply_world_transform(target, &current.with_position(position))
    }
}

/// Suspends redraw for its lifetime.
///
/// Dropping the guard resumes and forces a refresh, on the success path, on
/// an early `?` return and while unwinding.
pub struct RedrawGuard<'a> {
    scene: &'a mut dyn SceneBackend,
}

impl<'a> RedrawGuard<'a> {
    pub fn new(scene: &'a mut dyn SceneBackend) -> Self {
        scene.suspend_redraw();
        Self { scene }
    }
}

impl<'a> Deref for RedrawGuard<'a> {
    type Target = dyn SceneBackend + 'a;

    fn deref(&self) -> &Self::Target {
        &*self.scene
    }
}

impl<'a> DerefMut for RedrawGuard<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.scene
    }
}

impl Drop for RedrawGuard<'_> {
    fn drop(&mut self) {
        self.scene.resume_redraw();
        self.scene.refresh();
    }
}
