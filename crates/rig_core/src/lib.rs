//! Rig Core - Proxy, module and project framework for auto-rigging.
//!
//! This crate provides:
//!
//! - **Data model**: `Proxy` guides grouped into `RigModule`s inside a `Project`
//! - **Build protocol**: four ordered phases turning proxies into guides, then joints
//! - **Scene backend**: the `SceneBackend` trait plus an in-memory `MemoryScene`
//! - **Persistence**: JSON project files
//!
//! # Example
//!
//! ```ignore
//! use rig_core::{MemoryScene, ModuleSpine, Project};
//!
//! let mut project = Project::new("biped");
//! project.add_to_modules(Box::new(ModuleSpine::new()));
//!
//! let mut scene = MemoryScene::new();
//! project.build_proxy(&mut scene)?;
//! project.build_rig(&mut scene)?;
//! project.save_to_file("biped.json")?;
//! ```

pub mod color;
pub mod constants;
pub mod curve;
pub mod error;
pub mod identity;
pub mod module;
pub mod project;
pub mod proxy;
pub mod scene;

// Re-export commonly used types
pub use curve::Curve;
pub use error::{RigError, RigResult};
pub use identity::{generate_uuid, is_short_uuid_valid, is_uuid_valid, UuidNamespace};
pub use module::{BuildPhase, ModuleBase, ModuleGeneric, ModuleKind, ModuleSpine, RigModule};
pub use project::{ExistingProxy, Project};
pub use proxy::{Proxy, ProxyData, ProxyDictOptions, ProxyMetadata};
pub use scene::{AttrValue, MemoryScene, NodeHandle, RedrawGuard, SceneBackend, SceneError};
