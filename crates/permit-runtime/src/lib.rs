//! Permission resolution engine.
//!
//! Implements the [`Permissible`] trait from `permit-auth` on top of a
//! shared [`PermissionRegistry`], with removable attachments and a cached
//! [`EffectivePermissionSet`] per subject.
//!
//! # Architecture
//!
//! ```text
//! host subject ──has-a──► PermissibleBase ──Arc──► PermissionRegistry
//!                              │                        (nodes, generation)
//!                              ├── PermissionAttachment × N  (newest wins)
//!                              └── EffectivePermissionSet    (dirty-flag cache)
//! ```
//!
//! # Query Flow
//!
//! ```text
//! has_permission(name)
//!   ├─ cache current? ── yes ─► read entry
//!   │        no
//!   │        └─► rebuild: explicit pass + breadth-first implication
//!   ├─ entry found ─► its value
//!   ├─ registry node ─► node default (operator-aware)
//!   └─ otherwise ─► false
//! ```
//!
//! # Example
//!
//! ```
//! use permit_auth::{Permissible, PermissionNode};
//! use permit_runtime::{PermissibleBase, PermissionRegistry};
//! use std::sync::Arc;
//!
//! let registry = Arc::new(PermissionRegistry::new());
//! registry
//!     .register(PermissionNode::new("cmd.fly").with_child("cmd.fly.self", true))
//!     .expect("register");
//!
//! let player = PermissibleBase::new(Arc::clone(&registry));
//! let older = player.add_attachment("cmd.fly", false);
//! let newer = player.add_attachment("cmd.fly", true);
//! assert!(player.has_permission("cmd.fly.self"));
//!
//! player.remove_attachment(&newer).expect("attached");
//! assert!(!player.has_permission("cmd.fly"));
//! # let _ = older;
//! ```

mod attachment;
pub mod config;
mod effective;
mod permissible;
mod registry;

pub use attachment::{
    AttachmentSnapshot, AttachmentSpec, AttachmentState, PermissionAttachment, RemovalCallback,
};
pub use effective::{EffectivePermission, EffectivePermissionSet};
pub use permissible::PermissibleBase;
pub use registry::{global_registry, PermissionRegistry};

// Re-export from permit-auth for convenience
pub use permit_auth::{
    ErrorKind, OperatorFlag, Permissible, PermissionDefault, PermissionError, PermissionNode,
    ServerOperator,
};
