//! Permission primitives for permit.
//!
//! This crate defines the data model and the capability trait. It holds no
//! runtime state; `permit-runtime` provides the engine.
//!
//! # Permission Model
//!
//! ```text
//! PermissionNode  : name + default + ordered children (signed weights)
//! Attachment      : removable bag of explicit name → bool overrides
//! Permissible     : answers "does this subject have P?"
//! ```
//!
//! | Type | Controls |
//! |------|----------|
//! | [`PermissionNode`] | What a permission implies and its fallback value |
//! | [`PermissionDefault`] | Fallback value, optionally operator-dependent |
//! | [`Permissible`] | Per-subject resolution and attachment lifecycle |
//! | [`ServerOperator`] | Operator status consumed by defaults |
//!
//! # Crate Architecture
//!
//! ```text
//! permit-types  (ids, ErrorCode)
//!     ↑
//! permit-auth   ◄── THIS CRATE
//! (PermissionNode, PermissionDefault, Permissible, PermissionError)
//!     ↑
//! permit-runtime (PermissionRegistry, PermissibleBase)
//! ```

pub mod default;
pub mod error;
pub mod node;
pub mod operator;
pub mod permissible;

pub use default::PermissionDefault;
pub use error::{CallbackError, ErrorKind, PermissionError};
pub use node::{ChildLink, PermissionNode};
pub use operator::{OperatorFlag, ServerOperator};
pub use permissible::Permissible;

// Re-export ids for convenience
pub use permit_types::{AttachmentId, SubjectId};
