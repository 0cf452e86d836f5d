//! Core types for the permit permission engine.
//!
//! # Crate Architecture
//!
//! ```text
//! permit-types    : ids, ErrorCode, name normalization  ◄── HERE
//!      ↑
//! permit-auth     : PermissionNode, PermissionDefault, Permissible trait
//!      ↑
//! permit-runtime  : PermissionRegistry, PermissibleBase, attachments
//! ```
//!
//! This crate carries no permission logic. It only provides the pieces every
//! other layer agrees on.
//!
//! # Example
//!
//! ```
//! use permit_types::{normalize, AttachmentId, SubjectId};
//!
//! let subject = SubjectId::new();
//! let attachment = AttachmentId::new();
//! assert_ne!(subject.uuid(), attachment.uuid());
//! assert_eq!(normalize("Admin.Kick"), "admin.kick");
//! ```

mod error;
mod id;
mod name;

pub use error::{assert_error_code, assert_error_codes, ErrorCode};
pub use id::{AttachmentId, SubjectId};
pub use name::normalize;
