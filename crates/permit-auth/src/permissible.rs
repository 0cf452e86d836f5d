//! The permissible capability trait.
//!
//! Defines [`Permissible`], the interface every permission holder exposes.
//! The trait lives here so host subject types can depend on it without
//! pulling in the runtime engine.
//!
//! # Architecture
//!
//! ```text
//! Permissible trait (permit-auth)      <- abstract, no runtime state
//!          │
//!          └── PermissibleBase (permit-runtime)  <- concrete engine
//!                    ▲
//!                    │ composed into
//!          host subjects (players, groups, console actors)
//! ```
//!
//! # Resolution Chain
//!
//! ```text
//! explicit override (newest attachment first)
//!   → child implication (shallowest depth, first seen)
//!     → registry default (operator-aware)
//!       → false
//! ```

use crate::{PermissionError, PermissionNode, ServerOperator};

/// A subject capable of holding permission attachments.
///
/// # Example
///
/// A host type that composes an engine and forwards to it implements the
/// trait by delegation. The toy below resolves from a fixed list instead:
///
/// ```
/// use permit_auth::{
///     Permissible, PermissionDefault, PermissionError, PermissionNode, ServerOperator,
/// };
///
/// struct Console;
///
/// impl ServerOperator for Console {
///     fn is_op(&self) -> bool {
///         true
///     }
///     fn set_op(&self, _value: bool) {}
/// }
///
/// impl Permissible for Console {
///     type Attachment = ();
///
///     fn is_permission_set(&self, name: &str) -> bool {
///         name == "console.stop"
///     }
///     fn resolve(&self, name: &str) -> Option<bool> {
///         self.is_permission_set(name).then_some(true)
///     }
///     fn has_permission(&self, name: &str) -> bool {
///         self.resolve(name).unwrap_or(false)
///     }
///     fn add_attachment(&self, _name: &str, _value: bool) {}
///     fn add_empty_attachment(&self) {}
///     fn remove_attachment(&self, _attachment: &()) -> Result<(), PermissionError> {
///         Ok(())
///     }
///     fn recalculate_permissions(&self) {}
/// }
///
/// let console = Console;
/// assert!(console.has_permission("console.stop"));
///
/// // has_node falls back to the node's own default when nothing resolves it.
/// let node = PermissionNode::new("server.reload").with_default(PermissionDefault::Op);
/// assert!(console.has_node(&node));
/// ```
pub trait Permissible: ServerOperator {
    /// Handle type returned for created attachments.
    type Attachment;

    /// Returns `true` if any active attachment explicitly sets `name`.
    ///
    /// Defaults and implied values do not count.
    fn is_permission_set(&self, name: &str) -> bool;

    /// Returns the value from overrides or implication, without defaults.
    fn resolve(&self, name: &str) -> Option<bool>;

    /// Returns the fully resolved value of `name`.
    fn has_permission(&self, name: &str) -> bool;

    /// Creates and activates an attachment holding one override.
    fn add_attachment(&self, name: &str, value: bool) -> Self::Attachment;

    /// Creates and activates an empty attachment.
    fn add_empty_attachment(&self) -> Self::Attachment;

    /// Detaches `attachment` and runs its removal callback.
    ///
    /// # Errors
    ///
    /// - [`PermissionError::NotAttached`] if the attachment is foreign or
    ///   already removed
    /// - [`PermissionError::ReentrantRemoval`] if called from the
    ///   attachment's own removal callback
    /// - [`PermissionError::RemovalCallback`] if the callback failed; the
    ///   attachment is removed regardless
    fn remove_attachment(&self, attachment: &Self::Attachment) -> Result<(), PermissionError>;

    /// Rebuilds the effective permission set now.
    fn recalculate_permissions(&self);

    /// Returns `true` if any active attachment explicitly sets `node`.
    fn is_node_set(&self, node: &PermissionNode) -> bool {
        self.is_permission_set(node.name())
    }

    /// Resolves `node`, falling back to the node's own default.
    ///
    /// Unlike [`has_permission`](Self::has_permission) this works for nodes
    /// that were never registered.
    fn has_node(&self, node: &PermissionNode) -> bool {
        self.resolve(node.name())
            .unwrap_or_else(|| node.default().evaluate(self.is_op()))
    }
}
