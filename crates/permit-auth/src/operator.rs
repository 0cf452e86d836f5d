//! Operator status.
//!
//! Operator status is the one piece of subject state the engine consumes
//! from the host: it decides how [`PermissionDefault::Op`] and
//! [`PermissionDefault::NotOp`] resolve.
//!
//! [`PermissionDefault::Op`]: crate::PermissionDefault::Op
//! [`PermissionDefault::NotOp`]: crate::PermissionDefault::NotOp

use std::sync::atomic::{AtomicBool, Ordering};

/// A subject that may be an operator.
///
/// `set_op` takes `&self` because subjects are shared between the owning
/// task and concurrent readers.
pub trait ServerOperator: Send + Sync {
    /// Returns `true` if the subject is an operator.
    fn is_op(&self) -> bool;

    /// Sets the operator status.
    fn set_op(&self, value: bool);
}

/// Thread-safe standalone operator flag.
///
/// # Example
///
/// ```
/// use permit_auth::{OperatorFlag, ServerOperator};
///
/// let flag = OperatorFlag::new(false);
/// assert!(!flag.is_op());
/// flag.set_op(true);
/// assert!(flag.is_op());
/// ```
#[derive(Debug, Default)]
pub struct OperatorFlag(AtomicBool);

impl OperatorFlag {
    /// Creates a flag with the given initial status.
    #[must_use]
    pub fn new(is_op: bool) -> Self {
        Self(AtomicBool::new(is_op))
    }
}

impl ServerOperator for OperatorFlag {
    fn is_op(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn set_op(&self, value: bool) {
        self.0.store(value, Ordering::Release);
    }
}
