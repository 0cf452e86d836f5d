//! Permission attachments.
//!
//! A [`PermissionAttachment`] is a removable bag of explicit overrides owned
//! by one subject. Handles are cheap clones of a shared inner value, so the
//! host, the subject and removal callbacks can all hold the same attachment.
//!
//! # Lifecycle
//!
//! ```text
//! PermissibleBase::attach ──► Active ──remove──► Removed (terminal)
//!                              │  ▲
//!          set/unset_permission│  │ invalidates the subject's cache
//!                              └──┘
//! ```
//!
//! Every override mutation goes through the owning subject's write lock and
//! marks its effective set dirty. A removed attachment keeps its last
//! overrides readable for diagnostics but rejects all mutation with
//! [`PermissionError::NotAttached`].

use crate::permissible::{PermissibleBase, SubjectShared};
use parking_lot::{Mutex, RwLock};
use permit_auth::{CallbackError, PermissionError};
use permit_types::{normalize, AttachmentId, SubjectId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};
use tracing::warn;

/// Callback run exactly once when an attachment is removed.
///
/// Returning an error does not keep the attachment alive; the error is
/// surfaced to whoever called for the removal.
pub type RemovalCallback =
    Box<dyn FnOnce(&PermissionAttachment) -> Result<(), CallbackError> + Send + 'static>;

/// State of an attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentState {
    /// Contributing to the owning subject's permissions.
    Active,
    /// Detached. Terminal.
    Removed,
}

/// Options for creating an attachment via [`PermissibleBase::attach`].
///
/// # Example
///
/// ```
/// use permit_runtime::{AttachmentSpec, PermissibleBase, PermissionRegistry};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let subject = PermissibleBase::new(Arc::new(PermissionRegistry::new()));
/// let attachment = subject.attach(
///     AttachmentSpec::new()
///         .registrant("essentials")
///         .permission("cmd.fly", true)
///         .lifetime(Duration::from_secs(60)),
/// );
///
/// assert_eq!(attachment.registrant(), Some("essentials"));
/// assert_eq!(attachment.get("cmd.fly"), Some(true));
/// assert!(attachment.expires_at().is_some());
/// ```
#[derive(Default)]
pub struct AttachmentSpec {
    registrant: Option<String>,
    permissions: Vec<(String, bool)>,
    lifetime: Option<Duration>,
    on_removed: Option<RemovalCallback>,
}

impl AttachmentSpec {
    /// Creates an empty spec.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Names the external owner of the attachment (e.g. a plugin).
    #[must_use]
    pub fn registrant(mut self, name: impl Into<String>) -> Self {
        self.registrant = Some(name.into());
        self
    }

    /// Adds an initial override.
    #[must_use]
    pub fn permission(mut self, name: impl AsRef<str>, value: bool) -> Self {
        self.permissions.push((normalize(name.as_ref()), value));
        self
    }

    /// Makes the attachment eligible for [`PermissibleBase::remove_expired`]
    /// once `lifetime` has elapsed.
    ///
    /// A lifetime too large to represent as an [`Instant`] never expires.
    #[must_use]
    pub fn lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = Some(lifetime);
        self
    }

    /// Sets the removal callback.
    #[must_use]
    pub fn on_removed<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(&PermissionAttachment) -> Result<(), CallbackError> + Send + 'static,
    {
        self.on_removed = Some(Box::new(callback));
        self
    }
}

impl std::fmt::Debug for AttachmentSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachmentSpec")
            .field("registrant", &self.registrant)
            .field("permissions", &self.permissions)
            .field("lifetime", &self.lifetime)
            .field("on_removed", &self.on_removed.is_some())
            .finish()
    }
}

/// Serializable view of an attachment, for host diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentSnapshot {
    /// Attachment identity.
    pub id: AttachmentId,
    /// Creation sequence on the owning subject (higher is newer).
    pub sequence: u64,
    /// External owner, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registrant: Option<String>,
    /// Explicit overrides.
    pub permissions: BTreeMap<String, bool>,
    /// Lifecycle state at snapshot time.
    pub state: AttachmentState,
}

/// Handle to a permission attachment.
///
/// Equality compares identity, not contents.
#[derive(Clone)]
pub struct PermissionAttachment {
    inner: Arc<AttachmentInner>,
}

struct AttachmentInner {
    id: AttachmentId,
    sequence: u64,
    subject: SubjectId,
    /// Non-owning back-reference to the subject.
    owner: Weak<SubjectShared>,
    registrant: Option<String>,
    expires_at: Option<Instant>,
    permissions: RwLock<BTreeMap<String, bool>>,
    /// Flipped only under the owning subject's write lock.
    active: AtomicBool,
    /// Thread running the removal callback, if any.
    callback_thread: Mutex<Option<ThreadId>>,
    on_removed: Mutex<Option<RemovalCallback>>,
}

impl PermissionAttachment {
    pub(crate) fn new(owner: &Arc<SubjectShared>, sequence: u64, spec: AttachmentSpec) -> Self {
        let AttachmentSpec {
            registrant,
            permissions,
            lifetime,
            on_removed,
        } = spec;

        Self {
            inner: Arc::new(AttachmentInner {
                id: AttachmentId::new(),
                sequence,
                subject: owner.id(),
                owner: Arc::downgrade(owner),
                registrant,
                expires_at: lifetime.and_then(|d| Instant::now().checked_add(d)),
                permissions: RwLock::new(permissions.into_iter().collect()),
                active: AtomicBool::new(true),
                callback_thread: Mutex::new(None),
                on_removed: Mutex::new(on_removed),
            }),
        }
    }

    /// Returns the attachment id.
    #[must_use]
    pub fn id(&self) -> AttachmentId {
        self.inner.id
    }

    /// Returns the creation sequence on the owning subject.
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.inner.sequence
    }

    /// Returns the id of the subject this attachment was created for.
    #[must_use]
    pub fn subject(&self) -> SubjectId {
        self.inner.subject
    }

    /// Returns the external owner, if any.
    #[must_use]
    pub fn registrant(&self) -> Option<&str> {
        self.inner.registrant.as_deref()
    }

    /// Returns when a timed attachment expires.
    #[must_use]
    pub fn expires_at(&self) -> Option<Instant> {
        self.inner.expires_at
    }

    /// Returns `true` if this is a timed attachment past its expiry.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    pub(crate) fn is_expired_at(&self, now: Instant) -> bool {
        self.inner.expires_at.is_some_and(|at| at <= now)
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub fn state(&self) -> AttachmentState {
        if self.is_active() {
            AttachmentState::Active
        } else {
            AttachmentState::Removed
        }
    }

    /// Returns `true` while the attachment contributes to its subject.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::Acquire)
    }

    /// Returns the owning subject, if it is still alive.
    #[must_use]
    pub fn permissible(&self) -> Option<PermissibleBase> {
        self.inner.owner.upgrade().map(PermissibleBase::from_shared)
    }

    /// Returns a copy of the explicit overrides.
    ///
    /// Still readable after removal.
    #[must_use]
    pub fn permissions(&self) -> BTreeMap<String, bool> {
        self.inner.permissions.read().clone()
    }

    /// Returns the override for `name`, if this attachment sets it.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<bool> {
        self.inner.permissions.read().get(&normalize(name)).copied()
    }

    /// Sets an override and invalidates the owning subject's cache.
    ///
    /// # Errors
    ///
    /// [`PermissionError::NotAttached`] if the attachment was removed or its
    /// subject no longer exists.
    pub fn set_permission(&self, name: &str, value: bool) -> Result<(), PermissionError> {
        let name = normalize(name);
        self.mutate(move |permissions| {
            permissions.insert(name, value);
        })
    }

    /// Removes an override and invalidates the owning subject's cache.
    ///
    /// Returns the previous value, if any.
    ///
    /// # Errors
    ///
    /// [`PermissionError::NotAttached`] if the attachment was removed or its
    /// subject no longer exists.
    pub fn unset_permission(&self, name: &str) -> Result<Option<bool>, PermissionError> {
        let name = normalize(name);
        self.mutate(move |permissions| permissions.remove(&name))
    }

    /// Replaces the removal callback.
    ///
    /// # Errors
    ///
    /// [`PermissionError::NotAttached`] if the attachment was removed or its
    /// subject no longer exists.
    pub fn set_removal_callback<F>(&self, callback: F) -> Result<(), PermissionError>
    where
        F: FnOnce(&PermissionAttachment) -> Result<(), CallbackError> + Send + 'static,
    {
        let owner = self.owner()?;
        let _state = owner.state.write();
        if !self.is_active() {
            return Err(self.not_attached());
        }
        *self.inner.on_removed.lock() = Some(Box::new(callback));
        Ok(())
    }

    /// Removes this attachment from its subject.
    ///
    /// # Errors
    ///
    /// See [`Permissible::remove_attachment`](permit_auth::Permissible::remove_attachment).
    pub fn remove(&self) -> Result<(), PermissionError> {
        let owner = self.owner()?;
        PermissibleBase::from_shared(owner).detach(self)
    }

    /// Returns a serializable snapshot.
    #[must_use]
    pub fn snapshot(&self) -> AttachmentSnapshot {
        AttachmentSnapshot {
            id: self.id(),
            sequence: self.sequence(),
            registrant: self.inner.registrant.clone(),
            permissions: self.permissions(),
            state: self.state(),
        }
    }

    pub(crate) fn with_permissions<R>(&self, f: impl FnOnce(&BTreeMap<String, bool>) -> R) -> R {
        let permissions = self.inner.permissions.read();
        f(&*permissions)
    }

    /// Caller holds the owning subject's write lock.
    pub(crate) fn mark_removed(&self) -> Option<RemovalCallback> {
        self.inner.active.store(false, Ordering::Release);
        self.inner.on_removed.lock().take()
    }

    /// Returns `true` when called from inside this attachment's own
    /// removal callback. Other threads never see it set.
    pub(crate) fn in_own_callback(&self) -> bool {
        *self.inner.callback_thread.lock() == Some(thread::current().id())
    }

    /// Runs the removal callback. Caller must not hold the subject lock.
    pub(crate) fn run_removal_callback(
        &self,
        callback: RemovalCallback,
    ) -> Result<(), PermissionError> {
        let result = {
            let _guard = CallbackGuard::enter(&self.inner.callback_thread);
            callback(self)
        };

        result.map_err(|source| {
            warn!("attachment {}: removal callback failed: {source}", self.id());
            PermissionError::RemovalCallback {
                attachment: self.id(),
                source,
            }
        })
    }

    pub(crate) fn not_attached(&self) -> PermissionError {
        PermissionError::NotAttached {
            attachment: self.id(),
        }
    }

    fn owner(&self) -> Result<Arc<SubjectShared>, PermissionError> {
        self.inner.owner.upgrade().ok_or_else(|| self.not_attached())
    }

    fn mutate<R>(
        &self,
        f: impl FnOnce(&mut BTreeMap<String, bool>) -> R,
    ) -> Result<R, PermissionError> {
        let owner = self.owner()?;
        let mut state = owner.state.write();
        if !self.is_active() {
            return Err(self.not_attached());
        }
        let result = f(&mut *self.inner.permissions.write());
        state.invalidate();
        Ok(result)
    }
}

impl PartialEq for PermissionAttachment {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for PermissionAttachment {}

impl std::fmt::Debug for PermissionAttachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionAttachment")
            .field("id", &self.inner.id)
            .field("sequence", &self.inner.sequence)
            .field("subject", &self.inner.subject)
            .field("registrant", &self.inner.registrant)
            .field("state", &self.state())
            .finish()
    }
}

/// Clears the callback thread even if the callback panics.
struct CallbackGuard<'a>(&'a Mutex<Option<ThreadId>>);

impl<'a> CallbackGuard<'a> {
    fn enter(slot: &'a Mutex<Option<ThreadId>>) -> Self {
        *slot.lock() = Some(thread::current().id());
        Self(slot)
    }
}

impl Drop for CallbackGuard<'_> {
    fn drop(&mut self) {
        *self.0.lock() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PermissionRegistry;
    use permit_auth::{ErrorKind, Permissible};

    fn subject() -> PermissibleBase {
        PermissibleBase::new(Arc::new(PermissionRegistry::new()))
    }

    #[test]
    fn new_attachment_is_active() {
        let subject = subject();
        let attachment = subject.add_attachment("a", true);

        assert!(attachment.is_active());
        assert_eq!(attachment.state(), AttachmentState::Active);
        assert_eq!(attachment.subject(), subject.id());
        assert!(attachment.registrant().is_none());
        assert!(attachment.expires_at().is_none());
        assert!(!attachment.is_expired());
    }

    #[test]
    fn set_and_unset_permission() {
        let subject = subject();
        let attachment = subject.add_empty_attachment();

        attachment.set_permission("World.Edit", true).expect("set");
        assert_eq!(attachment.get("world.edit"), Some(true));
        assert!(subject.has_permission("world.edit"));

        let previous = attachment.unset_permission("WORLD.EDIT").expect("unset");
        assert_eq!(previous, Some(true));
        assert_eq!(attachment.get("world.edit"), None);
        assert!(!subject.has_permission("world.edit"));

        assert_eq!(attachment.unset_permission("missing").expect("unset"), None);
    }

    #[test]
    fn mutation_after_removal_fails() {
        let subject = subject();
        let attachment = subject.add_attachment("a", true);
        attachment.remove().expect("remove");

        assert_eq!(attachment.state(), AttachmentState::Removed);

        let err = attachment.set_permission("b", true).expect_err("removed");
        assert_eq!(err.kind(), ErrorKind::NotAttached);
        let err = attachment.unset_permission("a").expect_err("removed");
        assert_eq!(err.kind(), ErrorKind::NotAttached);
        let err = attachment
            .set_removal_callback(|_| Ok(()))
            .expect_err("removed");
        assert_eq!(err.kind(), ErrorKind::NotAttached);
    }

    #[test]
    fn removed_attachment_keeps_last_overrides() {
        let subject = subject();
        let attachment = subject.add_attachment("a", true);
        attachment.set_permission("b", false).expect("set");
        attachment.remove().expect("remove");

        let permissions = attachment.permissions();
        assert_eq!(permissions.get("a"), Some(&true));
        assert_eq!(permissions.get("b"), Some(&false));
    }

    #[test]
    fn dropped_subject_detaches_handle() {
        let attachment = {
            let subject = subject();
            subject.add_attachment("a", true)
        };

        assert!(attachment.permissible().is_none());
        let err = attachment.set_permission("a", false).expect_err("no owner");
        assert_eq!(err.kind(), ErrorKind::NotAttached);
        let err = attachment.remove().expect_err("no owner");
        assert_eq!(err.kind(), ErrorKind::NotAttached);
    }

    #[test]
    fn permissible_back_reference() {
        let subject = subject();
        let attachment = subject.add_empty_attachment();

        let owner = attachment.permissible().expect("owner alive");
        assert_eq!(owner.id(), subject.id());
    }

    #[test]
    fn expired_timed_attachment() {
        let subject = subject();
        let attachment = subject.attach(AttachmentSpec::new().lifetime(Duration::ZERO));

        assert!(attachment.is_expired());
        if let Some(earlier) = Instant::now().checked_sub(Duration::from_secs(60)) {
            assert!(!attachment.is_expired_at(earlier));
        }
    }

    #[test]
    fn huge_lifetime_never_expires() {
        let subject = subject();
        let attachment = subject.attach(
            AttachmentSpec::new()
                .permission("x", true)
                .lifetime(Duration::MAX),
        );

        assert!(attachment.is_active());
        assert_eq!(attachment.expires_at(), None);
        assert!(!attachment.is_expired());
        assert_eq!(subject.remove_expired().expect("no callbacks"), 0);
        assert!(subject.has_permission("x"));
    }

    #[test]
    fn snapshot_serializes() {
        let subject = subject();
        let attachment = subject.attach(
            AttachmentSpec::new()
                .registrant("worldedit")
                .permission("World.Edit", true),
        );

        let snapshot = attachment.snapshot();
        assert_eq!(snapshot.id, attachment.id());
        assert_eq!(snapshot.state, AttachmentState::Active);

        let json = serde_json::to_value(&snapshot).expect("serialize snapshot");
        assert_eq!(json["registrant"], "worldedit");
        assert_eq!(json["permissions"]["world.edit"], true);
        assert_eq!(json["state"], "active");
    }

    #[test]
    fn equality_is_identity() {
        let subject = subject();
        let a = subject.add_attachment("x", true);
        let b = subject.add_attachment("x", true);

        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn debug_does_not_expose_callback() {
        let spec = AttachmentSpec::new().on_removed(|_| Ok(()));
        let debug = format!("{spec:?}");
        assert!(debug.contains("on_removed: true"), "got: {debug}");
    }
}
