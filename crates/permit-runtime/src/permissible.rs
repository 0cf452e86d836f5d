//! Default implementation of [`Permissible`].
//!
//! Provides [`PermissibleBase`], the per-subject engine host types compose
//! into their own subject structs and delegate to.
//!
//! # Architecture
//!
//! ```text
//! Permissible trait (permit-auth)       ← abstract definition
//!          │
//!          └── PermissibleBase (THIS MODULE)  ← concrete impl
//!                 ├── attachments (creation order)
//!                 ├── EffectivePermissionSet (cached, dirty flag + registry generation)
//!                 └── Arc<PermissionRegistry>
//! ```
//!
//! # Locking
//!
//! One `RwLock` guards the attachment list and the cache. Queries take the
//! shared lock and only upgrade to the exclusive lock when the cache is
//! stale. Mutations (add, remove, override edits through an attachment)
//! take the exclusive lock, so they are serialized against each other and
//! against rebuilds. Lock order is subject → attachment overrides →
//! registry. Removal callbacks run after the subject lock is released.

use crate::attachment::{AttachmentSnapshot, AttachmentSpec, PermissionAttachment, RemovalCallback};
use crate::{EffectivePermissionSet, PermissionRegistry};
use parking_lot::RwLock;
use permit_auth::{OperatorFlag, Permissible, PermissionError, ServerOperator};
use permit_types::SubjectId;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Per-subject permission engine.
///
/// Cloning yields another handle to the same subject.
///
/// # Example
///
/// ```
/// use permit_auth::{Permissible, PermissionDefault, PermissionNode};
/// use permit_runtime::{PermissibleBase, PermissionRegistry};
/// use std::sync::Arc;
///
/// let registry = Arc::new(PermissionRegistry::new());
/// registry
///     .register(
///         PermissionNode::new("cmd.fly")
///             .with_default(PermissionDefault::False)
///             .with_child("cmd.fly.self", true),
///     )
///     .expect("register");
///
/// let player = PermissibleBase::new(Arc::clone(&registry));
/// assert!(!player.has_permission("cmd.fly"));
///
/// let attachment = player.add_attachment("cmd.fly", true);
/// assert!(player.has_permission("cmd.fly.self"));
/// assert!(!player.is_permission_set("cmd.fly.self")); // implied, not set
///
/// player.remove_attachment(&attachment).expect("attached");
/// assert!(!player.has_permission("cmd.fly.self"));
/// ```
#[derive(Clone)]
pub struct PermissibleBase {
    inner: Arc<SubjectShared>,
}

pub(crate) struct SubjectShared {
    id: SubjectId,
    registry: Arc<PermissionRegistry>,
    operator: Arc<dyn ServerOperator>,
    pub(crate) state: RwLock<SubjectState>,
}

pub(crate) struct SubjectState {
    /// Active attachments, oldest first.
    attachments: Vec<PermissionAttachment>,
    next_sequence: u64,
    cache: EffectivePermissionSet,
    dirty: bool,
}

impl SubjectShared {
    pub(crate) fn id(&self) -> SubjectId {
        self.id
    }

    /// Caller holds the write lock.
    fn rebuild(&self, state: &mut SubjectState) {
        state.cache = EffectivePermissionSet::compute(&state.attachments, &self.registry);
        state.dirty = false;
        debug!(
            "{}: recalculated {} effective permissions from {} attachments",
            self.id,
            state.cache.len(),
            state.attachments.len()
        );
    }
}

impl SubjectState {
    pub(crate) fn invalidate(&mut self) {
        self.dirty = true;
    }

    fn is_current(&self, generation: u64) -> bool {
        !self.dirty && self.cache.generation() == generation
    }
}

impl PermissibleBase {
    /// Creates a non-operator subject resolving against `registry`.
    #[must_use]
    pub fn new(registry: Arc<PermissionRegistry>) -> Self {
        Self::with_operator(registry, Arc::new(OperatorFlag::default()))
    }

    /// Creates a subject whose operator status comes from the host.
    #[must_use]
    pub fn with_operator(
        registry: Arc<PermissionRegistry>,
        operator: Arc<dyn ServerOperator>,
    ) -> Self {
        Self {
            inner: Arc::new(SubjectShared {
                id: SubjectId::new(),
                registry,
                operator,
                state: RwLock::new(SubjectState {
                    attachments: Vec::new(),
                    next_sequence: 0,
                    cache: EffectivePermissionSet::default(),
                    dirty: true,
                }),
            }),
        }
    }

    pub(crate) fn from_shared(inner: Arc<SubjectShared>) -> Self {
        Self { inner }
    }

    /// Returns the subject id.
    #[must_use]
    pub fn id(&self) -> SubjectId {
        self.inner.id
    }

    /// Returns the registry this subject resolves against.
    #[must_use]
    pub fn registry(&self) -> &Arc<PermissionRegistry> {
        &self.inner.registry
    }

    /// Creates and activates an attachment from `spec`.
    pub fn attach(&self, spec: AttachmentSpec) -> PermissionAttachment {
        let mut state = self.inner.state.write();
        let sequence = state.next_sequence;
        state.next_sequence += 1;

        let attachment = PermissionAttachment::new(&self.inner, sequence, spec);
        state.attachments.push(attachment.clone());
        state.invalidate();

        debug!(
            "{}: added {} (sequence {}, registrant {:?})",
            self.inner.id,
            attachment.id(),
            sequence,
            attachment.registrant()
        );
        attachment
    }

    /// Returns the active attachments, oldest first.
    #[must_use]
    pub fn attachments(&self) -> Vec<PermissionAttachment> {
        self.inner.state.read().attachments.clone()
    }

    /// Returns snapshots of the active attachments, oldest first.
    #[must_use]
    pub fn attachment_snapshots(&self) -> Vec<AttachmentSnapshot> {
        self.inner
            .state
            .read()
            .attachments
            .iter()
            .map(PermissionAttachment::snapshot)
            .collect()
    }

    /// Returns a copy of the current effective set, rebuilding if stale.
    #[must_use]
    pub fn effective_permissions(&self) -> EffectivePermissionSet {
        self.with_current(|set| set.clone())
    }

    /// Removes every timed attachment past its expiry.
    ///
    /// The host drives the clock: expired attachments keep contributing
    /// until this is called. Returns how many attachments were removed.
    ///
    /// # Errors
    ///
    /// The first [`PermissionError::RemovalCallback`] raised. Every expired
    /// attachment is removed regardless.
    pub fn remove_expired(&self) -> Result<usize, PermissionError> {
        let now = Instant::now();
        let expired: Vec<PermissionAttachment> = self
            .inner
            .state
            .read()
            .attachments
            .iter()
            .filter(|a| a.is_expired_at(now))
            .cloned()
            .collect();

        let mut removed = 0;
        let mut first_error = None;
        for attachment in &expired {
            match self.detach(attachment) {
                Ok(()) => removed += 1,
                // Someone else removed it in the meantime
                Err(PermissionError::NotAttached { .. }) => {}
                Err(e) => {
                    removed += 1;
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(removed),
        }
    }

    /// Removes every attachment, running each removal callback.
    ///
    /// # Errors
    ///
    /// The first [`PermissionError::RemovalCallback`] raised. Every
    /// attachment is removed and every callback runs regardless.
    pub fn clear_permissions(&self) -> Result<(), PermissionError> {
        let drained: Vec<(PermissionAttachment, Option<RemovalCallback>)> = {
            let mut state = self.inner.state.write();
            let drained = std::mem::take(&mut state.attachments)
                .into_iter()
                .map(|attachment| {
                    let callback = attachment.mark_removed();
                    (attachment, callback)
                })
                .collect();
            state.invalidate();
            drained
        };

        debug!("{}: cleared {} attachments", self.inner.id, drained.len());

        let mut first_error = None;
        for (attachment, callback) in drained {
            if let Some(callback) = callback {
                if let Err(e) = attachment.run_removal_callback(callback) {
                    first_error.get_or_insert(e);
                }
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    pub(crate) fn detach(&self, attachment: &PermissionAttachment) -> Result<(), PermissionError> {
        if attachment.subject() != self.inner.id {
            warn!(
                "{}: refused to remove foreign {}",
                self.inner.id,
                attachment.id()
            );
            return Err(attachment.not_attached());
        }

        let callback = {
            let mut state = self.inner.state.write();
            let Some(pos) = state
                .attachments
                .iter()
                .position(|a| a.id() == attachment.id())
            else {
                if attachment.in_own_callback() {
                    warn!(
                        "{}: removal callback of {} tried to remove it again",
                        self.inner.id,
                        attachment.id()
                    );
                    return Err(PermissionError::ReentrantRemoval {
                        attachment: attachment.id(),
                    });
                }
                return Err(attachment.not_attached());
            };

            let removed = state.attachments.remove(pos);
            state.invalidate();
            removed.mark_removed()
        };

        debug!("{}: removed {}", self.inner.id, attachment.id());

        match callback {
            Some(callback) => attachment.run_removal_callback(callback),
            None => Ok(()),
        }
    }

    /// Runs `f` against an up-to-date effective set.
    fn with_current<R>(&self, f: impl FnOnce(&EffectivePermissionSet) -> R) -> R {
        let generation = self.inner.registry.generation();
        {
            let state = self.inner.state.read();
            if state.is_current(generation) {
                return f(&state.cache);
            }
        }

        let mut state = self.inner.state.write();
        // Another writer may have rebuilt while we waited
        if !state.is_current(self.inner.registry.generation()) {
            self.inner.rebuild(&mut state);
        }
        f(&state.cache)
    }

    fn default_value(&self, name: &str) -> bool {
        self.inner
            .registry
            .lookup(name)
            .is_some_and(|node| node.default().evaluate(self.is_op()))
    }
}

impl ServerOperator for PermissibleBase {
    fn is_op(&self) -> bool {
        self.inner.operator.is_op()
    }

    fn set_op(&self, value: bool) {
        self.inner.operator.set_op(value);
    }
}

impl Permissible for PermissibleBase {
    type Attachment = PermissionAttachment;

    fn is_permission_set(&self, name: &str) -> bool {
        self.with_current(|set| set.is_set(name))
    }

    fn resolve(&self, name: &str) -> Option<bool> {
        self.with_current(|set| set.value(name))
    }

    fn has_permission(&self, name: &str) -> bool {
        self.resolve(name)
            .unwrap_or_else(|| self.default_value(name))
    }

    fn add_attachment(&self, name: &str, value: bool) -> PermissionAttachment {
        self.attach(AttachmentSpec::new().permission(name, value))
    }

    fn add_empty_attachment(&self) -> PermissionAttachment {
        self.attach(AttachmentSpec::new())
    }

    fn remove_attachment(&self, attachment: &PermissionAttachment) -> Result<(), PermissionError> {
        self.detach(attachment)
    }

    fn recalculate_permissions(&self) {
        let mut state = self.inner.state.write();
        self.inner.rebuild(&mut state);
    }
}

impl std::fmt::Debug for PermissibleBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.read();
        f.debug_struct("PermissibleBase")
            .field("id", &self.inner.id)
            .field("attachments", &state.attachments.len())
            .field("dirty", &state.dirty)
            .finish()
    }
}
