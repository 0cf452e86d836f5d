//! Identifier types.
//!
//! Subjects and attachments are identified by random UUID v4 values so
//! diagnostics emitted by different subjects never collide.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a permissible subject.
///
/// # Example
///
/// ```
/// use permit_types::SubjectId;
///
/// let a = SubjectId::new();
/// let b = SubjectId::new();
/// assert_ne!(a, b);
/// assert!(a.to_string().starts_with("subject:"));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubjectId(pub Uuid);

impl SubjectId {
    /// Creates a new [`SubjectId`] with a random UUID v4.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the inner UUID.
    #[must_use]
    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SubjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SubjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "subject:{}", self.0)
    }
}

/// Identifier of a permission attachment.
///
/// Attachment ids carry identity only. Ordering between attachments on one
/// subject is tracked separately by a creation sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttachmentId(pub Uuid);

// NOTE: AttachmentId intentionally does NOT implement Default.
// An id that was never issued by a subject would pass type checks but match
// no attachment. Ids are minted only when an attachment is created.
#[allow(clippy::new_without_default)]
impl AttachmentId {
    /// Creates a new [`AttachmentId`] with a random UUID v4.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the inner UUID.
    #[must_use]
    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for AttachmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "attachment:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_id_uniqueness() {
        assert_ne!(SubjectId::new(), SubjectId::new());
        assert_ne!(SubjectId::default(), SubjectId::default());
    }

    #[test]
    fn subject_id_display() {
        let id = SubjectId::new();
        let display = id.to_string();
        assert!(display.starts_with("subject:"));
        assert!(display.contains(&id.uuid().to_string()));
    }

    #[test]
    fn attachment_id_display() {
        let id = AttachmentId::new();
        let display = id.to_string();
        assert!(display.starts_with("attachment:"));
        assert!(display.contains(&id.uuid().to_string()));
    }

    #[test]
    fn attachment_id_serde() {
        let id = AttachmentId::new();
        let json = serde_json::to_string(&id).expect("serialize attachment id");
        let parsed: AttachmentId = serde_json::from_str(&json).expect("deserialize attachment id");
        assert_eq!(parsed, id);
    }
}
