//! Permission node definitions.
//!
//! A [`PermissionNode`] is what the registry stores: a name, a default and
//! an ordered list of implied children. Nodes are immutable once built;
//! changing a definition means registering a replacement.

use crate::PermissionDefault;
use permit_types::normalize;
use serde::{Deserialize, Serialize};

/// One implication edge: granting the parent sets `name` to `value`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChildLink {
    /// Normalized child permission name.
    pub name: String,
    /// `true` implies granting the child, `false` implies denying it.
    pub value: bool,
}

/// A registered permission definition.
///
/// Children keep the order they were added in. When two parents at the same
/// depth imply conflicting values for a shared child, the parent visited
/// first wins, so this order is observable.
///
/// # Example
///
/// ```
/// use permit_auth::{PermissionDefault, PermissionNode};
///
/// let node = PermissionNode::new("Cmd.Fly")
///     .with_description("Allows flying")
///     .with_default(PermissionDefault::Op)
///     .with_child("cmd.fly.self", true)
///     .with_child("cmd.fly.other", false);
///
/// assert_eq!(node.name(), "cmd.fly");
/// assert_eq!(node.child("CMD.FLY.SELF"), Some(true));
/// assert_eq!(node.children().len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "NodeRepr")]
pub struct PermissionNode {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default)]
    default: PermissionDefault,
    #[serde(default)]
    children: Vec<ChildLink>,
}

impl PermissionNode {
    /// Creates a node with default [`PermissionDefault::False`] and no children.
    #[must_use]
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            name: normalize(name.as_ref()),
            description: None,
            default: PermissionDefault::default(),
            children: Vec::new(),
        }
    }

    /// Sets the human-readable description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn with_default(mut self, default: PermissionDefault) -> Self {
        self.default = default;
        self
    }

    /// Adds an implied child.
    ///
    /// Re-adding an existing child updates its weight in place and keeps its
    /// position.
    #[must_use]
    pub fn with_child(mut self, name: impl AsRef<str>, value: bool) -> Self {
        let name = normalize(name.as_ref());
        match self.children.iter_mut().find(|c| c.name == name) {
            Some(existing) => existing.value = value,
            None => self.children.push(ChildLink { name, value }),
        }
        self
    }

    /// Returns the normalized name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the description, if any.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the default value.
    #[must_use]
    pub fn default(&self) -> PermissionDefault {
        self.default
    }

    /// Returns the implied children in registration order.
    #[must_use]
    pub fn children(&self) -> &[ChildLink] {
        &self.children
    }

    /// Returns the weight of the named child, if present.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<bool> {
        let name = normalize(name);
        self.children
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.value)
    }
}

/// Wire form accepted on deserialize. Funnels through the builder so names
/// are normalized and duplicate children collapse.
#[derive(Deserialize)]
struct NodeRepr {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    default: PermissionDefault,
    #[serde(default)]
    children: Vec<ChildLink>,
}

impl From<NodeRepr> for PermissionNode {
    fn from(repr: NodeRepr) -> Self {
        let mut node = PermissionNode::new(&repr.name).with_default(repr.default);
        node.description = repr.description;
        repr.children
            .into_iter()
            .fold(node, |node, child| node.with_child(&child.name, child.value))
    }
}
