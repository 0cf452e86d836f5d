//! Integration tests for subject-level permission resolution.
//!
//! Exercises the full flow through public APIs only:
//! - registry population (code and TOML)
//! - host subject types composing PermissibleBase
//! - attachment precedence, implication and removal contracts
//! - concurrent readers against a mutating owner

use permit_auth::{
    ErrorKind, Permissible, PermissionDefault, PermissionError, PermissionNode, ServerOperator,
};
use permit_runtime::config::PermissionsConfig;
use permit_runtime::{
    AttachmentSpec, AttachmentState, OperatorFlag, PermissibleBase, PermissionAttachment,
    PermissionRegistry,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

// =============================================================================
// Test Fixtures
// =============================================================================

/// Host subject that composes the engine and delegates to it.
struct Player {
    name: String,
    op: Arc<OperatorFlag>,
    perms: PermissibleBase,
}

impl Player {
    fn new(name: &str, registry: &Arc<PermissionRegistry>) -> Self {
        let op = Arc::new(OperatorFlag::new(false));
        let perms = PermissibleBase::with_operator(Arc::clone(registry), op.clone());
        Self {
            name: name.to_string(),
            op,
            perms,
        }
    }
}

impl ServerOperator for Player {
    fn is_op(&self) -> bool {
        self.op.is_op()
    }

    fn set_op(&self, value: bool) {
        self.op.set_op(value);
    }
}

impl Permissible for Player {
    type Attachment = PermissionAttachment;

    fn is_permission_set(&self, name: &str) -> bool {
        self.perms.is_permission_set(name)
    }

    fn resolve(&self, name: &str) -> Option<bool> {
        self.perms.resolve(name)
    }

    fn has_permission(&self, name: &str) -> bool {
        self.perms.has_permission(name)
    }

    fn add_attachment(&self, name: &str, value: bool) -> PermissionAttachment {
        self.perms.add_attachment(name, value)
    }

    fn add_empty_attachment(&self) -> PermissionAttachment {
        self.perms.add_empty_attachment()
    }

    fn remove_attachment(&self, attachment: &PermissionAttachment) -> Result<(), PermissionError> {
        self.perms.remove_attachment(attachment)
    }

    fn recalculate_permissions(&self) {
        self.perms.recalculate_permissions();
    }
}

fn registry(nodes: Vec<PermissionNode>) -> Arc<PermissionRegistry> {
    let registry = Arc::new(PermissionRegistry::new());
    for node in nodes {
        registry.register(node).expect("register node");
    }
    registry
}

/// Generic check used with any permissible subject.
fn can_fly(subject: &impl Permissible) -> bool {
    subject.has_permission("cmd.fly.self")
}

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn fly_scenario() {
    let registry = registry(vec![PermissionNode::new("cmd.fly")
        .with_default(PermissionDefault::False)
        .with_child("cmd.fly.self", true)]);
    let player = Player::new("steve", &registry);
    assert!(!can_fly(&player));

    player.add_attachment("cmd.fly", true);

    assert!(player.has_permission("cmd.fly.self"));
    assert!(!player.is_permission_set("cmd.fly.self"));
    assert!(player.is_permission_set("cmd.fly"));
    assert!(can_fly(&player), "{} should fly", player.name);
}

#[test]
fn override_precedence_and_restore() {
    let registry = registry(vec![]);
    let player = Player::new("alex", &registry);

    let _a1 = player.add_attachment("x", false);
    let a2 = player.add_attachment("x", true);
    assert!(player.has_permission("x"));

    player.remove_attachment(&a2).expect("remove a2");
    assert!(!player.has_permission("x"));
}

#[test]
fn mutating_older_attachment_does_not_reorder() {
    let registry = registry(vec![]);
    let player = Player::new("alex", &registry);

    let older = player.add_empty_attachment();
    let _newer = player.add_attachment("x", true);

    older.set_permission("x", false).expect("set");
    assert!(player.has_permission("x"), "creation order decides, not edit order");
}

#[test]
fn default_flip_without_attachment_change() {
    let registry = registry(vec![
        PermissionNode::new("chat").with_default(PermissionDefault::True)
    ]);
    let player = Player::new("alex", &registry);
    player.add_attachment("unrelated", true);
    assert!(player.has_permission("chat"));

    registry.register_or_replace(
        PermissionNode::new("chat").with_default(PermissionDefault::False),
    );
    assert!(!player.has_permission("chat"));
}

#[test]
fn operator_defaults_through_host_type() {
    let registry = registry(vec![
        PermissionNode::new("server.stop").with_default(PermissionDefault::Op)
    ]);
    let player = Player::new("admin", &registry);
    assert!(!player.has_permission("server.stop"));

    player.set_op(true);
    assert!(player.has_permission("server.stop"));

    let node = registry.lookup("server.stop").expect("registered");
    assert!(player.has_node(&node));
}

#[test]
fn diamond_tie_break_is_reproducible() {
    let build = || {
        registry(vec![
            PermissionNode::new("root")
                .with_default(PermissionDefault::True)
                .with_child("a", true)
                .with_child("b", true),
            PermissionNode::new("a").with_child("x", false),
            PermissionNode::new("b").with_child("x", true),
        ])
    };

    for _ in 0..10 {
        let player = Player::new("p", &build());
        player.add_attachment("root", true);
        assert!(!player.has_permission("x"));
        assert!(player.has_permission("a"));
        assert!(player.has_permission("b"));
    }
}

#[test]
fn cyclic_graph_resolves() {
    let registry = registry(vec![
        PermissionNode::new("a").with_child("b", true),
        PermissionNode::new("b").with_child("a", true),
    ]);
    let player = Player::new("p", &registry);
    assert!(!player.has_permission("a"));
    assert!(!player.has_permission("b"));

    player.add_attachment("b", true);
    assert!(player.has_permission("a"));
    assert!(player.has_permission("b"));
}

#[test]
fn removal_contract() {
    let registry = registry(vec![]);
    let alice = Player::new("alice", &registry);
    let bob = Player::new("bob", &registry);

    let attachment = alice.add_attachment("home", true);

    let err = bob.remove_attachment(&attachment).expect_err("foreign");
    assert_eq!(err.kind(), ErrorKind::NotAttached);

    alice.remove_attachment(&attachment).expect("remove");
    assert_eq!(attachment.state(), AttachmentState::Removed);

    let err = alice.remove_attachment(&attachment).expect_err("already removed");
    assert_eq!(err.kind(), ErrorKind::NotAttached);
}

#[test]
fn throwing_callback_leaves_attachment_detached() {
    let registry = registry(vec![]);
    let player = Player::new("p", &registry);
    let attachment = player.perms.attach(
        AttachmentSpec::new()
            .registrant("flaky-plugin")
            .permission("fly", true)
            .on_removed(|_| Err("plugin crashed".into())),
    );

    let err = player.remove_attachment(&attachment).expect_err("callback error");
    assert_eq!(err.kind(), ErrorKind::RemovalCallback);
    assert!(err.to_string().contains("plugin crashed"));
    assert!(!attachment.is_active());
    assert!(!player.has_permission("fly"));
}

#[test]
fn config_loaded_registry() {
    let config = PermissionsConfig::from_toml_str(
        r#"
        [permissions."kit.vip"]
        description = "VIP kit bundle"
        children = { "kit.vip.claim" = true, "kit.starter.claim" = false }

        [permissions."kit.starter.claim"]
        default = true
    "#,
    )
    .expect("parse");

    let registry = Arc::new(PermissionRegistry::new());
    config.apply(&registry, false).expect("apply");

    let player = Player::new("p", &registry);
    assert!(player.has_permission("kit.starter.claim"));
    assert!(!player.has_permission("kit.vip.claim"));

    player.add_attachment("kit.vip", true);
    assert!(player.has_permission("kit.vip.claim"));
    assert!(!player.has_permission("kit.starter.claim"));
}

#[test]
fn effective_set_diagnostics() {
    let registry = registry(vec![PermissionNode::new("a").with_child("b", true)]);
    let player = Player::new("p", &registry);
    let attachment = player.add_attachment("a", true);

    let set = player.perms.effective_permissions();
    let entries = set.sorted();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].name, "a");
    assert!(entries[0].directly_set);
    assert_eq!(entries[1].name, "b");
    assert_eq!(entries[1].attachment, attachment.id());

    let json = serde_json::to_value(&player.perms.attachment_snapshots()).expect("serialize");
    assert_eq!(json[0]["permissions"]["a"], true);
}

// =============================================================================
// Concurrency
// =============================================================================

#[test]
fn concurrent_readers_with_mutating_owner() {
    let registry = registry(vec![PermissionNode::new("group.builder")
        .with_child("world.edit", true)
        .with_child("world.undo", true)]);
    let subject = PermissibleBase::new(registry);
    let attachment = subject.add_attachment("group.builder", true);
    let stop = Arc::new(AtomicBool::new(false));
    let reads = Arc::new(AtomicUsize::new(0));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let subject = subject.clone();
            let stop = Arc::clone(&stop);
            let reads = Arc::clone(&reads);
            thread::spawn(move || {
                loop {
                    // Both children come from one node: they must agree
                    let set = subject.effective_permissions();
                    assert_eq!(set.value("world.edit"), set.value("world.undo"));
                    let _ = subject.has_permission("world.edit");
                    reads.fetch_add(1, Ordering::Relaxed);
                    if stop.load(Ordering::Acquire) {
                        break;
                    }
                }
            })
        })
        .collect();

    for i in 0..200 {
        attachment
            .set_permission("group.builder", i % 2 == 0)
            .expect("set");
    }
    stop.store(true, Ordering::Release);

    for reader in readers {
        reader.join().expect("reader panicked");
    }

    // Last write was i = 199 → false
    assert!(!subject.has_permission("world.edit"));
    assert!(reads.load(Ordering::Relaxed) > 0);
}

#[test]
fn registry_rewrite_races_cache_rebuild() {
    let granting = || {
        PermissionNode::new("group.mod")
            .with_child("chat.mute", true)
            .with_child("chat.kick", true)
    };
    let revoking = || {
        PermissionNode::new("group.mod")
            .with_child("chat.mute", false)
            .with_child("chat.kick", false)
    };

    let registry = registry(vec![granting()]);
    let subject = PermissibleBase::new(Arc::clone(&registry));
    subject.add_attachment("group.mod", true);
    let stop = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let subject = subject.clone();
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let mut outcomes = [0usize; 2];
                loop {
                    let set = subject.effective_permissions();
                    let pair = (set.value("chat.mute"), set.value("chat.kick"));
                    match pair {
                        (Some(true), Some(true)) => outcomes[0] += 1,
                        (Some(false), Some(false)) => outcomes[1] += 1,
                        other => panic!("half-applied node definition: {other:?}"),
                    }
                    assert!(subject.is_permission_set("group.mod"));
                    assert!(!subject.is_permission_set("chat.mute"));
                    if stop.load(Ordering::Acquire) {
                        break outcomes;
                    }
                }
            })
        })
        .collect();

    for i in 0..200 {
        let node = if i % 2 == 0 { revoking() } else { granting() };
        registry.register_or_replace(node);
    }
    stop.store(true, Ordering::Release);

    let mut total = 0;
    for reader in readers {
        let outcomes = reader.join().expect("reader panicked");
        total += outcomes[0] + outcomes[1];
    }
    assert!(total > 0);

    // Last write was i = 199 → granting
    assert!(subject.has_permission("chat.mute"));
    assert!(subject.has_permission("chat.kick"));
}

#[test]
fn concurrent_attach_and_remove() {
    let subject = PermissibleBase::new(registry(vec![]));

    let workers: Vec<_> = (0..4)
        .map(|i| {
            let subject = subject.clone();
            thread::spawn(move || {
                for j in 0..50 {
                    let attachment = subject.add_attachment(&format!("w{i}.p{j}"), true);
                    assert!(subject.has_permission(&format!("w{i}.p{j}")));
                    subject.remove_attachment(&attachment).expect("remove own");
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().expect("worker panicked");
    }

    assert!(subject.attachments().is_empty());
    assert!(subject.effective_permissions().is_empty());
}
