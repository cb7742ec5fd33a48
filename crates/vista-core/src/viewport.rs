//! Mount points ("viewports") and their reconciliation across redraws.

use vista_dom::{h, Node};

use crate::collections::IdMap;
use crate::runtime::Runtime;

pub const DEFAULT_VIEWPORT_MARKER: &str = "viewport";

/// Builds an empty mount point for the component registered under `id`.
pub fn viewport(id: &str) -> Node {
    h("div").class(DEFAULT_VIEWPORT_MARKER).id(id).build()
}

pub(crate) fn is_mount_point(node: &Node, marker: &str) -> bool {
    node.is_element() && node.has_class(marker)
}

/// Finds every mount point below `root`, however deeply nested.
///
/// Mount points without an id are ignored. When two share an id the first
/// one in document order wins.
pub fn discover(root: &Node, marker: &str) -> IdMap<Node> {
    let mut found = IdMap::default();
    for node in root.descendants() {
        if !is_mount_point(&node, marker) {
            continue;
        }
        let Some(id) = node.id() else {
            continue;
        };
        if found.contains_key(&id) {
            log::warn!("duplicate viewport id `{id}`; keeping the first occurrence");
            continue;
        }
        found.insert(id, node);
    }
    found
}

/// What a call to [`ViewportResolver::reconcile`] did, by viewport id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Still occupied after the patch; left untouched.
    pub kept: Vec<String>,
    /// Vacant, filled with the drawn root of an already registered instance.
    pub reattached: Vec<String>,
    /// Vacant, filled by a newly created instance.
    pub created: Vec<String>,
    /// Gone from the tree; their instances were destroyed.
    pub destroyed: Vec<String>,
    /// Vacant with nothing to put there.
    pub vacant: Vec<String>,
}

impl ReconcileReport {
    pub fn is_quiet(&self) -> bool {
        self.reattached.is_empty() && self.created.is_empty() && self.destroyed.is_empty()
    }
}

pub struct ViewportResolver<'a> {
    runtime: &'a Runtime,
}

impl<'a> ViewportResolver<'a> {
    pub fn new(runtime: &'a Runtime) -> Self {
        Self { runtime }
    }

    /// Fills the mount points of a freshly rendered subtree.
    pub fn mount_all(&self, found: &IdMap<Node>) -> ReconcileReport {
        self.reconcile(IdMap::default(), found)
    }

    pub fn reconcile(&self, mut old: IdMap<Node>, new: &IdMap<Node>) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        for (id, node) in new {
            old.shift_remove(id);
            if node.has_child_nodes() {
                report.kept.push(id.clone());
                continue;
            }
            if let Some(instance) = self.runtime.instance(id) {
                node.append_child(&instance.root());
                report.reattached.push(id.clone());
                continue;
            }
            let Some(definition) = self.runtime.component(id) else {
                report.vacant.push(id.clone());
                continue;
            };
            match self.runtime.mount_component(definition, node) {
                Ok(_) => report.created.push(id.clone()),
                Err(err) => {
                    log::error!("failed to mount nested viewport `{id}`: {err}");
                    report.vacant.push(id.clone());
                }
            }
        }
        for id in old.keys() {
            if self.runtime.unmount(id) {
                report.destroyed.push(id.clone());
            }
        }
        if !report.is_quiet() {
            log::debug!(
                "viewports reconciled: {} reattached, {} created, {} destroyed",
                report.reattached.len(),
                report.created.len(),
                report.destroyed.len()
            );
        }
        report
    }
}
