//! Patch policy wrapped around [`vista_dom::morph`].
//!
//! Two rules on top of the plain tree diff: element pairs that are already
//! structurally equal are left alone, and nodes living inside a nested
//! mount point are never discarded, since they belong to another instance.

use vista_dom::{morph, MorphHooks, MorphStats, Node};

use crate::memo::memo_stamp;
use crate::runtime::RuntimeOptions;
use crate::viewport::is_mount_point;

pub struct PatchAdapter<'a> {
    root: &'a Node,
    marker: &'a str,
    key_attribute: &'a str,
}

impl<'a> PatchAdapter<'a> {
    pub fn new(root: &'a Node, options: &'a RuntimeOptions) -> Self {
        Self {
            root,
            marker: &options.viewport_marker,
            key_attribute: &options.key_attribute,
        }
    }

    fn inside_mount_point(&self, node: &Node) -> bool {
        let mut cursor = node.parent();
        while let Some(ancestor) = cursor {
            if ancestor.ptr_eq(self.root) {
                return false;
            }
            if is_mount_point(&ancestor, self.marker) {
                return true;
            }
            cursor = ancestor.parent();
        }
        false
    }
}

impl MorphHooks for PatchAdapter<'_> {
    fn node_key(&self, node: &Node) -> Option<String> {
        node.attribute(self.key_attribute).or_else(|| node.id())
    }

    fn before_element_updated(&mut self, from: &Node, to: &Node) -> bool {
        if let (Some(live), Some(next)) = (memo_stamp(from), memo_stamp(to)) {
            if live.same_output(&next) {
                from.set_annotation(to.annotation());
                return false;
            }
        }
        from.set_annotation(to.annotation());
        !structurally_equal(from, to, self.marker)
    }

    fn before_node_discarded(&mut self, node: &Node) -> bool {
        !self.inside_mount_point(node)
    }

    fn should_index(&self, node: &Node) -> bool {
        !is_mount_point(node, self.marker)
    }
}

/// Deep equality that does not look inside mount points: their content is
/// drawn by other instances and never part of a render output.
pub fn structurally_equal(live: &Node, rendered: &Node, marker: &str) -> bool {
    if live.ptr_eq(rendered) {
        return true;
    }
    if !live.is_equal_shallow(rendered) {
        return false;
    }
    if is_mount_point(live, marker) {
        return true;
    }
    let ours = live.children();
    let theirs = rendered.children();
    ours.len() == theirs.len()
        && ours
            .iter()
            .zip(theirs.iter())
            .all(|(a, b)| structurally_equal(a, b, marker))
}

/// Mutates `live` in place to match `rendered`.
pub fn patch(live: &Node, rendered: &Node, options: &RuntimeOptions) -> MorphStats {
    let mut adapter = PatchAdapter::new(live, options);
    let stats = morph(live, rendered, &mut adapter);
    log::trace!("patched `{}`: {stats:?}", live.tag().unwrap_or("#text"));
    stats
}
