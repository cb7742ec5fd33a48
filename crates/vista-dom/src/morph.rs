//! In-place tree patching.
//!
//! [`morph`] walks a live tree (`from`) alongside a freshly built one
//! (`to`) and mutates `from` until it has the same shape, reusing as many
//! existing nodes as it can. Children are matched by key when
//! [`MorphHooks::node_key`] yields one (a keyed node may be moved from
//! anywhere in the indexed part of the live tree) and by position
//! otherwise. Nodes of `to` that have no counterpart are moved into the
//! live tree, so `to` is consumed by the call.

use hashbrown::HashMap;

use crate::node::Node;

/// Policy callbacks consulted while morphing.
pub trait MorphHooks {
    /// Stable identity used to match children across trees.
    fn node_key(&self, node: &Node) -> Option<String> {
        node.id()
    }

    /// Called before `from` is updated to match `to`. Returning `false`
    /// leaves `from` and its whole subtree untouched.
    fn before_element_updated(&mut self, from: &Node, to: &Node) -> bool {
        let _ = (from, to);
        true
    }

    /// Called before a live node without counterpart is removed. Returning
    /// `false` keeps it in place.
    fn before_node_discarded(&mut self, node: &Node) -> bool {
        let _ = node;
        true
    }

    /// Whether keyed nodes below `node` may be matched (and moved) from
    /// elsewhere in the tree.
    fn should_index(&self, node: &Node) -> bool {
        let _ = node;
        true
    }
}

#[derive(Debug, Default)]
pub struct DefaultMorphHooks;

impl MorphHooks for DefaultMorphHooks {}

/// Counts of the mutations performed by one [`morph`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MorphStats {
    pub updated: usize,
    pub inserted: usize,
    pub moved: usize,
    pub removed: usize,
    pub replaced: usize,
}

impl MorphStats {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Mutates `from` to match `to`. When the two roots are incompatible
/// (different kinds or tags) `from` is replaced by `to` outright.
pub fn morph(from: &Node, to: &Node, hooks: &mut dyn MorphHooks) -> MorphStats {
    let mut morpher = Morpher {
        hooks,
        keyed: HashMap::new(),
        stats: MorphStats::default(),
    };
    if !compatible(from, to) {
        from.replace_with(to);
        morpher.stats.replaced += 1;
        return morpher.stats;
    }
    morpher.index(from);
    morpher.morph_node(from, to);
    morpher.stats
}

fn compatible(a: &Node, b: &Node) -> bool {
    (a.is_text() && b.is_text()) || (a.is_element() && a.tag() == b.tag())
}

struct Morpher<'h> {
    hooks: &'h mut dyn MorphHooks,
    keyed: HashMap<String, Node>,
    stats: MorphStats,
}

impl Morpher<'_> {
    fn index(&mut self, node: &Node) {
        for child in node.children() {
            if let Some(key) = self.hooks.node_key(&child) {
                self.keyed.entry(key).or_insert_with(|| child.clone());
            }
            if self.hooks.should_index(&child) {
                self.index(&child);
            }
        }
    }

    fn morph_node(&mut self, from: &Node, to: &Node) {
        if from.is_text() {
            if let Some(content) = to.text_value() {
                if from.set_text(content) {
                    self.stats.updated += 1;
                }
            }
            return;
        }
        if !self.hooks.before_element_updated(from, to) {
            return;
        }
        if sync_attributes(from, to) {
            self.stats.updated += 1;
        }
        self.morph_children(from, to);
    }

    fn morph_children(&mut self, from_parent: &Node, to_parent: &Node) {
        let mut index = 0;
        for to_child in to_parent.children() {
            let current = from_parent.child_at(index);
            let key = self.hooks.node_key(&to_child);
            let matched = match &key {
                Some(key) => self.take_keyed(from_parent, current.as_ref(), key, &to_child),
                None => current.clone().filter(|candidate| {
                    self.hooks.node_key(candidate).is_none() && compatible(candidate, &to_child)
                }),
            };
            match matched {
                Some(node) => self.morph_node(&node, &to_child),
                None => {
                    from_parent.insert_before(&to_child, current.as_ref());
                    self.stats.inserted += 1;
                }
            }
            index += 1;
        }

        let mut position = index;
        while let Some(leftover) = from_parent.child_at(position) {
            if self.hooks.before_node_discarded(&leftover) {
                leftover.remove();
                self.stats.removed += 1;
            } else {
                position += 1;
            }
        }
    }

    fn take_keyed(
        &mut self,
        from_parent: &Node,
        current: Option<&Node>,
        key: &str,
        to_child: &Node,
    ) -> Option<Node> {
        if let Some(current) = current {
            let current_key = self.hooks.node_key(current);
            if current_key.as_deref() == Some(key) && compatible(current, to_child) {
                self.keyed.remove(key);
                return Some(current.clone());
            }
        }
        let found = self.keyed.get(key)?.clone();
        if !compatible(&found, to_child) || found.contains(from_parent) {
            return None;
        }
        self.keyed.remove(key);
        from_parent.insert_before(&found, current);
        self.stats.moved += 1;
        Some(found)
    }
}

fn sync_attributes(from: &Node, to: &Node) -> bool {
    let mut changed = false;
    let target = to.attributes();
    for (name, _) in from.attributes() {
        if !target.iter().any(|(candidate, _)| *candidate == name) {
            changed |= from.remove_attribute(&name);
        }
    }
    for (name, value) in target {
        changed |= from.set_attribute(name, value);
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html::{h, text};

    fn list(items: &[(&str, &str)]) -> Node {
        h("ul")
            .children(items.iter().map(|(id, label)| h("li").id(id).text(label)))
            .build()
    }

    #[test]
    fn identical_trees_produce_no_mutations() {
        let live = list(&[("a", "A"), ("b", "B")]);
        let next = list(&[("a", "A"), ("b", "B")]);
        let stats = morph(&live, &next, &mut DefaultMorphHooks);
        assert!(stats.is_empty(), "{stats:?}");
    }

    #[test]
    fn keyed_children_keep_identity_when_reordered() {
        let live = list(&[("a", "A"), ("b", "B"), ("c", "C")]);
        let b = live.child_at(1).expect("b");
        let next = list(&[("b", "B"), ("a", "A"), ("c", "C")]);
        let stats = morph(&live, &next, &mut DefaultMorphHooks);
        assert!(live.child_at(0).is_some_and(|n| n.ptr_eq(&b)));
        assert_eq!(stats.moved, 1);
        assert_eq!(live.to_html(), next_html(&[("b", "B"), ("a", "A"), ("c", "C")]));
    }

    fn next_html(items: &[(&str, &str)]) -> String {
        list(items).to_html()
    }

    #[test]
    fn text_and_attribute_changes_update_in_place() {
        let live = h("p").class("a").child(text("one")).build();
        let text_node = live.child_at(0).expect("text");
        let next = h("p").class("b").child(text("two")).build();
        let stats = morph(&live, &next, &mut DefaultMorphHooks);
        assert_eq!(live.to_html(), r#"<p class="b">two</p>"#);
        assert!(live.child_at(0).is_some_and(|n| n.ptr_eq(&text_node)));
        assert_eq!(stats.updated, 2);
    }

    #[test]
    fn surplus_children_are_removed_and_missing_ones_inserted() {
        let live = list(&[("a", "A"), ("b", "B")]);
        let next = list(&[("b", "B"), ("c", "C")]);
        let stats = morph(&live, &next, &mut DefaultMorphHooks);
        assert_eq!(live.to_html(), next_html(&[("b", "B"), ("c", "C")]));
        assert_eq!(stats.inserted, 1);
        assert_eq!(stats.removed, 1);
    }

    #[test]
    fn incompatible_roots_are_replaced() {
        let parent = h("div").build();
        let live = h("span").build();
        parent.append_child(&live);
        let next = h("p").build();
        let stats = morph(&live, &next, &mut DefaultMorphHooks);
        assert_eq!(stats.replaced, 1);
        assert!(parent.child_at(0).is_some_and(|n| n.ptr_eq(&next)));
    }

    struct KeepEverything;

    impl MorphHooks for KeepEverything {
        fn before_node_discarded(&mut self, _node: &Node) -> bool {
            false
        }
    }

    #[test]
    fn discard_veto_keeps_nodes() {
        let live = list(&[("a", "A"), ("b", "B")]);
        let next = list(&[("a", "A")]);
        let stats = morph(&live, &next, &mut KeepEverything);
        assert_eq!(live.child_count(), 2);
        assert_eq!(stats.removed, 0);
    }

    struct SkipUpdates;

    impl MorphHooks for SkipUpdates {
        fn before_element_updated(&mut self, _from: &Node, _to: &Node) -> bool {
            false
        }
    }

    #[test]
    fn update_veto_leaves_subtree_alone() {
        let live = h("p").child(text("old")).build();
        let next = h("p").child(text("new")).build();
        morph(&live, &next, &mut SkipUpdates);
        assert_eq!(live.text_content(), "old");
    }
}
