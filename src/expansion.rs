use std::collections::HashSet;

use crate::node::TreeNode;
use crate::tree::Tree;

/// Expanded/collapsed state per node.
///
/// Only expandable nodes are ever recorded; everything else reads as
/// collapsed.
#[derive(Debug, Default, Clone)]
pub struct ExpansionService {
    expanded: HashSet<String>,
}

impl ExpansionService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_expanded(&self, id: &str) -> bool {
        self.expanded.contains(id)
    }

    /// Record a state directly. Returns whether it changed.
    pub fn set_expanded(&mut self, id: &str, expanded: bool) -> bool {
        if expanded {
            self.expanded.insert(id.to_string())
        } else {
            self.expanded.remove(id)
        }
    }

    /// Collapsed → expanded. False for non-expandable or already expanded nodes.
    pub fn expand(&mut self, node: &TreeNode) -> bool {
        node.is_expandable() && self.set_expanded(&node.id, true)
    }

    /// Expanded → collapsed. False for leaves and already collapsed nodes.
    pub fn collapse(&mut self, node: &TreeNode) -> bool {
        node.is_expandable() && self.set_expanded(&node.id, false)
    }

    /// Flip an expandable node, returning its new state.
    pub fn toggle(&mut self, node: &TreeNode) -> Option<bool> {
        if !node.is_expandable() {
            return None;
        }
        let expanded = !self.is_expanded(&node.id);
        self.set_expanded(&node.id, expanded);
        Some(expanded)
    }

    /// Collapse `id` and every expandable node below it, deepest first.
    /// Returns the ids that actually changed.
    pub fn collapse_all(&mut self, tree: &Tree, id: &str) -> Vec<String> {
        let mut subtree: Vec<&TreeNode> = tree.subtree(id).collect();
        subtree.reverse();
        subtree
            .into_iter()
            .filter(|node| self.collapse(node))
            .map(|node| node.id.clone())
            .collect()
    }

    pub fn forget(&mut self, id: &str) {
        self.expanded.remove(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeSpec;
    use crate::source::JsonSource;

    fn composite(id: &str) -> TreeNode {
        TreeNode::from_spec(&NodeSpec::composite(id, id), None)
    }

    fn leaf(id: &str) -> TreeNode {
        TreeNode::from_spec(&NodeSpec::leaf(id, id), None)
    }

    #[test]
    fn expand_then_expand_again() {
        let mut svc = ExpansionService::new();
        let node = composite("a");
        assert!(svc.expand(&node));
        assert!(!svc.expand(&node));
        assert!(svc.is_expanded("a"));
    }

    #[test]
    fn collapse_leaf_and_collapsed() {
        let mut svc = ExpansionService::new();
        assert!(!svc.collapse(&leaf("x")));
        assert!(!svc.collapse(&composite("a")));
        svc.expand(&composite("a"));
        assert!(svc.collapse(&composite("a")));
    }

    #[test]
    fn leaf_cannot_be_expanded_or_toggled() {
        let mut svc = ExpansionService::new();
        assert!(!svc.expand(&leaf("x")));
        assert_eq!(svc.toggle(&leaf("x")), None);
        assert!(!svc.is_expanded("x"));
    }

    #[test]
    fn toggle_flips() {
        let mut svc = ExpansionService::new();
        let node = composite("a");
        assert_eq!(svc.toggle(&node), Some(true));
        assert_eq!(svc.toggle(&node), Some(false));
    }

    #[test]
    fn collapse_all_only_touches_subtree() {
        let mut tree = Tree::new(Box::new(
            JsonSource::parse(
                r#"{"id": "1", "expanded": true, "children": [
                    {"id": "1.1", "expanded": true, "children": [{"id": "1.1.1"}]},
                    {"id": "1.2", "expanded": true, "children": [
                        {"id": "1.2.1", "expanded": true, "children": [{"id": "1.2.1.1"}]},
                        {"id": "1.2.2"}
                    ]}
                ]}"#,
            )
            .unwrap(),
        ));
        let mut svc = ExpansionService::new();
        tree.refresh(None, &mut svc).unwrap();

        let changed = svc.collapse_all(&tree, "1.2");
        assert_eq!(changed, vec!["1.2.1", "1.2"]);
        assert!(svc.is_expanded("1"));
        assert!(svc.is_expanded("1.1"));
        assert!(!svc.is_expanded("1.2"));
        assert!(!svc.is_expanded("1.2.1"));

        assert!(svc.collapse_all(&tree, "1.2").is_empty());
    }
}
