use serde::Serialize;

use crate::expansion::ExpansionService;
use crate::search::Filter;
use crate::selection::SelectionService;
use crate::tree::Tree;

/// A flattened tree row for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeRow {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub depth: usize,
    pub has_children: bool,
    pub expanded: bool,
    pub selected: bool,
    pub selectable: bool,
    #[serde(skip)]
    pub is_last_at_depth: Vec<bool>,
    /// Char indices of `name` matched by the active filter.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub highlight: Vec<usize>,
}

/// Flatten the tree into the rows currently visible.
///
/// Collapsed nodes have their children hidden. While a filter is active,
/// only matches and their ancestors are shown, and ancestors of a match are
/// walked even when collapsed.
pub fn flatten(
    tree: &Tree,
    expansion: &ExpansionService,
    selection: &SelectionService,
    filter: Option<&Filter>,
) -> Vec<TreeRow> {
    let ctx = Context {
        tree,
        expansion,
        selection,
        filter,
    };
    let roots = ctx.visible(tree.roots());
    let mut rows = Vec::new();
    for (i, root) in roots.iter().enumerate() {
        let is_last = i == roots.len() - 1;
        ctx.flatten_node(&mut rows, root, 0, &mut vec![is_last]);
    }
    rows
}

struct Context<'a> {
    tree: &'a Tree,
    expansion: &'a ExpansionService,
    selection: &'a SelectionService,
    filter: Option<&'a Filter>,
}

impl<'a> Context<'a> {
    fn visible(&self, ids: &'a [String]) -> Vec<&'a str> {
        ids.iter()
            .map(String::as_str)
            .filter(|id| self.filter.map_or(true, |f| f.is_visible(id)))
            .collect()
    }

    fn flatten_node(
        &self,
        rows: &mut Vec<TreeRow>,
        id: &str,
        depth: usize,
        is_last_at_depth: &mut Vec<bool>,
    ) {
        let Some(node) = self.tree.get(id) else {
            return;
        };
        let expanded = node.is_expandable() && self.expansion.is_expanded(id);

        rows.push(TreeRow {
            id: node.id.clone(),
            name: node.name.clone(),
            description: node.description.clone(),
            depth,
            has_children: node.is_composite(),
            expanded,
            selected: self.selection.is_selected(id),
            selectable: node.is_selectable(),
            is_last_at_depth: is_last_at_depth.clone(),
            highlight: self
                .filter
                .and_then(|f| f.highlight(id))
                .map(<[usize]>::to_vec)
                .unwrap_or_default(),
        });

        // Non-expandable composites always show their children.
        let open = match self.filter {
            Some(_) => true,
            None => expanded || (node.is_composite() && !node.is_expandable()),
        };
        if !open {
            return;
        }

        let children = self.visible(node.child_ids());
        for (i, child) in children.iter().enumerate() {
            is_last_at_depth.push(i == children.len() - 1);
            self.flatten_node(rows, child, depth + 1, is_last_at_depth);
            is_last_at_depth.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::SelectionMode;
    use crate::source::JsonSource;

    const DOC: &str = r#"[
        {"id": "a", "expanded": true, "children": [
            {"id": "a1"},
            {"id": "a2", "children": [{"id": "a2x"}]}
        ]},
        {"id": "b"}
    ]"#;

    fn setup() -> (Tree, ExpansionService, SelectionService) {
        let mut tree = Tree::new(Box::new(JsonSource::parse(DOC).unwrap()));
        let mut expansion = ExpansionService::new();
        tree.refresh(None, &mut expansion).unwrap();
        (tree, expansion, SelectionService::new())
    }

    fn ids(rows: &[TreeRow]) -> Vec<&str> {
        rows.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn collapsed_children_hidden() {
        let (tree, expansion, selection) = setup();
        let rows = flatten(&tree, &expansion, &selection, None);
        assert_eq!(ids(&rows), vec!["a", "a1", "a2", "b"]);
        assert_eq!(rows[1].depth, 1);
        assert!(rows[0].expanded);
        assert!(rows[2].has_children);
        assert!(!rows[2].expanded);
        assert!(!rows[3].has_children);
    }

    #[test]
    fn last_at_depth_flags() {
        let (tree, expansion, selection) = setup();
        let rows = flatten(&tree, &expansion, &selection, None);
        assert_eq!(rows[0].is_last_at_depth, vec![false]);
        assert_eq!(rows[1].is_last_at_depth, vec![false, false]);
        assert_eq!(rows[2].is_last_at_depth, vec![false, true]);
        assert_eq!(rows[3].is_last_at_depth, vec![true]);
    }

    #[test]
    fn selected_flag() {
        let (tree, expansion, mut selection) = setup();
        selection.select(tree.get("a1").unwrap(), SelectionMode::Single, &[]);
        let rows = flatten(&tree, &expansion, &selection, None);
        assert!(rows[1].selected);
        assert!(!rows[0].selected);
    }

    #[test]
    fn filter_shows_matches_and_ancestors() {
        let (mut tree, mut expansion, selection) = setup();
        tree.refresh(Some("a2"), &mut expansion).unwrap();
        let filter = Filter::new(&tree, "a2x");
        let rows = flatten(&tree, &expansion, &selection, Some(&filter));
        assert_eq!(ids(&rows), vec!["a", "a2", "a2x"]);
        assert_eq!(rows[2].highlight, vec![0, 1, 2]);
        assert_eq!(rows[1].is_last_at_depth, vec![true, true]);
    }
}
