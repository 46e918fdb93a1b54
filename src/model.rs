//! The tree view-model.
//!
//! [`TreeModel`] composes a [`Tree`], a [`SelectionService`] and an
//! [`ExpansionService`]. Operations that take an optional node fall back to
//! the most recently selected node when given `None`.

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};

use anyhow::Result;
use log::{debug, info, warn};

use crate::expansion::ExpansionService;
use crate::node::TreeNode;
use crate::rows::{self, TreeRow};
use crate::search::{self, Filter, SearchMatch};
use crate::selection::{SelectionMode, SelectionService};
use crate::source::TreeSource;
use crate::tree::{RefreshReport, Tree};

/// Notifications sent to subscribers after the model changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeEvent {
    Expansion { id: String, expanded: bool },
    Selection { selected: Vec<String> },
    /// Nodes were re-resolved from the source.
    Changed,
}

pub struct TreeModel {
    tree: Tree,
    selection: SelectionService,
    expansion: ExpansionService,
    filter: Option<Filter>,
    listeners: Vec<Sender<TreeEvent>>,
    last_error: Option<String>,
}

impl TreeModel {
    pub fn new(tree: Tree, selection: SelectionService, expansion: ExpansionService) -> Self {
        Self {
            tree,
            selection,
            expansion,
            filter: None,
            listeners: Vec::new(),
            last_error: None,
        }
    }

    /// Build a model over `source` and resolve its roots.
    pub fn load(source: Box<dyn TreeSource>) -> Result<Self> {
        let mut model = Self::new(
            Tree::new(source),
            SelectionService::new(),
            ExpansionService::new(),
        );
        model.refresh(None)?;
        info!("loaded tree with {} resolved nodes", model.tree.len());
        Ok(model)
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn selection(&self) -> &SelectionService {
        &self.selection
    }

    pub fn expansion(&self) -> &ExpansionService {
        &self.expansion
    }

    /// The most recent failure to resolve children, if any.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    /// Receive [`TreeEvent`]s. Dropping the receiver unsubscribes.
    pub fn subscribe(&mut self) -> Receiver<TreeEvent> {
        let (tx, rx) = mpsc::channel();
        self.listeners.push(tx);
        rx
    }

    fn emit(&mut self, event: TreeEvent) {
        self.listeners.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn emit_selection(&mut self) {
        let selected = self.selection.selected().to_vec();
        self.emit(TreeEvent::Selection { selected });
    }

    // ── Lookup ─────────────────────────────────────────────────────────

    pub fn get_node(&self, id: Option<&str>) -> Option<&TreeNode> {
        self.tree.get_node(id)
    }

    pub fn validate_node(&self, node: &TreeNode) -> Option<&TreeNode> {
        self.tree.validate_node(node)
    }

    pub fn is_expanded(&self, id: &str) -> bool {
        self.tree.get(id).is_some_and(TreeNode::is_expandable) && self.expansion.is_expanded(id)
    }

    pub fn most_recent_selected(&self) -> Option<&TreeNode> {
        self.tree.get_node(self.selection.most_recent())
    }

    pub fn selected_nodes(&self) -> Vec<&TreeNode> {
        self.selection
            .selected()
            .iter()
            .filter_map(|id| self.tree.get(id))
            .collect()
    }

    /// Resolve an operation target: the given id, or the most recently
    /// selected node. Unknown ids resolve to nothing.
    fn target(&self, id: Option<&str>) -> Option<String> {
        let id = id.or_else(|| self.selection.most_recent())?;
        self.tree.contains(id).then(|| id.to_string())
    }

    // ── Refresh ────────────────────────────────────────────────────────

    /// Re-resolve `id` (or everything, for `None`) from the source.
    pub fn refresh(&mut self, id: Option<&str>) -> Result<()> {
        let report = self.tree.refresh(id, &mut self.expansion)?;
        self.after_refresh(report);
        self.emit(TreeEvent::Changed);
        Ok(())
    }

    fn after_refresh(&mut self, report: RefreshReport) {
        let had_selection = !self.selection.selected().is_empty();
        for id in &report.removed {
            self.selection.forget(id);
        }
        if !report.removed.is_empty() {
            debug!("pruned {} vanished nodes", report.removed.len());
        }
        self.reapply_filter();
        if had_selection && self.selection.selected().is_empty() {
            self.emit_selection();
        }
    }

    /// Lazily resolve the children of a node being shown. Failures are
    /// logged and kept as [`last_error`](Self::last_error); the node keeps
    /// its previous children.
    fn resolve_children(&mut self, id: &str) {
        match self.tree.refresh(Some(id), &mut self.expansion) {
            Ok(report) => self.after_refresh(report),
            Err(e) => {
                warn!("{e:#}");
                self.last_error = Some(format!("{e:#}"));
            }
        }
    }

    // ── Expansion ──────────────────────────────────────────────────────

    /// Expand a collapsed node. Returns false when the target is missing,
    /// not expandable, or already expanded.
    pub fn expand_node(&mut self, id: Option<&str>) -> bool {
        let Some(id) = self.target(id) else {
            return false;
        };
        let Some(node) = self.tree.get(&id) else {
            return false;
        };
        if !self.expansion.expand(node) {
            return false;
        }
        debug!("expanded '{id}'");
        self.resolve_children(&id);
        self.emit(TreeEvent::Expansion { id, expanded: true });
        true
    }

    /// Collapse an expanded node. Returns false for leaves, collapsed
    /// nodes, and missing targets. Selected descendants that become hidden
    /// hand the selection to the collapsed node.
    pub fn collapse_node(&mut self, id: Option<&str>) -> bool {
        let Some(id) = self.target(id) else {
            return false;
        };
        let Some(node) = self.tree.get(&id) else {
            return false;
        };
        if !self.expansion.collapse(node) {
            return false;
        }
        debug!("collapsed '{id}'");
        self.emit(TreeEvent::Expansion {
            id: id.clone(),
            expanded: false,
        });
        self.select_if_hiding_selection(&id);
        true
    }

    /// Collapse a node and every expandable node below it. Returns true if
    /// at least one node changed; nodes outside the subtree are untouched.
    pub fn collapse_all(&mut self, id: Option<&str>) -> bool {
        let Some(id) = self.target(id) else {
            return false;
        };
        let changed = self.expansion.collapse_all(&self.tree, &id);
        if changed.is_empty() {
            return false;
        }
        debug!("collapsed {} nodes under '{id}'", changed.len());
        for id in changed {
            self.emit(TreeEvent::Expansion {
                id,
                expanded: false,
            });
        }
        self.select_if_hiding_selection(&id);
        true
    }

    /// Expand a node and every expandable node below it, resolving children
    /// along the way. Non-expandable composites are walked through. Returns
    /// true if at least one node changed.
    pub fn expand_all(&mut self, id: Option<&str>) -> bool {
        let Some(id) = self.target(id) else {
            return false;
        };
        let mut changed = false;
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            let Some(node) = self.tree.get(&id) else {
                continue;
            };
            if node.is_leaf() {
                continue;
            }
            if self.expansion.expand(node) {
                changed = true;
                self.emit(TreeEvent::Expansion {
                    id: id.clone(),
                    expanded: true,
                });
            }
            self.resolve_children(&id);
            stack.extend(self.tree.children(&id).iter().rev().cloned());
        }
        changed
    }

    /// Flip a node's expansion immediately. Returns false when the target
    /// is missing or not expandable.
    pub fn toggle_node_expansion(&mut self, id: Option<&str>) -> bool {
        let Some(id) = self.target(id) else {
            return false;
        };
        let Some(node) = self.tree.get(&id) else {
            return false;
        };
        let Some(expanded) = self.expansion.toggle(node) else {
            return false;
        };
        debug!("toggled '{id}' to expanded={expanded}");
        if expanded {
            self.resolve_children(&id);
        }
        self.emit(TreeEvent::Expansion {
            id: id.clone(),
            expanded,
        });
        if !expanded {
            self.select_if_hiding_selection(&id);
        }
        true
    }

    fn select_if_hiding_selection(&mut self, id: &str) {
        let hides = self
            .selection
            .selected()
            .iter()
            .any(|s| self.tree.is_descendant(s, id));
        if hides {
            self.select_node(id, SelectionMode::Single);
        }
    }

    // ── Selection ──────────────────────────────────────────────────────

    /// Select a node. Returns false for unknown or unselectable nodes.
    pub fn select_node(&mut self, id: &str, mode: SelectionMode) -> bool {
        let Some(node) = self.tree.get(id) else {
            return false;
        };
        let selectable: Vec<TreeRow> = match mode {
            SelectionMode::Range => self.rows().into_iter().filter(|r| r.selectable).collect(),
            _ => Vec::new(),
        };
        let order: Vec<&str> = selectable.iter().map(|r| r.id.as_str()).collect();
        if !self.selection.select(node, mode, &order) {
            return false;
        }
        debug!("selected '{id}' ({mode:?})");
        self.emit_selection();
        true
    }

    pub fn deselect_node(&mut self, id: &str) -> bool {
        if !self.selection.deselect(id) {
            return false;
        }
        self.emit_selection();
        true
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
        self.emit_selection();
    }

    // ── Rows & navigation ──────────────────────────────────────────────

    /// Visible rows, honoring collapsed nodes and the active filter.
    pub fn rows(&self) -> Vec<TreeRow> {
        rows::flatten(
            &self.tree,
            &self.expansion,
            &self.selection,
            self.filter.as_ref(),
        )
    }

    /// Select the first selectable row at or after `start`, or at or before
    /// it when walking backwards.
    fn select_row_from(&mut self, rows: &[TreeRow], start: usize, forward: bool) -> bool {
        let found = if forward {
            rows[start..].iter().find(|r| r.selectable)
        } else {
            rows[..=start].iter().rev().find(|r| r.selectable)
        };
        match found {
            Some(row) => {
                let id = row.id.clone();
                self.select_node(&id, SelectionMode::Single)
            }
            None => false,
        }
    }

    fn focus_index(&self, rows: &[TreeRow]) -> Option<usize> {
        let focus = self.selection.most_recent()?;
        rows.iter().position(|r| r.id == focus)
    }

    pub fn select_next(&mut self) -> bool {
        let rows = self.rows();
        if rows.is_empty() {
            return false;
        }
        match self.focus_index(&rows) {
            Some(i) if i + 1 < rows.len() => self.select_row_from(&rows, i + 1, true),
            Some(_) => false,
            None => self.select_row_from(&rows, 0, true),
        }
    }

    pub fn select_prev(&mut self) -> bool {
        let rows = self.rows();
        if rows.is_empty() {
            return false;
        }
        match self.focus_index(&rows) {
            Some(0) => false,
            Some(i) => self.select_row_from(&rows, i - 1, false),
            None => self.select_row_from(&rows, rows.len() - 1, false),
        }
    }

    pub fn select_first(&mut self) -> bool {
        let rows = self.rows();
        !rows.is_empty() && self.select_row_from(&rows, 0, true)
    }

    pub fn select_last(&mut self) -> bool {
        let rows = self.rows();
        !rows.is_empty() && self.select_row_from(&rows, rows.len() - 1, false)
    }

    /// Select the nearest selectable ancestor of the most recent selection.
    pub fn select_parent(&mut self) -> bool {
        let Some(focus) = self.selection.most_recent() else {
            return false;
        };
        let parent = self
            .tree
            .ancestors(focus)
            .into_iter()
            .find(|a| self.tree.get(a).is_some_and(TreeNode::is_selectable))
            .map(str::to_string);
        match parent {
            Some(p) => self.select_node(&p, SelectionMode::Single),
            None => false,
        }
    }

    /// Right-arrow behavior: expand a collapsed node, otherwise step into
    /// its first selectable child.
    pub fn expand_or_select_first_child(&mut self) -> bool {
        let Some(focus) = self.selection.most_recent().map(str::to_string) else {
            return false;
        };
        if self.tree.get(&focus).is_some_and(TreeNode::is_expandable) && !self.is_expanded(&focus)
        {
            return self.expand_node(Some(&focus));
        }
        let child = self
            .tree
            .children(&focus)
            .iter()
            .find(|c| {
                self.tree.get(c).is_some_and(TreeNode::is_selectable)
                    && self.filter.as_ref().map_or(true, |f| f.is_visible(c))
            })
            .cloned();
        match child {
            Some(c) => self.select_node(&c, SelectionMode::Single),
            None => false,
        }
    }

    /// Left-arrow behavior: collapse an expanded node, otherwise step out
    /// to its parent.
    pub fn collapse_or_select_parent(&mut self) -> bool {
        if self.collapse_node(None) {
            return true;
        }
        self.select_parent()
    }

    /// Expand every ancestor of `id` and select it.
    pub fn reveal(&mut self, id: &str) -> bool {
        if !self.tree.contains(id) {
            return false;
        }
        let ancestors: Vec<String> = self
            .tree
            .ancestors(id)
            .into_iter()
            .rev()
            .map(str::to_string)
            .collect();
        for ancestor in &ancestors {
            self.expand_node(Some(ancestor));
        }
        if self.tree.get(id).is_some_and(TreeNode::is_selectable) {
            self.select_node(id, SelectionMode::Single);
        }
        true
    }

    // ── Search ─────────────────────────────────────────────────────────

    pub fn search(&self, query: &str) -> Vec<SearchMatch> {
        search::search(&self.tree, query)
    }

    /// Restrict visible rows to matches of `query` and their ancestors.
    /// `None` or an empty query clears the filter. Returns whether the
    /// active query changed.
    pub fn set_filter(&mut self, query: Option<&str>) -> bool {
        let query = query.filter(|q| !q.is_empty());
        if self.filter.as_ref().map(Filter::query) == query {
            return false;
        }
        self.filter = query.map(|q| Filter::new(&self.tree, q));
        true
    }

    pub fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    fn reapply_filter(&mut self) {
        if let Some(query) = self.filter.as_ref().map(|f| f.query().to_string()) {
            self.filter = Some(Filter::new(&self.tree, &query));
        }
    }

    /// Reveal and select the next filter match after the most recent
    /// selection, wrapping around.
    pub fn select_next_match(&mut self) -> bool {
        self.step_match(true)
    }

    pub fn select_prev_match(&mut self) -> bool {
        self.step_match(false)
    }

    fn step_match(&mut self, forward: bool) -> bool {
        let Some(filter) = &self.filter else {
            return false;
        };
        let matches = filter.matches();
        if matches.is_empty() {
            return false;
        }
        let order: HashMap<&str, usize> = self
            .tree
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.as_str(), i))
            .collect();
        let pos = |id: &str| order.get(id).copied();
        let focus = self.selection.most_recent().and_then(|f| pos(f));

        let next = match (focus, forward) {
            (None, true) => matches.first(),
            (None, false) => matches.last(),
            (Some(f), true) => matches
                .iter()
                .find(|m| pos(m.as_str()).is_some_and(|p| p > f))
                .or_else(|| matches.first()),
            (Some(f), false) => matches
                .iter()
                .rev()
                .find(|m| pos(m.as_str()).is_some_and(|p| p < f))
                .or_else(|| matches.last()),
        }
        .cloned();

        match next {
            Some(id) => self.reveal(&id),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::JsonSource;

    fn model(json: &str) -> TreeModel {
        TreeModel::load(Box::new(JsonSource::parse(json).unwrap())).unwrap()
    }

    const DOC: &str = r#"{"id": "1", "expanded": true, "children": [
        {"id": "1.1", "children": [{"id": "1.1.1"}]},
        {"id": "1.2", "children": [
            {"id": "1.2.1", "children": [{"id": "1.2.1.1"}]},
            {"id": "1.2.2"}
        ]},
        {"id": "1.3"}
    ]}"#;

    fn visible(m: &TreeModel) -> Vec<String> {
        m.rows().into_iter().map(|r| r.id).collect()
    }

    #[test]
    fn expand_resolves_children_lazily() {
        let mut m = model(DOC);
        assert!(m.get_node(Some("1.1.1")).is_none());
        assert!(m.expand_node(Some("1.1")));
        assert!(m.get_node(Some("1.1.1")).is_some());
        assert!(!m.expand_node(Some("1.1")), "already expanded");
    }

    #[test]
    fn expand_leaf_or_unknown_fails() {
        let mut m = model(DOC);
        assert!(!m.expand_node(Some("1.3")));
        assert!(!m.expand_node(Some("nope")));
        assert!(!m.expand_node(None));
    }

    #[test]
    fn implicit_target_is_most_recent_selection() {
        let mut m = model(DOC);
        m.select_node("1.1", SelectionMode::Single);
        m.select_node("1.2", SelectionMode::Single);
        assert!(m.expand_node(None));
        assert!(m.is_expanded("1.2"));
        assert!(!m.is_expanded("1.1"));
    }

    #[test]
    fn collapse_moves_hidden_selection_to_collapsed_node() {
        let mut m = model(DOC);
        m.expand_node(Some("1.2"));
        m.select_node("1.2.2", SelectionMode::Single);
        assert!(m.collapse_node(Some("1.2")));
        assert_eq!(m.selection().most_recent(), Some("1.2"));
    }

    #[test]
    fn toggle_is_immediate() {
        let mut m = model(DOC);
        assert!(m.toggle_node_expansion(Some("1.1")));
        assert!(m.is_expanded("1.1"));
        assert!(m.toggle_node_expansion(Some("1.1")));
        assert!(!m.is_expanded("1.1"));
        assert!(!m.toggle_node_expansion(Some("1.3")));
    }

    #[test]
    fn expand_all_then_collapse_all() {
        let mut m = model(DOC);
        assert!(m.expand_all(Some("1.2")));
        assert!(m.is_expanded("1.2.1"));
        assert!(m.get_node(Some("1.2.1.1")).is_some());
        assert!(!m.expand_all(Some("1.2")));

        assert!(m.collapse_all(Some("1")));
        assert!(!m.is_expanded("1"));
        assert!(!m.is_expanded("1.2.1"));
        assert!(!m.collapse_all(Some("1")));
    }

    #[test]
    fn navigation_walks_visible_rows() {
        let mut m = model(DOC);
        assert!(m.select_next());
        assert_eq!(m.selection().most_recent(), Some("1"));
        m.select_next();
        m.select_next();
        assert_eq!(m.selection().most_recent(), Some("1.2"));
        assert!(m.expand_or_select_first_child());
        assert!(m.is_expanded("1.2"));
        assert!(m.expand_or_select_first_child());
        assert_eq!(m.selection().most_recent(), Some("1.2.1"));
        assert!(m.collapse_or_select_parent());
        assert_eq!(m.selection().most_recent(), Some("1.2"));
        assert!(m.collapse_or_select_parent());
        assert!(!m.is_expanded("1.2"));
        assert!(m.select_last());
        assert_eq!(m.selection().most_recent(), Some("1.3"));
        assert!(!m.select_next());
        assert!(m.select_first());
        assert!(!m.select_prev());
    }

    #[test]
    fn navigation_skips_unselectable_rows() {
        let mut m = model(
            r#"[{"id": "a"}, {"id": "b", "selectable": false}, {"id": "c"}]"#,
        );
        m.select_node("a", SelectionMode::Single);
        assert!(m.select_next());
        assert_eq!(m.selection().most_recent(), Some("c"));
        assert!(!m.select_node("b", SelectionMode::Single));
    }

    #[test]
    fn range_selection_uses_visible_rows() {
        let mut m = model(DOC);
        m.select_node("1.1", SelectionMode::Single);
        m.select_node("1.3", SelectionMode::Range);
        let ids: Vec<_> = m.selected_nodes().into_iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["1.1", "1.2", "1.3"]);
    }

    #[test]
    fn reveal_expands_ancestors() {
        let mut m = model(DOC);
        m.expand_all(Some("1.2"));
        m.collapse_all(Some("1"));
        assert!(m.reveal("1.2.1.1"));
        assert!(m.is_expanded("1"));
        assert!(m.is_expanded("1.2"));
        assert!(m.is_expanded("1.2.1"));
        assert_eq!(m.selection().most_recent(), Some("1.2.1.1"));
        assert!(!m.reveal("missing"));
    }

    #[test]
    fn filter_and_match_stepping() {
        let mut m = model(
            r#"{"id": "root", "expanded": true, "children": [
                {"id": "a", "name": "alpha", "expanded": true, "children": [{"id": "a1", "name": "beta-one"}]},
                {"id": "b", "name": "beta-two"}
            ]}"#,
        );
        m.collapse_node(Some("a"));
        m.set_filter(Some("beta"));
        assert_eq!(visible(&m), vec!["root", "a", "a1", "b"]);

        assert!(m.select_next_match());
        assert_eq!(m.selection().most_recent(), Some("a1"));
        assert!(m.is_expanded("a"), "revealing a match expands its ancestors");
        assert!(m.select_next_match());
        assert_eq!(m.selection().most_recent(), Some("b"));
        assert!(m.select_next_match());
        assert_eq!(m.selection().most_recent(), Some("a1"), "wraps around");
        assert!(m.select_prev_match());
        assert_eq!(m.selection().most_recent(), Some("b"));

        m.set_filter(None);
        assert!(m.filter().is_none());
        assert!(!m.select_next_match());
    }

    #[test]
    fn events_are_delivered() {
        let mut m = model(DOC);
        let rx = m.subscribe();
        m.expand_node(Some("1.1"));
        m.select_node("1.1.1", SelectionMode::Single);
        let events: Vec<_> = rx.try_iter().collect();
        assert!(events.contains(&TreeEvent::Expansion {
            id: "1.1".into(),
            expanded: true
        }));
        assert!(events.contains(&TreeEvent::Selection {
            selected: vec!["1.1.1".into()]
        }));
    }

    #[test]
    fn dropped_subscriber_is_pruned() {
        let mut m = model(DOC);
        drop(m.subscribe());
        m.refresh(None).unwrap();
        assert!(m.listeners.is_empty());
    }

    #[test]
    fn non_expandable_composites_show_children() {
        let mut m = model(
            r#"{"id": "r", "expandable": false, "children": [
                {"id": "a"},
                {"id": "b", "children": [{"id": "b1", "expandable": false, "children": [{"id": "b1x"}]}]}
            ]}"#,
        );
        assert_eq!(visible(&m), vec!["r", "a", "b"]);
        assert!(!m.expand_node(Some("r")));
        assert!(!m.toggle_node_expansion(Some("r")));

        assert!(m.expand_all(Some("r")));
        assert_eq!(visible(&m), vec!["r", "a", "b", "b1", "b1x"]);
        assert!(!m.expand_all(Some("r")));
    }

    #[test]
    fn toggle_collapse_moves_hidden_selection() {
        let mut m = model(DOC);
        let rx = m.subscribe();
        assert!(m.toggle_node_expansion(Some("1.2")));
        assert!(m.get_node(Some("1.2.1")).is_some(), "children resolved on expand");
        m.select_node("1.2.2", SelectionMode::Single);
        assert!(!m.toggle_node_expansion(None), "leaf target");
        assert!(m.toggle_node_expansion(Some("1.2")));
        assert!(!m.is_expanded("1.2"));
        assert_eq!(m.selection().most_recent(), Some("1.2"));

        let flips: Vec<_> = rx
            .try_iter()
            .filter_map(|e| match e {
                TreeEvent::Expansion { id, expanded } => Some((id, expanded)),
                _ => None,
            })
            .collect();
        assert_eq!(
            flips,
            vec![("1.2".to_string(), true), ("1.2".to_string(), false)]
        );
    }

    #[test]
    fn set_filter_reports_changes() {
        let mut m = model(DOC);
        assert!(!m.set_filter(None));
        assert!(m.set_filter(Some("1.2")));
        assert!(!m.set_filter(Some("1.2")));
        assert!(m.set_filter(Some("")));
        assert!(m.filter().is_none());
    }
}
