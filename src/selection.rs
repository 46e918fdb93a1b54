use crate::node::TreeNode;

/// How a selection request combines with the current selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionMode {
    /// Replace the selection with one node.
    #[default]
    Single,
    /// Add the node, or remove it if it is already selected.
    Toggle,
    /// Select every row between the most recent selection and the node.
    Range,
}

/// Ordered record of selected nodes. The last entry is the most recent;
/// selecting a node again moves it to the end.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SelectionHistory {
    entries: Vec<String>,
}

impl SelectionHistory {
    pub fn push(&mut self, id: &str) {
        self.remove(id);
        self.entries.push(id.to_string());
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e != id);
        self.entries.len() != before
    }

    pub fn most_recent(&self) -> Option<&str> {
        self.entries.last().map(String::as_str)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|e| e == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// The current selection plus the history that implicit operation targets
/// are resolved against.
#[derive(Debug, Default, Clone)]
pub struct SelectionService {
    history: SelectionHistory,
    selected: Vec<String>,
    /// Fixed end of range selections. Only Single and Toggle move it.
    anchor: Option<String>,
}

impl SelectionService {
    pub fn new() -> Self {
        Self::default()
    }

    /// The node operations fall back to when given no explicit target.
    pub fn most_recent(&self) -> Option<&str> {
        self.history.most_recent()
    }

    pub fn history(&self) -> &SelectionHistory {
        &self.history
    }

    pub fn selected(&self) -> &[String] {
        &self.selected
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.iter().any(|s| s == id)
    }

    /// Apply a selection. `rows` is the visible, selectable row order used
    /// by [`SelectionMode::Range`]. Returns false when `node` cannot be
    /// selected.
    pub fn select(&mut self, node: &TreeNode, mode: SelectionMode, rows: &[&str]) -> bool {
        if !node.is_selectable() {
            return false;
        }
        let id = node.id.as_str();
        match mode {
            SelectionMode::Single => {
                self.selected = vec![id.to_string()];
                self.history.push(id);
                self.anchor = Some(id.to_string());
            }
            SelectionMode::Toggle => {
                if self.is_selected(id) {
                    self.selected.retain(|s| s != id);
                    self.history.remove(id);
                    self.anchor = self.most_recent().map(str::to_string);
                } else {
                    self.selected.push(id.to_string());
                    self.history.push(id);
                    self.anchor = Some(id.to_string());
                }
            }
            SelectionMode::Range => {
                let anchor = self
                    .anchor()
                    .and_then(|a| rows.iter().position(|r| *r == a));
                let target = rows.iter().position(|r| *r == id);
                match (anchor, target) {
                    (Some(a), Some(t)) => {
                        let (lo, hi) = if a <= t { (a, t) } else { (t, a) };
                        self.selected = rows[lo..=hi].iter().map(|r| r.to_string()).collect();
                    }
                    _ => self.selected = vec![id.to_string()],
                }
                self.history.push(id);
            }
        }
        true
    }

    /// Where the next range selection starts: the last node selected with
    /// Single or Toggle, else the most recent selection.
    pub fn anchor(&self) -> Option<&str> {
        self.anchor.as_deref().or_else(|| self.most_recent())
    }

    pub fn deselect(&mut self, id: &str) -> bool {
        let before = self.selected.len();
        self.selected.retain(|s| s != id);
        let removed = self.selected.len() != before;
        self.drop_anchor(id);
        self.history.remove(id) || removed
    }

    /// Drop a node that no longer exists from both selection and history.
    pub fn forget(&mut self, id: &str) {
        self.selected.retain(|s| s != id);
        self.history.remove(id);
        self.drop_anchor(id);
    }

    fn drop_anchor(&mut self, id: &str) {
        if self.anchor.as_deref() == Some(id) {
            self.anchor = None;
        }
    }

    pub fn clear(&mut self) {
        self.selected.clear();
        self.history.clear();
        self.anchor = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeSpec;

    fn node(id: &str) -> TreeNode {
        TreeNode::from_spec(&NodeSpec::leaf(id, id), None)
    }

    #[test]
    fn history_moves_reselected_to_end() {
        let mut h = SelectionHistory::default();
        h.push("a");
        h.push("b");
        h.push("a");
        assert_eq!(h.iter().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(h.most_recent(), Some("a"));
    }

    #[test]
    fn single_keeps_earlier_history() {
        let mut svc = SelectionService::new();
        svc.select(&node("a"), SelectionMode::Single, &[]);
        svc.select(&node("b"), SelectionMode::Single, &[]);
        assert_eq!(svc.most_recent(), Some("b"));
        assert_eq!(svc.selected(), ["b"]);
        assert!(svc.history().contains("a"));
    }

    #[test]
    fn unselectable_rejected() {
        let mut svc = SelectionService::new();
        let n = TreeNode::from_spec(&NodeSpec::leaf("x", "x").selectable(false), None);
        assert!(!svc.select(&n, SelectionMode::Single, &[]));
        assert!(svc.most_recent().is_none());
    }

    #[test]
    fn toggle_adds_and_removes() {
        let mut svc = SelectionService::new();
        svc.select(&node("a"), SelectionMode::Single, &[]);
        svc.select(&node("b"), SelectionMode::Toggle, &[]);
        assert_eq!(svc.selected(), ["a", "b"]);
        assert_eq!(svc.most_recent(), Some("b"));

        svc.select(&node("b"), SelectionMode::Toggle, &[]);
        assert_eq!(svc.selected(), ["a"]);
        assert_eq!(svc.most_recent(), Some("a"));
    }

    #[test]
    fn range_spans_rows_in_either_direction() {
        let rows = ["a", "b", "c", "d"];
        let mut svc = SelectionService::new();
        svc.select(&node("c"), SelectionMode::Single, &rows);
        svc.select(&node("a"), SelectionMode::Range, &rows);
        assert_eq!(svc.selected(), ["a", "b", "c"]);
        assert_eq!(svc.most_recent(), Some("a"));
    }

    #[test]
    fn range_without_anchor_is_single() {
        let rows = ["a", "b"];
        let mut svc = SelectionService::new();
        svc.select(&node("b"), SelectionMode::Range, &rows);
        assert_eq!(svc.selected(), ["b"]);
    }

    #[test]
    fn forget_and_deselect() {
        let mut svc = SelectionService::new();
        svc.select(&node("a"), SelectionMode::Single, &[]);
        svc.select(&node("b"), SelectionMode::Single, &[]);
        svc.forget("b");
        assert_eq!(svc.most_recent(), Some("a"));
        assert!(svc.selected().is_empty());
        assert!(svc.deselect("a"));
        assert!(!svc.deselect("a"));
    }

    #[test]
    fn repeated_range_keeps_original_anchor() {
        let rows = ["a", "b", "c", "d"];
        let mut svc = SelectionService::new();
        svc.select(&node("b"), SelectionMode::Single, &rows);
        svc.select(&node("d"), SelectionMode::Range, &rows);
        assert_eq!(svc.selected(), ["b", "c", "d"]);
        svc.select(&node("a"), SelectionMode::Range, &rows);
        assert_eq!(svc.selected(), ["a", "b"]);
        assert_eq!(svc.anchor(), Some("b"));
        assert_eq!(svc.most_recent(), Some("a"));

        svc.select(&node("d"), SelectionMode::Toggle, &rows);
        svc.select(&node("c"), SelectionMode::Range, &rows);
        assert_eq!(svc.selected(), ["c", "d"]);
    }

    #[test]
    fn forgotten_anchor_falls_back_to_most_recent() {
        let rows = ["a", "b", "c"];
        let mut svc = SelectionService::new();
        svc.select(&node("a"), SelectionMode::Single, &rows);
        svc.select(&node("b"), SelectionMode::Range, &rows);
        svc.forget("a");
        assert_eq!(svc.anchor(), Some("b"));
        svc.select(&node("c"), SelectionMode::Range, &rows);
        assert_eq!(svc.selected(), ["b", "c"]);
    }
}
