use log::warn;

use crate::model::TreeModel;
use crate::node::TreeNode;
use crate::ui::TreeView;

pub struct App {
    pub tree: TreeView,
    pub title: String,
    pub show_details: bool,
}

impl App {
    pub fn new(model: TreeModel, title: String) -> Self {
        App {
            tree: TreeView::new(model),
            title,
            show_details: false,
        }
    }

    /// Re-resolve the whole tree. A failed reload keeps the previous nodes
    /// and shows the error in the status line.
    pub fn refresh(&mut self) {
        if let Err(e) = self.tree.model.refresh(None) {
            warn!("reload failed: {e:#}");
            self.tree.error = Some(format!("{e:#}"));
        }
        if self.tree.selected_id().is_none() {
            self.tree.model.select_first();
        }
        self.tree.sync();
    }

    pub fn toggle_details(&mut self) {
        self.show_details = !self.show_details;
    }

    pub fn focused_node(&self) -> Option<&TreeNode> {
        self.tree.model.most_recent_selected()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::JsonSource;

    #[test]
    fn refresh_failure_keeps_nodes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tree.json");
        std::fs::write(&path, r#"[{"id": "a"}, {"id": "b"}]"#).unwrap();
        let model = TreeModel::load(Box::new(JsonSource::from_file(&path).unwrap())).unwrap();
        let mut app = App::new(model, "tree.json".into());

        std::fs::write(&path, "[").unwrap();
        app.refresh();
        assert!(app.tree.error.is_some());
        assert_eq!(app.tree.rows.len(), 2);

        std::fs::write(&path, r#"[{"id": "b"}]"#).unwrap();
        app.refresh();
        assert_eq!(app.tree.rows.len(), 1);
        assert_eq!(app.focused_node().map(|n| n.id.as_str()), Some("b"));
    }
}
