use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, warn};

use crate::expansion::ExpansionService;
use crate::node::{NodeSpec, TreeNode};
use crate::source::TreeSource;

/// What a refresh changed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RefreshReport {
    pub added: usize,
    /// Ids that no longer exist, including whole removed subtrees.
    pub removed: Vec<String>,
}

/// Nodes keyed by id, resolved from a [`TreeSource`].
///
/// Children are resolved lazily: a refresh descends only into nodes that
/// are currently expanded, so a collapsed composite keeps whatever children
/// it had (possibly none) until it is expanded again.
pub struct Tree {
    source: Box<dyn TreeSource>,
    nodes: HashMap<String, TreeNode>,
    roots: Vec<String>,
}

impl Tree {
    /// Create an empty tree. Nothing is resolved until the first refresh.
    pub fn new(source: Box<dyn TreeSource>) -> Self {
        Self {
            source,
            nodes: HashMap::new(),
            roots: Vec::new(),
        }
    }

    /// Look up a node. An absent or unknown id is simply not found.
    pub fn get_node(&self, id: Option<&str>) -> Option<&TreeNode> {
        id.and_then(|id| self.nodes.get(id))
    }

    pub fn get(&self, id: &str) -> Option<&TreeNode> {
        self.nodes.get(id)
    }

    /// Return this tree's node with the same id as `node`, if it still
    /// exists. Any node whose id is unknown is not found, however it was
    /// built.
    pub fn validate_node(&self, node: &TreeNode) -> Option<&TreeNode> {
        self.nodes.get(&node.id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn roots(&self) -> &[String] {
        &self.roots
    }

    pub fn children(&self, id: &str) -> &[String] {
        self.nodes.get(id).map(TreeNode::child_ids).unwrap_or_default()
    }

    pub fn parent(&self, id: &str) -> Option<&str> {
        self.nodes.get(id).and_then(|n| n.parent.as_deref())
    }

    /// Ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: &str) -> Vec<&str> {
        let mut out = Vec::new();
        let mut current = self.parent(id);
        while let Some(p) = current {
            out.push(p);
            current = self.parent(p);
        }
        out
    }

    /// Whether `id` lies strictly below `ancestor`.
    pub fn is_descendant(&self, id: &str, ancestor: &str) -> bool {
        self.ancestors(id).contains(&ancestor)
    }

    /// Depth-first, pre-order walk over every resolved node.
    pub fn iter(&self) -> DepthFirst<'_> {
        DepthFirst {
            tree: self,
            stack: self.roots.iter().rev().map(String::as_str).collect(),
        }
    }

    /// Depth-first walk of the subtree rooted at `id`, including `id`.
    pub fn subtree<'a>(&'a self, id: &'a str) -> DepthFirst<'a> {
        DepthFirst {
            tree: self,
            stack: vec![id],
        }
    }

    pub fn location(&self) -> Option<&Path> {
        self.source.location()
    }

    /// Re-resolve the children of `id` (or the roots when `None`) from the
    /// source, then descend into every child that is expanded or cannot be
    /// collapsed.
    ///
    /// Surviving ids keep their node and expansion state. Vanished ids are
    /// dropped together with their subtrees and forgotten by `expansion`.
    /// Refreshing an unknown id or a leaf does nothing.
    pub fn refresh(
        &mut self,
        id: Option<&str>,
        expansion: &mut ExpansionService,
    ) -> Result<RefreshReport> {
        let mut report = RefreshReport::default();
        if let Some(id) = id {
            if !self.nodes.contains_key(id) {
                return Ok(report);
            }
        }
        self.refresh_level(id, expansion, &mut report)?;
        debug!(
            "refreshed {}: {} added, {} removed",
            id.unwrap_or("<roots>"),
            report.added,
            report.removed.len()
        );
        Ok(report)
    }

    fn refresh_level(
        &mut self,
        parent: Option<&str>,
        expansion: &mut ExpansionService,
        report: &mut RefreshReport,
    ) -> Result<()> {
        let (specs, old) = match parent {
            None => (
                self.source.roots().context("failed to resolve roots")?,
                self.roots.clone(),
            ),
            Some(id) => {
                let Some(node) = self.nodes.get(id) else {
                    return Ok(());
                };
                if node.is_leaf() {
                    return Ok(());
                }
                let specs = self
                    .source
                    .children(node)
                    .with_context(|| format!("failed to resolve children of '{id}'"))?;
                (specs, node.child_ids().to_vec())
            }
        };

        let lineage: Vec<String> = match parent {
            Some(id) => std::iter::once(id)
                .chain(self.ancestors(id))
                .map(str::to_string)
                .collect(),
            None => Vec::new(),
        };

        let mut seen = HashSet::new();
        let mut ids = Vec::with_capacity(specs.len());
        for spec in &specs {
            if lineage.contains(&spec.id) {
                warn!(
                    "node '{}' lists its own ancestor '{}' as a child; skipping",
                    parent.unwrap_or_default(),
                    spec.id
                );
                continue;
            }
            if !seen.insert(spec.id.clone()) {
                warn!("duplicate node id '{}'; skipping", spec.id);
                continue;
            }
            let current_parent = self.nodes.get(&spec.id).map(|n| n.parent.clone());
            match current_parent {
                Some(p) if p.as_deref() == parent => self.update_node(spec, expansion, report),
                Some(_) => {
                    self.detach(&spec.id, expansion, report);
                    self.insert_node(spec, parent, expansion, report);
                }
                None => self.insert_node(spec, parent, expansion, report),
            }
            ids.push(spec.id.clone());
        }

        for stale in old.iter().filter(|id| !seen.contains(*id)) {
            self.remove_subtree(stale, expansion, report);
        }

        match parent {
            None => self.roots = ids.clone(),
            Some(id) => {
                if let Some(node) = self.nodes.get_mut(id) {
                    node.children = Some(ids.clone());
                    node.resolved = true;
                }
            }
        }

        // Non-expandable composites are always open, so their children are
        // resolved along with them.
        for child in &ids {
            let descend = self.nodes.get(child).is_some_and(|n| {
                n.is_composite() && (!n.is_expandable() || expansion.is_expanded(child))
            });
            if descend {
                self.refresh_level(Some(child), expansion, report)?;
            }
        }
        Ok(())
    }

    fn insert_node(
        &mut self,
        spec: &NodeSpec,
        parent: Option<&str>,
        expansion: &mut ExpansionService,
        report: &mut RefreshReport,
    ) {
        let node = TreeNode::from_spec(spec, parent);
        if node.is_expandable() && spec.expanded {
            expansion.set_expanded(&node.id, true);
        }
        self.nodes.insert(node.id.clone(), node);
        report.added += 1;
    }

    fn update_node(
        &mut self,
        spec: &NodeSpec,
        expansion: &mut ExpansionService,
        report: &mut RefreshReport,
    ) {
        let Some(node) = self.nodes.get_mut(&spec.id) else {
            return;
        };
        node.name = spec.name.clone();
        node.description = spec.description.clone();
        node.selectable = spec.selectable;
        node.expandable = spec.composite && spec.expandable;

        let dropped = match (spec.composite, node.children.take()) {
            (true, Some(kids)) => {
                node.children = Some(kids);
                Vec::new()
            }
            (true, None) => {
                node.children = Some(Vec::new());
                node.resolved = false;
                Vec::new()
            }
            (false, Some(kids)) => kids,
            (false, None) => Vec::new(),
        };
        if !node.is_expandable() {
            expansion.forget(&spec.id);
        }
        for child in &dropped {
            self.remove_subtree(child, expansion, report);
        }
    }

    /// Unlink `id` from its parent (or the roots) and drop its subtree.
    fn detach(&mut self, id: &str, expansion: &mut ExpansionService, report: &mut RefreshReport) {
        match self.parent(id).map(str::to_string) {
            Some(p) => {
                if let Some(kids) = self.nodes.get_mut(&p).and_then(|n| n.children.as_mut()) {
                    kids.retain(|k| k != id);
                }
            }
            None => self.roots.retain(|r| r != id),
        }
        self.remove_subtree(id, expansion, report);
    }

    fn remove_subtree(
        &mut self,
        id: &str,
        expansion: &mut ExpansionService,
        report: &mut RefreshReport,
    ) {
        let mut stack = vec![id.to_string()];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.remove(&id) {
                stack.extend(node.children.unwrap_or_default());
                expansion.forget(&id);
                report.removed.push(id);
            }
        }
    }
}

pub struct DepthFirst<'a> {
    tree: &'a Tree,
    stack: Vec<&'a str>,
}

impl<'a> Iterator for DepthFirst<'a> {
    type Item = &'a TreeNode;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(id) = self.stack.pop() {
            if let Some(node) = self.tree.nodes.get(id) {
                self.stack
                    .extend(node.child_ids().iter().rev().map(String::as_str));
                return Some(node);
            }
        }
        None
    }
}
