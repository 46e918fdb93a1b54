use serde::Serialize;

/// A node as described by a [`TreeSource`](crate::source::TreeSource),
/// before it is placed in a [`Tree`](crate::tree::Tree).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSpec {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    /// Whether the node can have children. Children are resolved lazily.
    pub composite: bool,
    pub expandable: bool,
    /// Initial expansion state, applied the first time the node is seen.
    pub expanded: bool,
    pub selectable: bool,
}

impl NodeSpec {
    pub fn leaf(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            composite: false,
            expandable: false,
            expanded: false,
            selectable: true,
        }
    }

    pub fn composite(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            composite: true,
            expandable: true,
            ..Self::leaf(id, name)
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn expanded(mut self, expanded: bool) -> Self {
        self.expanded = expanded;
        self
    }

    pub fn selectable(mut self, selectable: bool) -> Self {
        self.selectable = selectable;
        self
    }

    pub fn expandable(mut self, expandable: bool) -> Self {
        self.expandable = expandable;
        self
    }
}

/// A node held by a [`Tree`](crate::tree::Tree).
///
/// Capabilities are structural: a node with `children` is composite, a
/// composite with the `expandable` flag carries expansion state, and the
/// `selectable` flag admits it to the selection history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeNode {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<String>>,
    pub selectable: bool,
    pub expandable: bool,
    /// Whether `children` reflects the source (false until first resolved).
    #[serde(skip)]
    pub resolved: bool,
}

impl TreeNode {
    pub(crate) fn from_spec(spec: &NodeSpec, parent: Option<&str>) -> Self {
        Self {
            id: spec.id.clone(),
            name: spec.name.clone(),
            description: spec.description.clone(),
            parent: parent.map(str::to_string),
            children: spec.composite.then(Vec::new),
            selectable: spec.selectable,
            expandable: spec.composite && spec.expandable,
            resolved: false,
        }
    }

    pub fn is_composite(&self) -> bool {
        self.children.is_some()
    }

    pub fn is_leaf(&self) -> bool {
        !self.is_composite()
    }

    pub fn is_expandable(&self) -> bool {
        self.expandable && self.is_composite()
    }

    pub fn is_selectable(&self) -> bool {
        self.selectable
    }

    /// Child ids, empty for leaves and unresolved composites.
    pub fn child_ids(&self) -> &[String] {
        self.children.as_deref().unwrap_or_default()
    }
}
