//! Where tree nodes come from.
//!
//! A [`TreeSource`] answers two questions: what the roots are, and what the
//! children of a given composite node are. The [`Tree`](crate::tree::Tree)
//! only asks for children of nodes it is about to show, so sources backed by
//! something slow (a filesystem, a remote listing) are walked lazily.

use std::collections::{HashMap, HashSet};
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::node::{NodeSpec, TreeNode};

pub trait TreeSource {
    /// Resolve the top-level nodes. Called on every full refresh.
    fn roots(&mut self) -> Result<Vec<NodeSpec>>;

    /// Resolve the direct children of a composite node.
    fn children(&mut self, node: &TreeNode) -> Result<Vec<NodeSpec>>;

    /// Filesystem location backing this source, if any. Used to watch for
    /// changes.
    fn location(&self) -> Option<&Path> {
        None
    }
}

// ── JSON documents ─────────────────────────────────────────────────────

fn default_true() -> bool {
    true
}

/// One node of a JSON tree document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonNode {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<JsonNode>>,
    #[serde(default)]
    pub expanded: bool,
    #[serde(default = "default_true")]
    pub selectable: bool,
    #[serde(default = "default_true")]
    pub expandable: bool,
}

impl JsonNode {
    fn to_spec(&self) -> NodeSpec {
        NodeSpec {
            id: self.id.clone(),
            name: self.name.clone().unwrap_or_else(|| self.id.clone()),
            description: self.description.clone(),
            composite: self.children.is_some(),
            expandable: self.expandable,
            expanded: self.expanded,
            selectable: self.selectable,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Document {
    Forest(Vec<JsonNode>),
    Single(JsonNode),
}

/// A tree read from a JSON document: either a single root object or an
/// array of roots. File-backed sources re-read the file on every full
/// refresh.
#[derive(Debug, Default)]
pub struct JsonSource {
    path: Option<PathBuf>,
    roots: Vec<NodeSpec>,
    children: HashMap<String, Vec<NodeSpec>>,
}

impl JsonSource {
    pub fn parse(json: &str) -> Result<Self> {
        let mut source = JsonSource::default();
        source.load(json)?;
        Ok(source)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut source = JsonSource {
            path: Some(path.to_path_buf()),
            ..Default::default()
        };
        source.reload()?;
        Ok(source)
    }

    fn reload(&mut self) -> Result<()> {
        let Some(path) = self.path.clone() else {
            return Ok(());
        };
        let json = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        self.load(&json)
            .with_context(|| format!("failed to load tree from {}", path.display()))
    }

    fn load(&mut self, json: &str) -> Result<()> {
        let document: Document = serde_json::from_str(json).context("invalid tree document")?;
        let nodes = match document {
            Document::Forest(nodes) => nodes,
            Document::Single(node) => vec![node],
        };

        let mut seen = HashSet::new();
        let mut children = HashMap::new();
        let mut stack: Vec<&JsonNode> = nodes.iter().collect();
        while let Some(node) = stack.pop() {
            if node.id.is_empty() {
                bail!("node id must not be empty");
            }
            if !seen.insert(node.id.as_str()) {
                bail!("duplicate node id '{}'", node.id);
            }
            if let Some(kids) = &node.children {
                children.insert(node.id.clone(), kids.iter().map(JsonNode::to_spec).collect());
                stack.extend(kids.iter());
            }
        }

        self.roots = nodes.iter().map(JsonNode::to_spec).collect();
        self.children = children;
        Ok(())
    }
}

impl TreeSource for JsonSource {
    fn roots(&mut self) -> Result<Vec<NodeSpec>> {
        self.reload()?;
        Ok(self.roots.clone())
    }

    fn children(&mut self, node: &TreeNode) -> Result<Vec<NodeSpec>> {
        Ok(self.children.get(&node.id).cloned().unwrap_or_default())
    }

    fn location(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

// ── Directories ────────────────────────────────────────────────────────

/// Id of the root node of an [`FsSource`].
pub const FS_ROOT_ID: &str = ".";

/// A directory tree. Node ids are `/`-separated paths relative to the root
/// directory, whose own id is [`FS_ROOT_ID`]. Symlinks are listed as leaves
/// described by their target.
#[derive(Debug)]
pub struct FsSource {
    root: PathBuf,
    show_hidden: bool,
    /// On-disk path of every listed entry, keyed by node id.
    paths: HashMap<String, PathBuf>,
}

impl FsSource {
    pub fn new(root: impl Into<PathBuf>, show_hidden: bool) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            bail!("{} is not a directory", root.display());
        }
        Ok(Self {
            root,
            show_hidden,
            paths: HashMap::new(),
        })
    }

    fn path_of(&self, id: &str) -> PathBuf {
        if id == FS_ROOT_ID {
            return self.root.clone();
        }
        self.paths
            .get(id)
            .cloned()
            .unwrap_or_else(|| self.root.join(id))
    }
}

/// Id segment for a directory entry. Names that are not valid UTF-8 or that
/// contain a backslash are written escaped, so distinct names never share
/// an id.
fn id_segment(name: &OsStr) -> String {
    match name.to_str() {
        Some(s) if !s.contains('\\') => s.to_string(),
        _ => {
            let quoted = format!("{name:?}");
            quoted[1..quoted.len() - 1].to_string()
        }
    }
}

impl TreeSource for FsSource {
    fn roots(&mut self) -> Result<Vec<NodeSpec>> {
        let name = self
            .root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.root.display().to_string());
        Ok(vec![NodeSpec::composite(FS_ROOT_ID, name).expanded(true)])
    }

    fn children(&mut self, node: &TreeNode) -> Result<Vec<NodeSpec>> {
        let dir = self.path_of(&node.id);
        let entries =
            fs::read_dir(&dir).with_context(|| format!("failed to list {}", dir.display()))?;

        let mut specs = Vec::new();
        for entry in entries {
            let entry = entry.with_context(|| format!("failed to list {}", dir.display()))?;
            let file_name = entry.file_name();
            let name = file_name.to_string_lossy().into_owned();
            if !self.show_hidden && name.starts_with('.') {
                continue;
            }
            let file_type = entry.file_type().ok();
            let segment = id_segment(&file_name);
            let id = if node.id == FS_ROOT_ID {
                segment
            } else {
                format!("{}/{}", node.id, segment)
            };
            self.paths.insert(id.clone(), entry.path());

            let spec = match file_type {
                Some(t) if t.is_dir() => NodeSpec::composite(id, name),
                Some(t) if t.is_symlink() => match fs::read_link(entry.path()) {
                    Ok(target) => NodeSpec::leaf(id, name)
                        .with_description(format!("-> {}", target.display())),
                    Err(_) => NodeSpec::leaf(id, name),
                },
                _ => NodeSpec::leaf(id, name),
            };
            specs.push(spec);
        }

        specs.sort_by(|a, b| b.composite.cmp(&a.composite).then_with(|| a.name.cmp(&b.name)));
        Ok(specs)
    }

    fn location(&self) -> Option<&Path> {
        Some(&self.root)
    }
}

/// Open a source for `path`: directories become an [`FsSource`], anything
/// else is read as a JSON document.
pub fn open(path: &Path, show_hidden: bool) -> Result<Box<dyn TreeSource>> {
    if path.is_dir() {
        Ok(Box::new(FsSource::new(path, show_hidden)?))
    } else {
        Ok(Box::new(JsonSource::from_file(path)?))
    }
}
