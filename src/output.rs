use serde::Serialize;

use crate::rows::TreeRow;
use crate::search::SearchMatch;
use crate::ui::{expansion_indicator, tree_prefix};

/// Render visible rows as an indented text tree. Selected rows are marked
/// with a trailing `*`.
pub fn format_tree(rows: &[TreeRow]) -> String {
    let mut out = String::new();
    for row in rows {
        out.push_str(&tree_prefix(row));
        out.push_str(expansion_indicator(row));
        out.push_str(&row.name);
        if row.selected {
            out.push_str(" *");
        }
        if let Some(desc) = &row.description {
            out.push_str(&format!("  {desc}"));
        }
        out.push('\n');
    }
    out
}

pub fn format_matches(matches: &[SearchMatch]) -> String {
    let mut out = String::new();
    for m in matches {
        if m.name == m.id {
            out.push_str(&format!("{:>4}  {}\n", m.score, m.name));
        } else {
            out.push_str(&format!("{:>4}  {} ({})\n", m.score, m.name, m.id));
        }
    }
    out
}

/// Snapshot of a model for `--json` output.
#[derive(Serialize)]
pub struct TreeSnapshot<'a> {
    pub rows: &'a [TreeRow],
    pub selected: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focus: Option<&'a str>,
}
