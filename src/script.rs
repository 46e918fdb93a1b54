//! Line-oriented scripts of model operations, as read by `treemodel exec`.
//!
//! Each non-blank line not starting with `#` is one operation. Lines are
//! split with POSIX shell quoting, so ids containing spaces can be quoted.
//! Every line is parsed before any of them runs.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::debug;
use serde::Serialize;

use crate::model::TreeModel;
use crate::selection::SelectionMode;

#[derive(Parser)]
#[command(no_binary_name = true, disable_help_subcommand = true)]
struct ScriptLine {
    #[command(subcommand)]
    op: Op,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Op {
    /// Expand a node (default: most recent selection)
    Expand { id: Option<String> },
    /// Collapse a node
    Collapse { id: Option<String> },
    /// Collapse a node and everything below it
    CollapseAll { id: Option<String> },
    /// Expand a node and everything below it
    ExpandAll { id: Option<String> },
    /// Flip a node's expansion
    Toggle { id: Option<String> },
    /// Select a node
    Select {
        id: String,
        /// Add or remove the node from the selection
        #[arg(long, conflicts_with = "range")]
        toggle: bool,
        /// Select every visible row from the range anchor
        #[arg(long)]
        range: bool,
    },
    /// Drop a node from the selection and its history
    Deselect { id: String },
    /// Select the next visible row
    Next,
    /// Select the previous visible row
    Prev,
    /// Select the first visible row
    First,
    /// Select the last visible row
    Last,
    /// Select the parent of the most recent selection
    Parent,
    /// Collapse, or step out to the parent
    Left,
    /// Expand, or step into the first child
    Right,
    /// Expand a node's ancestors and select it
    Reveal { id: String },
    /// Filter rows by a fuzzy query (no query clears the filter)
    Filter { query: Option<String> },
    /// Re-resolve a node (default: everything) from the source
    Refresh { id: Option<String> },
}

/// The result of one script line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub lineno: usize,
    pub line: String,
    /// Whether the operation changed the model.
    pub changed: bool,
}

/// Parse a script into `(lineno, line, op)` triples.
pub fn parse(input: &str) -> Result<Vec<(usize, String, Op)>> {
    let mut ops = Vec::new();
    for (i, raw) in input.lines().enumerate() {
        let lineno = i + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(tokens) = shlex::split(line) else {
            bail!("line {lineno}: invalid quoting: {line}");
        };
        let parsed = ScriptLine::try_parse_from(&tokens)
            .with_context(|| format!("line {lineno}: failed to parse: {line}"))?;
        ops.push((lineno, line.to_string(), parsed.op));
    }
    Ok(ops)
}

/// Apply one operation. Errors only come from re-resolving the source.
pub fn apply(model: &mut TreeModel, op: &Op) -> Result<bool> {
    let changed = match op {
        Op::Expand { id } => model.expand_node(id.as_deref()),
        Op::Collapse { id } => model.collapse_node(id.as_deref()),
        Op::CollapseAll { id } => model.collapse_all(id.as_deref()),
        Op::ExpandAll { id } => model.expand_all(id.as_deref()),
        Op::Toggle { id } => model.toggle_node_expansion(id.as_deref()),
        Op::Select { id, toggle, range } => {
            let mode = if *toggle {
                SelectionMode::Toggle
            } else if *range {
                SelectionMode::Range
            } else {
                SelectionMode::Single
            };
            model.select_node(id, mode)
        }
        Op::Next => model.select_next(),
        Op::Prev => model.select_prev(),
        Op::First => model.select_first(),
        Op::Last => model.select_last(),
        Op::Parent => model.select_parent(),
        Op::Left => model.collapse_or_select_parent(),
        Op::Right => model.expand_or_select_first_child(),
        Op::Reveal { id } => model.reveal(id),
        Op::Deselect { id } => model.deselect_node(id),
        Op::Filter { query } => model.set_filter(query.as_deref()),
        Op::Refresh { id: Some(id) } if model.get_node(Some(id)).is_none() => false,
        Op::Refresh { id } => {
            model.refresh(id.as_deref())?;
            true
        }
    };
    Ok(changed)
}

/// Parse and run a whole script against `model`.
pub fn run(model: &mut TreeModel, input: &str) -> Result<Vec<Outcome>> {
    let ops = parse(input)?;
    let mut outcomes = Vec::with_capacity(ops.len());
    for (lineno, line, op) in ops {
        let changed = apply(model, &op).with_context(|| format!("line {lineno}: {line}"))?;
        debug!("line {lineno}: {line} -> {changed}");
        outcomes.push(Outcome {
            lineno,
            line,
            changed,
        });
    }
    Ok(outcomes)
}

pub fn format_outcomes(outcomes: &[Outcome]) -> String {
    let mut out = String::new();
    for o in outcomes {
        let status = if o.changed { "ok" } else { "no-op" };
        out.push_str(&format!("{:>3}: {}  [{status}]\n", o.lineno, o.line));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::JsonSource;

    const DOC: &str = r#"{"id": "1", "expanded": true, "children": [
        {"id": "1.1", "children": [{"id": "1.1.1"}]},
        {"id": "1.2", "children": [{"id": "1.2.1"}]},
        {"id": "my node"}
    ]}"#;

    fn model() -> TreeModel {
        TreeModel::load(Box::new(JsonSource::parse(DOC).unwrap())).unwrap()
    }

    #[test]
    fn parse_skips_blanks_and_comments() {
        let ops = parse("\n# comment\nexpand 1.1\n\n  next  \n").unwrap();
        assert_eq!(
            ops,
            vec![
                (3, "expand 1.1".to_string(), Op::Expand { id: Some("1.1".into()) }),
                (5, "next".to_string(), Op::Next),
            ]
        );
    }

    #[test]
    fn parse_quoted_ids() {
        let ops = parse("select \"my node\" --toggle").unwrap();
        assert_eq!(
            ops[0].2,
            Op::Select {
                id: "my node".into(),
                toggle: true,
                range: false
            }
        );
    }

    #[test]
    fn parse_rejects_unknown_op_with_line_number() {
        let err = parse("expand\nfly away\n").unwrap_err();
        assert!(format!("{err:#}").contains("line 2"));
    }

    #[test]
    fn parse_rejects_conflicting_modes() {
        assert!(parse("select a --toggle --range").is_err());
    }

    #[test]
    fn parse_rejects_unbalanced_quotes() {
        let err = parse("select \"oops").unwrap_err();
        assert!(err.to_string().contains("invalid quoting"));
    }

    #[test]
    fn run_reports_outcomes() {
        let mut m = model();
        let outcomes = run(&mut m, "select 1.1\nexpand\nexpand\ncollapse 1.2\n").unwrap();
        let changed: Vec<_> = outcomes.iter().map(|o| o.changed).collect();
        assert_eq!(changed, vec![true, true, false, false]);
        assert!(m.is_expanded("1.1"));
    }

    #[test]
    fn refresh_of_unknown_node_is_noop() {
        let mut m = model();
        let outcomes = run(&mut m, "refresh nope\nrefresh\n").unwrap();
        assert!(!outcomes[0].changed);
        assert!(outcomes[1].changed);
    }

    #[test]
    fn failed_refresh_reports_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tree.json");
        std::fs::write(&path, DOC).unwrap();
        let mut m = TreeModel::load(Box::new(JsonSource::from_file(&path).unwrap())).unwrap();
        std::fs::write(&path, "{ not json").unwrap();
        let err = run(&mut m, "first\nrefresh\n").unwrap_err();
        assert!(format!("{err:#}").contains("line 2: refresh"));
    }

    #[test]
    fn empty_script_is_noop() {
        let mut m = model();
        assert!(run(&mut m, "").unwrap().is_empty());
        assert!(run(&mut m, "  \n# only comments\n").unwrap().is_empty());
    }

    #[test]
    fn format_marks_noops() {
        let outcomes = vec![
            Outcome {
                lineno: 1,
                line: "expand 1".into(),
                changed: false,
            },
            Outcome {
                lineno: 2,
                line: "next".into(),
                changed: true,
            },
        ];
        assert_eq!(
            format_outcomes(&outcomes),
            "  1: expand 1  [no-op]\n  2: next  [ok]\n"
        );
    }

    #[test]
    fn filter_reports_only_real_changes() {
        let mut m = model();
        let outcomes = run(&mut m, "filter\nfilter 1.2\nfilter 1.2\nfilter \"\"\nfilter\n").unwrap();
        let changed: Vec<_> = outcomes.iter().map(|o| o.changed).collect();
        assert_eq!(changed, vec![false, true, false, true, false]);
    }

    #[test]
    fn deselect_drops_node_from_history() {
        let mut m = model();
        let input = "select 1.1\nselect 1.2 --toggle\ndeselect 1.2\ndeselect 1.2\ncollapse\n";
        let outcomes = run(&mut m, input).unwrap();
        let changed: Vec<_> = outcomes.iter().map(|o| o.changed).collect();
        assert_eq!(changed, vec![true, true, true, false, false]);
        assert_eq!(m.selection().selected(), ["1.1"]);
        assert_eq!(m.selection().most_recent(), Some("1.1"));
    }
}
