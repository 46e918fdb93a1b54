use std::collections::{HashMap, HashSet};

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use serde::Serialize;

use crate::tree::Tree;

/// A node whose name matched a search query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchMatch {
    pub id: String,
    pub name: String,
    /// Match score from fuzzy-matcher; higher is better.
    pub score: i64,
    /// Char indices of the matched characters in `name`.
    pub indices: Vec<usize>,
}

/// Fuzzy-match `query` against the names of every resolved node.
///
/// Results are sorted by score, best first; equal scores keep tree order.
pub fn search(tree: &Tree, query: &str) -> Vec<SearchMatch> {
    if query.is_empty() {
        return Vec::new();
    }
    let matcher = SkimMatcherV2::default();
    let mut results: Vec<SearchMatch> = tree
        .iter()
        .filter_map(|node| {
            let (score, indices) = matcher.fuzzy_indices(&node.name, query)?;
            Some(SearchMatch {
                id: node.id.clone(),
                name: node.name.clone(),
                score,
                indices,
            })
        })
        .collect();
    results.sort_by(|a, b| b.score.cmp(&a.score));
    results
}

/// An active search filter: the matching nodes plus every ancestor needed
/// to reach them.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    query: String,
    /// Matches in tree order.
    order: Vec<String>,
    highlights: HashMap<String, Vec<usize>>,
    visible: HashSet<String>,
}

impl Filter {
    pub fn new(tree: &Tree, query: &str) -> Self {
        let mut matches = search(tree, query);
        let position: HashMap<&str, usize> = tree
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.as_str(), i))
            .collect();
        matches.sort_by_key(|m| position.get(m.id.as_str()).copied().unwrap_or(usize::MAX));

        let mut visible = HashSet::new();
        for m in &matches {
            visible.insert(m.id.clone());
            for ancestor in tree.ancestors(&m.id) {
                if !visible.insert(ancestor.to_string()) {
                    break;
                }
            }
        }

        Self {
            query: query.to_string(),
            order: matches.iter().map(|m| m.id.clone()).collect(),
            highlights: matches.into_iter().map(|m| (m.id, m.indices)).collect(),
            visible,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn is_visible(&self, id: &str) -> bool {
        self.visible.contains(id)
    }

    pub fn is_match(&self, id: &str) -> bool {
        self.highlights.contains_key(id)
    }

    pub fn highlight(&self, id: &str) -> Option<&[usize]> {
        self.highlights.get(id).map(Vec::as_slice)
    }

    /// Matching ids in tree order.
    pub fn matches(&self) -> &[String] {
        &self.order
    }
}
