//! Main-file selection for multi-file bundles.
//!
//! A bundle returned for a deployment usually contains the deployed contract
//! plus every library it imports.  The main file is approximated by an
//! explicit priority: files outside vendored library paths first, files under
//! a first-party source directory next, larger files after that.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::config::PriorityWeights;

/// Priority of one bundle file.  Higher sorts first; the flags are carried
/// for reporting and only `tier` and `size` take part in comparisons.
#[derive(Clone, Debug)]
pub struct FilePriority {
    pub is_library: bool,
    pub is_first_party: bool,
    /// Weighted tier from [`PriorityWeights`].
    pub tier: u32,
    pub size: usize,
}

impl Ord for FilePriority {
    fn cmp(&self, other: &Self) -> Ordering {
        self.tier
            .cmp(&other.tier)
            .then(self.size.cmp(&other.size))
    }
}

impl PartialEq for FilePriority {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FilePriority {}

impl PartialOrd for FilePriority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn has_marker(path: &str, markers: &[String]) -> bool {
    let lowered = path.to_lowercase().replace('\\', "/");
    markers.iter().any(|m| {
        let marker = m.to_lowercase().replace('\\', "/");
        !marker.is_empty() && lowered.contains(&marker)
    })
}

pub fn is_library_path(path: &str, weights: &PriorityWeights) -> bool {
    has_marker(path, &weights.library_markers)
}

pub fn is_first_party_path(path: &str, weights: &PriorityWeights) -> bool {
    has_marker(path, &weights.first_party_markers)
}

/// Compute the priority of `path` holding `content`.
pub fn file_priority(path: &str, content: &str, weights: &PriorityWeights) -> FilePriority {
    let is_library = is_library_path(path, weights);
    let is_first_party = is_first_party_path(path, weights);
    let tier = if is_library { 0 } else { weights.non_library }
        + if is_first_party { weights.first_party } else { 0 };
    FilePriority {
        is_library,
        is_first_party,
        tier,
        size: content.len(),
    }
}

/// Whether a file declares a contract or an interface.
pub fn declares_contract(content: &str) -> bool {
    content.contains("contract ") || content.contains("interface ")
}

/// Pick the main file of a bundle.
///
/// Only files declaring a contract or interface compete; when none do, every
/// non-empty file does.  Equal priorities resolve to the smallest path.
pub fn select_main_file<'a>(
    files: &'a BTreeMap<String, String>,
    weights: &PriorityWeights,
) -> Option<&'a str> {
    let non_empty: Vec<(&String, &String)> = files
        .iter()
        .filter(|(_, content)| !content.trim().is_empty())
        .collect();
    if non_empty.len() == 1 {
        return Some(non_empty[0].0.as_str());
    }

    let declaring: Vec<(&String, &String)> = non_empty
        .iter()
        .copied()
        .filter(|(_, content)| declares_contract(content))
        .collect();
    let candidates = if declaring.is_empty() {
        non_empty
    } else {
        declaring
    };

    // BTreeMap order is ascending by path, so on equal priority the first
    // candidate seen is kept.
    let mut best: Option<(&String, FilePriority)> = None;
    for (path, content) in candidates {
        let priority = file_priority(path, content, weights);
        match &best {
            Some((_, current)) if priority <= *current => {}
            _ => best = Some((path, priority)),
        }
    }
    best.map(|(path, _)| path.as_str())
}
