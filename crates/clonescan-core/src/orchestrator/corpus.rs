//! Loading raw corpora from disk: a directory of per-contract files, a JSON
//! map, and optional address lists.

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::Value;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::errors::{ScanError, ScanResult};
use crate::models::{is_contract_address, RawArtifact};
use crate::normalizer::RawCorpus;

const SOURCE_EXTENSIONS: &[&str] = &["sol", "json", "txt"];
const MAX_DIRECTORY_DEPTH: usize = 4;

/// Read `<id>.sol`, `<id>.json` and `<id>.txt` files under `dir`.
///
/// The file stem is the contract id.  When two files share a stem the first
/// one in path order wins.
pub fn load_corpus_dir(dir: &Path) -> ScanResult<RawCorpus> {
    if !dir.is_dir() {
        return Err(ScanError::Corpus(format!(
            "{} is not a directory",
            dir.display()
        )));
    }

    let mut corpus = RawCorpus::new();
    for entry in WalkDir::new(dir)
        .max_depth(MAX_DIRECTORY_DEPTH)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !entry.file_type().is_file() {
            continue;
        }
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        if !SOURCE_EXTENSIONS.contains(&extension.as_str()) {
            continue;
        }
        let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if corpus.contains_key(id) {
            warn!("Ignoring {}: contract {} already loaded", path.display(), id);
            continue;
        }
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                warn!("Failed to read {}: {}", path.display(), e);
                corpus.insert(id.to_string(), None);
                continue;
            }
        };
        debug!("Loaded {} ({} bytes)", path.display(), content.len());
        corpus.insert(id.to_string(), Some(RawArtifact::Text(content)));
    }

    warn_on_unusual_ids(&corpus);
    Ok(corpus)
}

fn artifact_from_value(id: &str, value: Value) -> Option<RawArtifact> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(RawArtifact::Text(text)),
        Value::Object(map) => {
            if map.values().all(Value::is_string) {
                let files: BTreeMap<String, String> = map
                    .into_iter()
                    .filter_map(|(path, v)| match v {
                        Value::String(s) => Some((path, s)),
                        _ => None,
                    })
                    .collect();
                Some(RawArtifact::Bundle(files))
            } else {
                // Etherscan-style object; left for the normalizer to interpret.
                Some(RawArtifact::Text(Value::Object(map).to_string()))
            }
        }
        other => {
            warn!("Entry {} is neither source text, a bundle nor null: {}", id, other);
            Some(RawArtifact::Malformed(format!(
                "expected a string, an object or null, got {other}"
            )))
        }
    }
}

/// Parse a JSON object mapping contract id to source text, bundle or null.
pub fn parse_corpus_json(text: &str) -> ScanResult<RawCorpus> {
    let value: Value = serde_json::from_str(text)?;
    let Value::Object(entries) = value else {
        return Err(ScanError::Corpus(
            "corpus JSON must be an object keyed by contract id".to_string(),
        ));
    };
    let mut corpus = RawCorpus::new();
    for (id, value) in entries {
        let artifact = artifact_from_value(&id, value);
        corpus.insert(id, artifact);
    }
    warn_on_unusual_ids(&corpus);
    Ok(corpus)
}

pub fn load_corpus_json(path: &Path) -> ScanResult<RawCorpus> {
    let text = std::fs::read_to_string(path)?;
    parse_corpus_json(&text)
}

/// One id per line; blank lines and `#` comments are skipped.
pub fn parse_address_list(text: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter(|line| seen.insert(line.to_string()))
        .map(str::to_string)
        .collect()
}

pub fn load_address_list(path: &Path) -> ScanResult<Vec<String>> {
    Ok(parse_address_list(&std::fs::read_to_string(path)?))
}

/// Mark every listed id that has no artifact as not retrieved.
///
/// Returns how many entries were added.
pub fn apply_address_list(corpus: &mut RawCorpus, addresses: &[String]) -> usize {
    let mut added = 0;
    for address in addresses {
        if !corpus.contains_key(address) {
            debug!("Listed contract {} has no source", address);
            corpus.insert(address.clone(), None);
            added += 1;
        }
    }
    added
}

fn warn_on_unusual_ids(corpus: &RawCorpus) {
    for id in corpus.keys() {
        if !is_contract_address(id) {
            warn!("Contract id {} is not a 0x-prefixed 40-hex-digit address", id);
        }
    }
}
