//! Parsing of Etherscan-style `SourceCode` payloads.
//!
//! Verified-source registries return either plain source text or a Standard
//! JSON Input document, sometimes wrapped in an extra pair of braces
//! (`{{ ... }}`).  This module turns such a payload into either a flat text or
//! a path -> text bundle.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::errors::{ScanError, ScanResult};

/// Result of parsing a retrieved payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParsedSource {
    Flat(String),
    Bundle(BTreeMap<String, String>),
}

/// Strip one layer of the double-brace wrapping Etherscan applies to
/// Standard JSON Input payloads.
pub fn unwrap_double_braces(text: &str) -> &str {
    let trimmed = text.trim();
    if trimmed.starts_with("{{") && trimmed.ends_with("}}") && trimmed.len() >= 4 {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    }
}

/// Whether a payload is JSON rather than plain source.
pub fn looks_like_json(text: &str) -> bool {
    text.trim_start().starts_with('{')
}

/// Parse a retrieved `SourceCode` string.
///
/// Plain source is returned verbatim.  JSON payloads with a `sources` map
/// become bundles; JSON without `sources` falls back to the first top-level
/// entry carrying a `content` string.  Anything else is a malformed bundle.
pub fn parse_source_code(text: &str) -> ScanResult<ParsedSource> {
    if !looks_like_json(text) {
        return Ok(ParsedSource::Flat(text.to_string()));
    }

    let payload = unwrap_double_braces(text);
    let data: Value = serde_json::from_str(payload)
        .map_err(|e| ScanError::MalformedBundle(format!("invalid JSON: {e}")))?;
    let object = data
        .as_object()
        .ok_or_else(|| ScanError::MalformedBundle("top-level value is not an object".into()))?;

    match object.get("sources") {
        Some(Value::Object(sources)) => {
            let files: BTreeMap<String, String> = sources
                .iter()
                .filter_map(|(path, entry)| {
                    entry
                        .get("content")
                        .and_then(Value::as_str)
                        .map(|content| (path.clone(), content.to_string()))
                })
                .collect();
            if files.is_empty() {
                return Err(ScanError::MalformedBundle(
                    "sources map has no file contents".into(),
                ));
            }
            Ok(ParsedSource::Bundle(files))
        }
        Some(_) => Err(ScanError::MalformedBundle(
            "sources is not an object".into(),
        )),
        None => object
            .values()
            .find_map(|value| value.get("content").and_then(Value::as_str))
            .map(|content| ParsedSource::Flat(content.to_string()))
            .ok_or_else(|| ScanError::MalformedBundle("no source content found".into())),
    }
}
