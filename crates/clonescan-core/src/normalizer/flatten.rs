//! Flattening of multi-file bundles into a single source text.
//!
//! External single-file analyzers cannot follow imports inside a bundle, so
//! the bundle is concatenated: one SPDX line, one `pragma solidity` line, no
//! `import` statements, and a `// File:` banner before each file.

use std::collections::{BTreeMap, BTreeSet};

const DEFAULT_LICENSE: &str = "// SPDX-License-Identifier: MIT";
const DEFAULT_PRAGMA: &str = "pragma solidity ^0.8.0;";

/// Flatten `files` in path order.  Returns `None` when nothing but headers
/// would remain.
pub fn flatten_bundle(files: &BTreeMap<String, String>) -> Option<String> {
    let mut licenses: BTreeSet<String> = BTreeSet::new();
    let mut main_pragma: Option<String> = None;
    let mut bodies: Vec<(&str, String)> = Vec::new();

    for (path, content) in files {
        if content.is_empty() {
            continue;
        }
        let mut kept: Vec<&str> = Vec::new();
        let mut in_import = false;
        for line in content.split('\n') {
            let stripped = line.trim();
            if in_import {
                in_import = !stripped.contains(';');
                continue;
            }
            if stripped.contains("SPDX-License-Identifier") {
                licenses.insert(stripped.to_string());
                continue;
            }
            if stripped.starts_with("pragma solidity") {
                if main_pragma.is_none() {
                    main_pragma = Some(line.to_string());
                }
                continue;
            }
            if stripped.starts_with("import ") || stripped == "import" {
                in_import = !stripped.contains(';');
                continue;
            }
            kept.push(line);
        }
        if !kept.is_empty() {
            bodies.push((path.as_str(), kept.join("\n")));
        }
    }

    if bodies.is_empty() {
        return None;
    }

    let license = if licenses.len() == 1 {
        licenses.into_iter().next().unwrap_or_else(|| DEFAULT_LICENSE.to_string())
    } else {
        DEFAULT_LICENSE.to_string()
    };

    let mut out: Vec<String> = vec![
        license,
        String::new(),
        main_pragma.unwrap_or_else(|| DEFAULT_PRAGMA.to_string()),
        String::new(),
        "// File flattened from a multi-file verified source bundle".to_string(),
        String::new(),
    ];
    for (path, body) in bodies {
        out.push(format!("// File: {path}"));
        out.push(body);
        out.push(String::new());
    }
    Some(out.join("\n"))
}
