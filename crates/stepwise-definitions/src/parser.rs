// Copyright (c) 2025 Stepwise Orchestrator Contributors
// SPDX-License-Identifier: Apache-2.0

//! Markdown parsing: step-list extraction, header extraction, and the
//! recursive `{{file:...}}` include mechanism (§4.1).

use crate::error::{DefinitionError, DefinitionResult};
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

fn include_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{file:([^}]+)\}\}").expect("static include pattern is valid"))
}

fn step_link_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(?:[-*+]|\d+[.)])\s+\[([^\]]+)\]\(([^)]+)\)\s*$").expect("static step link pattern is valid"))
}

fn header_regex(title: &str) -> Regex {
    Regex::new(&format!(r"(?im)^#\s*{}\s*$", regex::escape(title))).expect("header pattern is valid")
}

/// Expand all `{{file:<relative_path>}}` includes in `content`, recursively,
/// relative to `base_path` (the file `content` came from), up to
/// `max_depth` levels of nesting. Returns the fully expanded text.
pub fn expand_includes(content: &str, base_path: &Path, max_depth: u32) -> DefinitionResult<String> {
    let mut stack = Vec::new();
    expand_includes_inner(content, base_path, &mut stack, 0, max_depth)
}

fn expand_includes_inner(content: &str, base_path: &Path, stack: &mut Vec<PathBuf>, depth: u32, max_depth: u32) -> DefinitionResult<String> {
    let re = include_regex();
    if !re.is_match(content) {
        return Ok(content.to_string());
    }

    if depth >= max_depth {
        return Err(DefinitionError::IncludeDepthExceeded { max: max_depth, chain: chain_string(stack) });
    }

    let base_dir = base_path.parent().unwrap_or_else(|| Path::new("."));
    let mut result = String::with_capacity(content.len());
    let mut last_end = 0;

    for cap in re.captures_iter(content) {
        let whole = cap.get(0).expect("capture group 0 always matches");
        let relative = cap.get(1).expect("capture group 1 required by pattern").as_str().trim();
        result.push_str(&content[last_end..whole.start()]);

        let target = base_dir.join(relative);
        let canonical = canonicalize_best_effort(&target);

        if stack.contains(&canonical) {
            let mut chain = stack.clone();
            chain.push(canonical);
            return Err(DefinitionError::CircularInclude { chain: chain_string(&chain) });
        }

        let included_raw = std::fs::read_to_string(&target).map_err(|_| DefinitionError::IncludeNotFound {
            from: base_path.display().to_string(),
            target: relative.to_string(),
        })?;

        stack.push(canonical);
        let expanded = expand_includes_inner(&included_raw, &target, stack, depth + 1, max_depth)?;
        stack.pop();

        result.push_str(&expanded);
        last_end = whole.end();
    }

    result.push_str(&content[last_end..]);
    Ok(result)
}

fn canonicalize_best_effort(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn chain_string(stack: &[PathBuf]) -> String {
    stack.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(" -> ")
}

/// A parsed `[Step Name](steps/<file>.md)` entry from the index step list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepLink {
    pub step_id: String,
    pub target: String,
}

/// Extract the ordered step list from `index.md` content (post-include).
///
/// Looks inside a `## High-Level Plan` section if present, otherwise scans
/// the whole document for the first contiguous run of `[Name](steps/..md)`
/// list items.
pub fn extract_step_list(index_content: &str) -> DefinitionResult<Vec<StepLink>> {
    let scoped = extract_high_level_plan_section(index_content).unwrap_or(index_content);

    let mut links = Vec::new();
    let mut in_list = false;
    for line in scoped.lines() {
        if let Some(caps) = step_link_regex().captures(line) {
            in_list = true;
            links.push(StepLink {
                step_id: caps[1].trim().to_string(),
                target: caps[2].trim().to_string(),
            });
        } else if in_list && line.trim().is_empty() {
            continue;
        } else if in_list {
            break;
        }
    }

    if links.is_empty() {
        return Err(DefinitionError::ParsingError("no step list found in index.md (expected a markdown list of [Step Name](steps/<file>.md) links)".to_string()));
    }

    let mut seen = HashSet::new();
    for link in &links {
        if !seen.insert(link.step_id.clone()) {
            return Err(DefinitionError::ParsingError(format!("duplicate step ID in index: '{}'", link.step_id)));
        }
    }

    Ok(links)
}

fn extract_high_level_plan_section(content: &str) -> Option<&str> {
    let heading_re = Regex::new(r"(?im)^##\s*High-Level Plan\s*$").ok()?;
    let start = heading_re.find(content)?.end();
    let rest = &content[start..];

    let next_heading_re = Regex::new(r"(?m)^#{1,2}\s").ok()?;
    let end = next_heading_re.find(rest).map(|m| m.start()).unwrap_or(rest.len());
    Some(&rest[..end])
}

/// Extract the verbatim body under a top-level `# <title>` header, matched
/// case-insensitively with whitespace tolerance. Stops at the next `#`
/// header of any level, or end of document.
pub fn extract_section(content: &str, title: &str) -> Option<String> {
    let re = header_regex(title);
    let header_match = re.find(content)?;
    let rest = &content[header_match.end()..];

    let next_header_re = Regex::new(r"(?m)^#\s").ok()?;
    let end = next_header_re.find(rest).map(|m| m.start()).unwrap_or(rest.len());

    Some(rest[..end].trim().to_string())
}
