// Copyright (c) 2025 Stepwise Orchestrator Contributors
// SPDX-License-Identifier: Apache-2.0

//! The Definition Service capability contract and its filesystem-backed
//! implementation (§4.1).

use crate::error::{DefinitionError, DefinitionResult};
use crate::metrics::record_definition_cache;
use crate::model::{FingerprintHasher, WorkflowDefinition, STEP_DELIMITER};
use crate::parser::{expand_includes, extract_section, extract_step_list};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, instrument};

const ORCHESTRATOR_GUIDANCE: &str = "Orchestrator Guidance";
const CLIENT_INSTRUCTIONS: &str = "Client Instructions";
const DEFAULT_INCLUDE_DEPTH_LIMIT: u32 = 10;

/// Capability contract for the Workflow Definition Service component (§4.1).
#[async_trait]
pub trait DefinitionService: Send + Sync {
    /// Discovered workflow names, sorted lexicographically.
    async fn list_workflows(&self) -> DefinitionResult<Vec<String>>;

    /// The full blob: `index.md` followed by each step file in index order.
    async fn get_full_definition_blob(&self, workflow_name: &str) -> DefinitionResult<String>;

    /// Verbatim `# Client Instructions` body for one step.
    async fn get_step_client_instructions(&self, workflow_name: &str, step_id: &str) -> DefinitionResult<String>;

    /// Canonical step IDs in index order.
    async fn get_step_list(&self, workflow_name: &str) -> DefinitionResult<Vec<String>>;
}

/// Filesystem-backed [`DefinitionService`] with content-fingerprint caching.
pub struct MarkdownDefinitionService {
    base_dir: PathBuf,
    cache: Mutex<HashMap<String, WorkflowDefinition>>,
    include_depth_limit: u32,
}

impl MarkdownDefinitionService {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into(), cache: Mutex::new(HashMap::new()), include_depth_limit: DEFAULT_INCLUDE_DEPTH_LIMIT }
    }

    /// Override the `{{file:...}}` include recursion ceiling (§4.1, §10.3);
    /// defaults to `DEFAULT_INCLUDE_DEPTH_LIMIT` when not called.
    pub fn with_include_depth_limit(mut self, include_depth_limit: u32) -> Self {
        self.include_depth_limit = include_depth_limit;
        self
    }

    fn workflow_dir(&self, workflow_name: &str) -> PathBuf {
        self.base_dir.join(workflow_name)
    }

    fn fingerprint_of(dir: &Path) -> DefinitionResult<u64> {
        let mut paths = Vec::new();
        collect_files(dir, dir, &mut paths)?;
        paths.sort();

        let mut hasher = FingerprintHasher::new();
        for relative in &paths {
            hasher.write(relative.to_string_lossy().as_bytes());
            let bytes = std::fs::read(dir.join(relative)).map_err(|e| DefinitionError::Io(e.to_string()))?;
            hasher.write(&bytes);
        }
        Ok(hasher.finish())
    }

    fn load(&self, workflow_name: &str) -> DefinitionResult<WorkflowDefinition> {
        let dir = self.workflow_dir(workflow_name);
        let index_path = dir.join("index.md");
        if !index_path.is_file() {
            return Err(DefinitionError::NotFound(format!("workflow '{workflow_name}' has no index.md")));
        }

        let fingerprint = Self::fingerprint_of(&dir)?;

        let index_raw = std::fs::read_to_string(&index_path).map_err(|e| DefinitionError::Io(e.to_string()))?;
        let index_expanded = expand_includes(&index_raw, &index_path, self.include_depth_limit)?;
        let links = extract_step_list(&index_expanded)?;

        let mut step_ids = Vec::with_capacity(links.len());
        let mut client_instructions = HashMap::with_capacity(links.len());
        let mut blob_sections = vec![index_expanded.clone()];

        for link in &links {
            let step_path = dir.join(&link.target);
            if !step_path.is_file() {
                return Err(DefinitionError::NotFound(format!(
                    "workflow '{workflow_name}' step file not found: {}",
                    link.target
                )));
            }

            let step_raw = std::fs::read_to_string(&step_path).map_err(|e| DefinitionError::Io(e.to_string()))?;
            let step_expanded = expand_includes(&step_raw, &step_path, self.include_depth_limit)?;

            extract_section(&step_expanded, ORCHESTRATOR_GUIDANCE)
                .ok_or_else(|| DefinitionError::ParsingError(format!("step '{}' is missing '# {ORCHESTRATOR_GUIDANCE}'", link.step_id)))?;
            let client_body = extract_section(&step_expanded, CLIENT_INSTRUCTIONS)
                .ok_or_else(|| DefinitionError::ParsingError(format!("step '{}' is missing '# {CLIENT_INSTRUCTIONS}'", link.step_id)))?;

            client_instructions.insert(link.step_id.clone(), client_body);
            blob_sections.push(format!("## Step: {}\n{}", link.step_id, step_expanded));
            step_ids.push(link.step_id.clone());
        }

        let full_blob = blob_sections.join(STEP_DELIMITER);

        Ok(WorkflowDefinition { name: workflow_name.to_string(), step_ids, client_instructions, full_blob, fingerprint })
    }

    /// Return the cached definition if its fingerprint still matches the
    /// files on disk; otherwise re-parse and replace the cache entry.
    fn resolve(&self, workflow_name: &str) -> DefinitionResult<WorkflowDefinition> {
        let dir = self.workflow_dir(workflow_name);
        let current_fingerprint = Self::fingerprint_of(&dir)?;

        {
            let cache = self.cache.lock().expect("definition cache mutex poisoned");
            if let Some(cached) = cache.get(workflow_name) {
                if cached.fingerprint == current_fingerprint {
                    record_definition_cache(true);
                    return Ok(cached.clone());
                }
            }
        }

        debug!(workflow_name, "cache miss or stale fingerprint, reparsing");
        record_definition_cache(false);
        let parsed = self.load(workflow_name)?;
        self.cache.lock().expect("definition cache mutex poisoned").insert(workflow_name.to_string(), parsed.clone());
        Ok(parsed)
    }
}

fn collect_files(root: &Path, current: &Path, out: &mut Vec<PathBuf>) -> DefinitionResult<()> {
    let entries = std::fs::read_dir(current).map_err(|e| DefinitionError::Io(e.to_string()))?;
    for entry in entries {
        let entry = entry.map_err(|e| DefinitionError::Io(e.to_string()))?;
        let path = entry.path();
        if path.is_dir() {
            collect_files(root, &path, out)?;
        } else {
            let relative = path.strip_prefix(root).unwrap_or(&path).to_path_buf();
            out.push(relative);
        }
    }
    Ok(())
}

#[async_trait]
impl DefinitionService for MarkdownDefinitionService {
    #[instrument(skip(self))]
    async fn list_workflows(&self) -> DefinitionResult<Vec<String>> {
        let entries = std::fs::read_dir(&self.base_dir).map_err(|e| DefinitionError::Io(e.to_string()))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| DefinitionError::Io(e.to_string()))?;
            let path = entry.path();
            if path.is_dir() && path.join("index.md").is_file() {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    #[instrument(skip(self))]
    async fn get_full_definition_blob(&self, workflow_name: &str) -> DefinitionResult<String> {
        Ok(self.resolve(workflow_name)?.full_blob)
    }

    #[instrument(skip(self))]
    async fn get_step_client_instructions(&self, workflow_name: &str, step_id: &str) -> DefinitionResult<String> {
        let definition = self.resolve(workflow_name)?;
        definition
            .client_instructions_for(step_id)
            .map(str::to_string)
            .ok_or_else(|| DefinitionError::NotFound(format!("step '{step_id}' not found in workflow '{workflow_name}'")))
    }

    #[instrument(skip(self))]
    async fn get_step_list(&self, workflow_name: &str) -> DefinitionResult<Vec<String>> {
        Ok(self.resolve(workflow_name)?.step_ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_workflow(base: &Path, name: &str) {
        let dir = base.join(name);
        let steps_dir = dir.join("steps");
        std::fs::create_dir_all(&steps_dir).unwrap();
        std::fs::write(dir.join("index.md"), "# Greeting\n\n- [greet](steps/greet.md)\n- [farewell](steps/farewell.md)\n").unwrap();
        std::fs::write(
            steps_dir.join("greet.md"),
            "# Orchestrator Guidance\nGreet warmly.\n\n# Client Instructions\nSay hello.\n",
        )
        .unwrap();
        std::fs::write(
            steps_dir.join("farewell.md"),
            "# Orchestrator Guidance\nSay goodbye.\n\n# Client Instructions\nSay bye.\n",
        )
        .unwrap();
    }

    #[tokio::test]
    async fn lists_only_directories_with_index_md() {
        let dir = tempdir().unwrap();
        write_workflow(dir.path(), "GREET");
        std::fs::create_dir_all(dir.path().join("NOT_A_WORKFLOW")).unwrap();

        let service = MarkdownDefinitionService::new(dir.path());
        let names = service.list_workflows().await.unwrap();
        assert_eq!(names, vec!["GREET".to_string()]);
    }

    #[tokio::test]
    async fn get_step_list_preserves_index_order() {
        let dir = tempdir().unwrap();
        write_workflow(dir.path(), "GREET");
        let service = MarkdownDefinitionService::new(dir.path());
        let steps = service.get_step_list("GREET").await.unwrap();
        assert_eq!(steps, vec!["greet".to_string(), "farewell".to_string()]);
    }

    #[tokio::test]
    async fn get_full_definition_blob_contains_step_markers() {
        let dir = tempdir().unwrap();
        write_workflow(dir.path(), "GREET");
        let service = MarkdownDefinitionService::new(dir.path());
        let blob = service.get_full_definition_blob("GREET").await.unwrap();
        assert!(blob.contains("## Step: greet"));
        assert!(blob.contains("## Step: farewell"));
        assert!(blob.contains("Greet warmly."));
    }

    #[tokio::test]
    async fn get_step_client_instructions_returns_verbatim_body() {
        let dir = tempdir().unwrap();
        write_workflow(dir.path(), "GREET");
        let service = MarkdownDefinitionService::new(dir.path());
        let instructions = service.get_step_client_instructions("GREET", "greet").await.unwrap();
        assert_eq!(instructions, "Say hello.");
    }

    #[tokio::test]
    async fn missing_workflow_is_not_found() {
        let dir = tempdir().unwrap();
        let service = MarkdownDefinitionService::new(dir.path());
        let err = service.get_step_list("NOPE").await.unwrap_err();
        assert!(matches!(err, DefinitionError::NotFound(_)));
    }

    #[tokio::test]
    async fn live_edit_invalidates_cache_on_fingerprint_change() {
        let dir = tempdir().unwrap();
        write_workflow(dir.path(), "GREET");
        let service = MarkdownDefinitionService::new(dir.path());

        let first = service.get_full_definition_blob("GREET").await.unwrap();
        assert!(first.contains("Say hello."));

        std::fs::write(
            dir.path().join("GREET/steps/greet.md"),
            "# Orchestrator Guidance\nGreet warmly.\n\n# Client Instructions\nSay hello there!\n",
        )
        .unwrap();

        let second = service.get_full_definition_blob("GREET").await.unwrap();
        assert!(second.contains("Say hello there!"));
    }

    #[tokio::test]
    async fn step_missing_client_instructions_header_fails_parsing() {
        let dir = tempdir().unwrap();
        let wf_dir = dir.path().join("BROKEN");
        let steps_dir = wf_dir.join("steps");
        std::fs::create_dir_all(&steps_dir).unwrap();
        std::fs::write(wf_dir.join("index.md"), "- [only](steps/only.md)\n").unwrap();
        std::fs::write(steps_dir.join("only.md"), "# Orchestrator Guidance\nDo it.\n").unwrap();

        let service = MarkdownDefinitionService::new(dir.path());
        let err = service.get_step_list("BROKEN").await.unwrap_err();
        assert!(matches!(err, DefinitionError::ParsingError(_)));
    }
}
