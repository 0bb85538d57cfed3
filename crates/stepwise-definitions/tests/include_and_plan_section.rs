// Copyright (c) 2025 Stepwise Orchestrator Contributors
// SPDX-License-Identifier: Apache-2.0

//! End-to-end parsing of a workflow directory with includes and a
//! `## High-Level Plan` section.

use stepwise_definitions::{DefinitionService, MarkdownDefinitionService};
use tempfile::tempdir;

fn write(path: &std::path::Path, content: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

#[tokio::test]
async fn parses_workflow_with_high_level_plan_and_shared_include() {
    let dir = tempdir().unwrap();
    let wf = dir.path().join("ONBOARDING");

    write(
        &wf.join("index.md"),
        "# Onboarding\n\nWelcome.\n\n## High-Level Plan\n\n1. [collect_info](steps/collect_info.md)\n2. [confirm](steps/confirm.md)\n\n## Notes\n\nNot a step list:\n- [decoy](steps/decoy.md)\n",
    );
    write(&wf.join("shared/tone.md"), "Be concise and friendly.");
    write(
        &wf.join("steps/collect_info.md"),
        "# Orchestrator Guidance\n{{file:../shared/tone.md}}\nAsk for name and email.\n\n# Client Instructions\nPlease share your name and email.\n",
    );
    write(
        &wf.join("steps/confirm.md"),
        "# Orchestrator Guidance\n{{file:../shared/tone.md}}\nConfirm details and finish.\n\n# Client Instructions\nWe will confirm your details shortly.\n",
    );

    let service = MarkdownDefinitionService::new(dir.path());

    let steps = service.get_step_list("ONBOARDING").await.unwrap();
    assert_eq!(steps, vec!["collect_info".to_string(), "confirm".to_string()]);

    let blob = service.get_full_definition_blob("ONBOARDING").await.unwrap();
    assert!(blob.contains("Be concise and friendly."));
    assert!(blob.contains("## Step: collect_info"));
    assert!(!blob.contains("decoy"));

    let instructions = service.get_step_client_instructions("ONBOARDING", "confirm").await.unwrap();
    assert_eq!(instructions, "We will confirm your details shortly.");
}

#[tokio::test]
async fn multiple_workflows_are_discovered_independently() {
    let dir = tempdir().unwrap();
    for name in ["ALPHA", "BETA"] {
        let wf = dir.path().join(name);
        write(&wf.join("index.md"), "- [only](steps/only.md)\n");
        write(
            &wf.join("steps/only.md"),
            "# Orchestrator Guidance\nDo the one thing.\n\n# Client Instructions\nDo it.\n",
        );
    }

    let service = MarkdownDefinitionService::new(dir.path());
    let names = service.list_workflows().await.unwrap();
    assert_eq!(names, vec!["ALPHA".to_string(), "BETA".to_string()]);
}
