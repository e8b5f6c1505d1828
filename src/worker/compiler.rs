use std::collections::HashMap;

use crate::worker::roles::{WorkerRole, WorkerResult};

/// Merge the worker outputs into one ordered markdown document.
///
/// Pure and total: the output depends only on the project name and the
/// result map. Sections appear in canonical role order regardless of
/// completion order, and a missing or errored role renders its placeholder
/// instead of failing the compilation. Worker text, including embedded code
/// fences, passes through verbatim.
pub fn compile(project_name: &str, results: &HashMap<WorkerRole, WorkerResult>) -> String {
    let mut doc = String::with_capacity(4096);

    doc.push_str(&format!("# {project_name} - Technical Documentation\n\n"));
    doc.push_str("## Quick Links\n\n");
    doc.push_str("| Item | Link |\n|------|------|\n");
    doc.push_str(&format!("| Project | {project_name} |\n\n"));
    doc.push_str("## About This Document\n\n");
    doc.push_str(&format!(
        "The purpose of this technical document is to provide comprehensive \
         technical specifications and architecture documentation for \
         {project_name}. This document highlights all technical deliverables, \
         infrastructure decisions, and implementation details.\n\n"
    ));
    doc.push_str("## Overview of the Project\n\n");
    doc.push_str(&format!(
        "{project_name} is documented herein with complete technical \
         specifications extracted from the Software Requirements Specification \
         (SRS) document.\n"
    ));

    for role in WorkerRole::ALL {
        doc.push_str("\n---\n\n");
        doc.push_str(&format!("# {}\n\n", role.section_title()));
        match results.get(&role) {
            Some(WorkerResult::Ok(text)) => doc.push_str(text),
            _ => doc.push_str(role.placeholder()),
        }
        doc.push('\n');
    }

    doc.push_str("\n---\n\n## Useful Links\n\n");
    doc.push_str("[Additional project resources and documentation links can be added here]\n");

    doc
}

#[cfg(test)]
mod tests {
    use super::*;

    fn results_with(entries: &[(WorkerRole, WorkerResult)]) -> HashMap<WorkerRole, WorkerResult> {
        entries.iter().cloned().collect()
    }

    #[test]
    fn empty_results_render_all_placeholders() {
        let doc = compile("Demo", &HashMap::new());
        for role in WorkerRole::ALL {
            assert!(doc.contains(role.section_title()));
            assert!(doc.contains(role.placeholder()));
        }
    }

    #[test]
    fn present_roles_render_their_exact_content() {
        let results = results_with(&[
            (
                WorkerRole::Requirements,
                WorkerResult::Ok("## Functional Requirements\n1. Login".to_string()),
            ),
            (
                WorkerRole::DatabaseSchema,
                WorkerResult::Err("call failed".to_string()),
            ),
        ]);
        let doc = compile("Demo", &results);

        assert!(doc.contains("## Functional Requirements\n1. Login"));
        assert!(!doc.contains(WorkerRole::Requirements.placeholder()));
        // Errored role falls back to its placeholder, not the error text.
        assert!(doc.contains(WorkerRole::DatabaseSchema.placeholder()));
        assert!(!doc.contains("call failed"));
        assert!(doc.contains(WorkerRole::Architecture.placeholder()));
    }

    #[test]
    fn sections_follow_canonical_order_not_insertion_order() {
        let results = results_with(&[
            (WorkerRole::DatabaseSchema, WorkerResult::Ok("db".to_string())),
            (WorkerRole::Requirements, WorkerResult::Ok("req".to_string())),
        ]);
        let doc = compile("Demo", &results);

        let mut last = 0;
        for role in WorkerRole::ALL {
            let heading = format!("# {}", role.section_title());
            let pos = doc.find(&heading).expect("section heading present");
            assert!(pos > last, "{:?} out of order", role);
            last = pos;
        }
    }

    #[test]
    fn compilation_is_deterministic_and_idempotent() {
        let results = results_with(&[(
            WorkerRole::Architecture,
            WorkerResult::Ok("## Stack\n- Rust".to_string()),
        )]);
        let first = compile("Demo", &results);
        let second = compile("Demo", &results);
        assert_eq!(first, second);
    }

    #[test]
    fn embedded_code_fences_pass_through_verbatim() {
        let fence = "```mermaid\nerDiagram\n    User ||--o{ Post : creates\n```";
        let results = results_with(&[(
            WorkerRole::DatabaseSchema,
            WorkerResult::Ok(format!("## ERD\n\n{fence}")),
        )]);
        let doc = compile("Demo", &results);
        assert!(doc.contains(fence));
    }

    #[test]
    fn output_is_at_least_as_long_as_all_section_content() {
        let results: HashMap<_, _> = WorkerRole::ALL
            .into_iter()
            .map(|r| (r, WorkerResult::Ok(format!("content for {}", r.key()))))
            .collect();
        let doc = compile("Demo", &results);
        let content_len: usize = results
            .values()
            .map(|r| match r {
                WorkerResult::Ok(text) => text.len(),
                WorkerResult::Err(_) => 0,
            })
            .sum();
        assert!(doc.len() >= content_len);
    }
}
