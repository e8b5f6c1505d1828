use std::sync::Arc;

use tracing::{error, info, warn};

use crate::progress::ProgressRegistry;
use crate::store::{ProjectStatus, ProjectStore, RequirementsSummary};
use crate::worker::compiler::compile;
use crate::worker::dispatcher::{dispatch, DispatchSettings};
use crate::worker::generator::Generator;
use crate::worker::roles::{WorkerRole, WorkerResult};

/// One processing attempt for one project: fan the source text out to the
/// workers, compile the results, persist the outcome. Ephemeral; owns nothing
/// beyond the duration of `run`.
pub struct JobRun {
    pub run_id: String,
    pub project_id: String,
    pub project_name: String,
    pub source_text: Arc<String>,
    pub store: Arc<dyn ProjectStore>,
    pub registry: Arc<ProgressRegistry>,
    pub generator: Arc<dyn Generator>,
    pub settings: DispatchSettings,
}

impl JobRun {
    /// Execute the run to completion. Any run-level failure transitions the
    /// project to `error` with a human-readable message; per-worker failures
    /// are absorbed into the compiled document as placeholders.
    pub async fn run(self) {
        let project_id = self.project_id.clone();
        info!(
            "Run {} starting for project {} ({})",
            self.run_id, project_id, self.project_name
        );

        if let Err(message) = self.execute().await {
            error!("Run failed for project {}: {}", project_id, message);
            // Best effort: the project may have been deleted mid-run.
            if let Ok(project) = self.store.update(&project_id, &mut |p| {
                p.status = ProjectStatus::Error;
                p.progress_message = Some(format!("Error: {message}"));
                Ok(())
            }) {
                self.registry.publish(
                    &project_id,
                    project.current_step.map_or(0, |s| {
                        (s * 100 / project.total_steps.unwrap_or(1).max(1)) as u8
                    }),
                    format!("Error: {message}"),
                    Some(ProjectStatus::Error),
                );
            }
        }
    }

    async fn execute(&self) -> Result<(), String> {
        let total_steps = WorkerRole::ALL.len() as u32;

        self.save_progress(0, total_steps, "Starting 4 parallel workers...")?;
        self.save_progress(
            0,
            total_steps,
            &format!(
                "Processing {} characters of SRS content...",
                self.source_text.chars().count()
            ),
        )?;

        let store = Arc::clone(&self.store);
        let registry = Arc::clone(&self.registry);
        let project_id = self.project_id.clone();

        let results = dispatch(
            Arc::clone(&self.generator),
            Arc::clone(&self.source_text),
            &self.settings,
            |percent, message| {
                let current = u32::from(percent) * total_steps / 100;
                // Persist first, then broadcast: the record is authoritative.
                let saved = store.update(&project_id, &mut |p| {
                    p.current_step = Some(current);
                    p.total_steps = Some(total_steps);
                    p.progress_message = Some(message.to_string());
                    Ok(())
                });
                if saved.is_err() {
                    warn!("Progress write failed for project {}", project_id);
                }
                registry.publish(&project_id, percent, message, None);
            },
        )
        .await;

        self.save_progress(total_steps, total_steps, "Compiling final technical documentation...")?;

        let tech_doc = compile(&self.project_name, &results);
        let requirements = match results.get(&WorkerRole::Requirements) {
            Some(WorkerResult::Ok(text)) => Some(summarize_requirements(text)),
            _ => None,
        };

        let failed = results.values().filter(|r| !r.is_ok()).count();
        let message = if failed == 0 {
            "Processing completed".to_string()
        } else {
            format!("Processing completed ({failed} section(s) could not be generated)")
        };

        self.store
            .update(&self.project_id, &mut |p| {
                p.status = ProjectStatus::Completed;
                p.tech_doc = Some(tech_doc.clone());
                p.requirements = requirements.clone();
                p.current_step = Some(total_steps);
                p.total_steps = Some(total_steps);
                p.progress_message = Some(message.clone());
                Ok(())
            })
            .map_err(|e| e.to_string())?;

        self.registry
            .publish(&self.project_id, 100, &message, Some(ProjectStatus::Completed));

        info!(
            "Run {} completed for project {} ({} bytes compiled)",
            self.run_id,
            self.project_id,
            tech_doc.len()
        );
        Ok(())
    }

    fn save_progress(&self, current: u32, total: u32, message: &str) -> Result<(), String> {
        self.store
            .update(&self.project_id, &mut |p| {
                p.current_step = Some(current);
                p.total_steps = Some(total);
                p.progress_message = Some(message.to_string());
                Ok(())
            })
            .map_err(|e| e.to_string())?;
        let percent = (current * 100 / total.max(1)) as u8;
        self.registry.publish(&self.project_id, percent, message, None);
        Ok(())
    }
}

/// Derive summary counts from the generated requirements markdown. Numbered
/// items count as functional requirements, bullets as non-functional; role,
/// use-case and feature mentions are counted from their own lines.
fn summarize_requirements(text: &str) -> RequirementsSummary {
    let mut summary = RequirementsSummary::default();
    for line in text.lines() {
        let trimmed = line.trim_start();
        if is_numbered_item(trimmed) {
            summary.functional_count += 1;
        } else if trimmed.starts_with("- ") || trimmed.starts_with("* ") {
            summary.non_functional_count += 1;
        }
        let lower = trimmed.to_ascii_lowercase();
        if lower.contains("role") && trimmed.starts_with("**") {
            summary.user_roles_count += 1;
        }
        if lower.starts_with("### use case") || lower.starts_with("## use case") {
            summary.use_cases_count += 1;
        }
        if trimmed.starts_with("## ") {
            summary.features_count += 1;
        }
    }
    summary
}

fn is_numbered_item(line: &str) -> bool {
    let digits: String = line.chars().take_while(|c| c.is_ascii_digit()).collect();
    !digits.is_empty() && line[digits.len()..].starts_with('.')
}
