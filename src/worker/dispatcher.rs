use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::task::JoinSet;
use tokio::time::{sleep, timeout, Duration};
use tracing::{error, info, warn};

use crate::worker::generator::{Generator, GeneratorError};
use crate::worker::roles::{WorkerRole, WorkerResult};

/// Tuning knobs for one dispatch.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Attempts per worker call, including the first.
    pub attempts: u32,
    /// Per-attempt timeout for the generation call.
    pub timeout_secs: u64,
    /// Launch stagger per worker index, to avoid synchronized bursts against
    /// a rate-limited backend.
    pub jitter_ms: u64,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            attempts: 2,
            timeout_secs: 120,
            jitter_ms: 200,
        }
    }
}

/// Run every configured worker concurrently against the full source text and
/// collect their results as they complete.
///
/// Each completion (success or failure) triggers `on_progress(percent, message)`
/// with `percent = round(100 * completed / total)` in completion order, so for
/// four workers the observer sees exactly 25, 50, 75, 100. A failed worker
/// contributes a `WorkerResult::Err` for its role only; siblings keep running
/// and the returned map always covers every role that finished.
pub async fn dispatch(
    generator: Arc<dyn Generator>,
    source_text: Arc<String>,
    settings: &DispatchSettings,
    mut on_progress: impl FnMut(u8, &str),
) -> HashMap<WorkerRole, WorkerResult> {
    let total = WorkerRole::ALL.len();
    let mut tasks = JoinSet::new();

    for (index, role) in WorkerRole::ALL.into_iter().enumerate() {
        let generator = Arc::clone(&generator);
        let source = Arc::clone(&source_text);
        let settings = settings.clone();

        tasks.spawn(async move {
            let stagger = settings.jitter_ms * index as u64;
            if stagger > 0 {
                sleep(Duration::from_millis(stagger)).await;
            }

            // A panicking worker must not take down its siblings or the run;
            // it degrades to an errored role like any other call failure.
            let result = AssertUnwindSafe(generate_with_retry(
                generator.as_ref(),
                role,
                &source,
                &settings,
            ))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| WorkerResult::Err("worker panicked".to_string()));

            (role, result)
        });
    }

    let mut results = HashMap::with_capacity(total);
    let mut completed = 0usize;

    while let Some(joined) = tasks.join_next().await {
        let (role, result) = match joined {
            Ok(pair) => pair,
            Err(e) => {
                error!("Worker task failed to join: {:?}", e);
                continue;
            }
        };

        completed += 1;
        let percent = ((completed * 100) as f64 / total as f64).round() as u8;

        let message = match &result {
            WorkerResult::Ok(text) => {
                let msg = format!(
                    "{} completed ({} chars) - {}% done",
                    role.label(),
                    text.chars().count(),
                    percent
                );
                info!("{}", msg);
                msg
            }
            WorkerResult::Err(err) => {
                let short: String = err.chars().take(100).collect();
                let msg = format!("{} failed: {}", role.label(), short);
                warn!("{}", msg);
                msg
            }
        };

        on_progress(percent, &message);
        results.insert(role, result);
    }

    results
}

async fn generate_with_retry(
    generator: &dyn Generator,
    role: WorkerRole,
    source_text: &str,
    settings: &DispatchSettings,
) -> WorkerResult {
    let mut last_error = String::new();

    for attempt in 1..=settings.attempts.max(1) {
        let call = generator.generate(role.system_prompt(), source_text);
        match timeout(Duration::from_secs(settings.timeout_secs), call).await {
            Ok(Ok(text)) => return WorkerResult::Ok(text),
            Ok(Err(e)) => {
                warn!(
                    "Worker {} attempt {}/{} failed: {}",
                    role.key(),
                    attempt,
                    settings.attempts,
                    e
                );
                last_error = e.to_string();
            }
            Err(_) => {
                let e = GeneratorError::Timeout(settings.timeout_secs);
                warn!(
                    "Worker {} attempt {}/{} timed out",
                    role.key(),
                    attempt,
                    settings.attempts
                );
                last_error = e.to_string();
            }
        }
    }

    WorkerResult::Err(last_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::generator::testing::CountingGenerator;
    use crate::worker::generator::SimulatedGenerator;
    use async_trait::async_trait;

    fn fast_settings() -> DispatchSettings {
        DispatchSettings {
            attempts: 2,
            timeout_secs: 5,
            jitter_ms: 0,
        }
    }

    #[tokio::test]
    async fn percent_sequence_is_strictly_increasing_to_100() {
        let generator = Arc::new(SimulatedGenerator::instant());
        let source = Arc::new("a small spec".to_string());
        let mut percents = Vec::new();

        let results = dispatch(generator, source, &fast_settings(), |pct, _| {
            percents.push(pct)
        })
        .await;

        assert_eq!(percents, vec![25, 50, 75, 100]);
        assert_eq!(results.len(), 4);
        assert!(results.values().all(|r| r.is_ok()));
    }

    #[tokio::test]
    async fn failing_worker_does_not_fail_the_dispatch() {
        // The database prompt contains "database architect"; only that role fails.
        let generator = Arc::new(CountingGenerator::failing_on("database architect"));
        let source = Arc::new("spec body".to_string());

        let results = dispatch(generator.clone(), source, &fast_settings(), |_, _| {}).await;

        assert_eq!(results.len(), 4);
        assert!(matches!(
            results.get(&WorkerRole::DatabaseSchema),
            Some(WorkerResult::Err(_))
        ));
        for role in [
            WorkerRole::Requirements,
            WorkerRole::Architecture,
            WorkerRole::ApiSpec,
        ] {
            assert!(results.get(&role).unwrap().is_ok(), "{:?} should succeed", role);
        }
        // Three successful single calls plus two attempts for the failing role.
        assert_eq!(generator.call_count(), 5);
    }

    struct HangingGenerator;

    #[async_trait]
    impl crate::worker::generator::Generator for HangingGenerator {
        async fn generate(
            &self,
            _system_prompt: &str,
            _source_text: &str,
        ) -> Result<String, GeneratorError> {
            sleep(Duration::from_secs(3600)).await;
            unreachable!()
        }

        fn name(&self) -> &str {
            "hanging"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn hung_worker_times_out_instead_of_blocking_forever() {
        let generator = Arc::new(HangingGenerator);
        let source = Arc::new("spec".to_string());
        let settings = DispatchSettings {
            attempts: 1,
            timeout_secs: 1,
            jitter_ms: 0,
        };

        let results = dispatch(generator, source, &settings, |_, _| {}).await;

        assert_eq!(results.len(), 4);
        for result in results.values() {
            match result {
                WorkerResult::Err(msg) => assert!(msg.contains("timed out")),
                WorkerResult::Ok(_) => panic!("expected timeout"),
            }
        }
    }
}
