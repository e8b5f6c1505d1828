use async_trait::async_trait;
use rand::Rng;
use tokio::time::{sleep, Duration};
use tracing::debug;

/// Generation call errors.
#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("generation call failed: {0}")]
    Call(String),

    #[error("generation call timed out after {0}s")]
    Timeout(u64),
}

/// Black-box text generation backend.
///
/// Each worker invokes this once per attempt with its role prompt and the
/// full source text. Timeouts and retries are applied by the dispatcher's
/// worker wrapper, not by implementations.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(
        &self,
        system_prompt: &str,
        source_text: &str,
    ) -> Result<String, GeneratorError>;

    /// Backend name, for logging.
    fn name(&self) -> &str;
}

/// Default backend: produces a synthetic markdown section after a short
/// random delay, failing a configurable percentage of calls. Stands in for
/// a real model API during development and in tests.
pub struct SimulatedGenerator {
    delay_ms: (u64, u64),
    failure_percent: u8,
}

impl SimulatedGenerator {
    pub fn new(delay_ms: (u64, u64), failure_percent: u8) -> Self {
        Self {
            delay_ms,
            failure_percent,
        }
    }

    /// No delay, no failures. Used by tests that only care about flow.
    pub fn instant() -> Self {
        Self::new((0, 0), 0)
    }
}

impl Default for SimulatedGenerator {
    fn default() -> Self {
        Self::new((200, 1200), 0)
    }
}

#[async_trait]
impl Generator for SimulatedGenerator {
    async fn generate(
        &self,
        system_prompt: &str,
        source_text: &str,
    ) -> Result<String, GeneratorError> {
        // Draw before awaiting: thread_rng is not Send.
        let (delay, failed) = {
            let mut rng = rand::thread_rng();
            let delay = if self.delay_ms.1 > self.delay_ms.0 {
                rng.gen_range(self.delay_ms.0..=self.delay_ms.1)
            } else {
                self.delay_ms.0
            };
            let failed = self.failure_percent > 0
                && rng.gen_range(0..100u8) < self.failure_percent;
            (delay, failed)
        };

        if delay > 0 {
            sleep(Duration::from_millis(delay)).await;
        }

        if failed {
            debug!("Simulated generation failure");
            return Err(GeneratorError::Call(
                "simulated backend refused the request".to_string(),
            ));
        }

        let preview: String = source_text.chars().take(120).collect();
        let focus: String = system_prompt
            .split('.')
            .next()
            .unwrap_or(system_prompt)
            .chars()
            .take(100)
            .collect();

        Ok(format!(
            "## Overview\n\n\
             {focus}. Derived from {} characters of source material.\n\n\
             1. **Scope**: covers the behaviour described in the source document.\n\
             2. **Detail**: section content synthesized for `{}`.\n\n\
             ```mermaid\ngraph TD\n    A[Source Document] --> B[Generated Section]\n```\n",
            source_text.chars().count(),
            preview.replace('`', "'").replace('\n', " "),
        ))
    }

    fn name(&self) -> &str {
        "simulated"
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Test double that counts calls and fails for configured prompts.
    pub struct CountingGenerator {
        calls: AtomicUsize,
        fail_when_prompt_contains: Option<String>,
    }

    impl CountingGenerator {
        pub fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_when_prompt_contains: None,
            }
        }

        pub fn failing_on(marker: &str) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_when_prompt_contains: Some(marker.to_string()),
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Generator for CountingGenerator {
        async fn generate(
            &self,
            system_prompt: &str,
            _source_text: &str,
        ) -> Result<String, GeneratorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(marker) = &self.fail_when_prompt_contains {
                if system_prompt.contains(marker) {
                    return Err(GeneratorError::Call("induced failure".to_string()));
                }
            }
            Ok(format!("generated for: {}", &system_prompt[..20.min(system_prompt.len())]))
        }

        fn name(&self) -> &str {
            "counting"
        }
    }
}
