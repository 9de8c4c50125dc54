//! Several independent completions for one prompt.

use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::debug;

use ragbench_core::error::{Error, Result};
use ragbench_core::ports::Ports;
use ragbench_core::traits::Generator;
use ragbench_core::traits::Stage;
use ragbench_core::types::ChatMessage;

/// Issues `n` concurrent calls to one generator and collects the replies in
/// completion order. Any failing call fails the whole request.
#[derive(Clone)]
pub struct MultiSampleGenerator {
    generator: Arc<dyn Generator>,
    n: usize,
}

impl MultiSampleGenerator {
    pub fn new(generator: Arc<dyn Generator>, n: usize) -> Self { Self { generator, n } }

    pub fn samples(&self) -> usize { self.n }

    pub async fn sample(&self, messages: &[ChatMessage]) -> Result<Vec<String>> {
        let mut calls = JoinSet::new();
        for _ in 0..self.n {
            let generator = Arc::clone(&self.generator);
            let messages = messages.to_vec();
            calls.spawn_blocking(move || generator.generate(&messages));
        }

        let mut replies = Vec::with_capacity(self.n);
        while let Some(joined) = calls.join_next().await {
            let reply = joined
                .map_err(|e| Error::Generation(format!("sample task failed: {e}")))?
                .map_err(|e| Error::Generation(format!("{e:#}")))?;
            replies.push(reply);
        }
        debug!(samples = replies.len(), "generation finished");
        Ok(replies)
    }

    /// Drives [`sample`](Self::sample) on a private runtime. Called from
    /// inside a runtime, the private one gets a thread of its own.
    pub fn sample_blocking(&self, messages: &[ChatMessage]) -> Result<Vec<String>> {
        if tokio::runtime::Handle::try_current().is_err() {
            return self.sample_on_private_runtime(messages);
        }
        std::thread::scope(|scope| match scope.spawn(|| self.sample_on_private_runtime(messages)).join() {
            Ok(replies) => replies,
            Err(_) => Err(Error::Generation("sampling thread panicked".into())),
        })
    }

    fn sample_on_private_runtime(&self, messages: &[ChatMessage]) -> Result<Vec<String>> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::Operation(format!("failed to start generation runtime: {e}")))?;
        runtime.block_on(self.sample(messages))
    }
}

impl Stage for MultiSampleGenerator {
    fn run(&self, mut inputs: Ports) -> Result<Ports> {
        let messages = match inputs.take_messages("messages")? {
            Some(messages) => messages,
            None => inputs.require_messages("prompt")?,
        };
        Ok(Ports::new().with("replies", self.sample_blocking(&messages)?))
    }
}
