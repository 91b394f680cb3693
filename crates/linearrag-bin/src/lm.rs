//! The LM call is an out-of-scope external collaborator (core emits prompts,
//! the driver parses answers — see `linearrag_core::retrieval::answer`).
//! This module supplies only the trait boundary plus a deterministic
//! reference implementation, in the same spirit as
//! `linearrag_core::embedding::DeterministicEmbeddings`: enough to run the
//! pipeline end to end without a live model deployment wired in.

use async_trait::async_trait;

#[async_trait]
pub trait LmCaller: Send + Sync {
    async fn call(&self, prompt: &str) -> anyhow::Result<String>;
}

/// Answers every prompt with the first MCQ-style letter or yes/no token it
/// finds already present in the prompt's context, falling back to "A". Not a
/// real model — a stand-in so `linearrag query` is runnable without one.
#[derive(Debug, Default)]
pub struct EchoLm;

#[async_trait]
impl LmCaller for EchoLm {
    async fn call(&self, prompt: &str) -> anyhow::Result<String> {
        let lower = prompt.to_lowercase();
        let answer = if lower.contains("yes") {
            "Yes"
        } else if lower.contains("no") {
            "No"
        } else {
            "A"
        };
        Ok(answer.to_string())
    }
}
