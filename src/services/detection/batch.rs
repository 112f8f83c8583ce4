// Batch Scoring
// Scores many texts with bounded parallelism; results keep input order.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::models::{ScoreOptions, ScoreResult};

use super::engine::ScoringEngine;

pub const DEFAULT_BATCH_CONCURRENCY: usize = 4;

/// Score `texts` on blocking worker threads, at most `max_concurrency` at a
/// time. A text whose task fails gets the neutral result.
pub async fn score_batch(
    engine: Arc<ScoringEngine>,
    texts: Vec<String>,
    options: ScoreOptions,
    max_concurrency: usize,
) -> Vec<ScoreResult> {
    let started = Instant::now();
    let total = texts.len();
    if total == 0 {
        return Vec::new();
    }

    let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let mut join_set: JoinSet<(usize, ScoreResult)> = JoinSet::new();

    for (index, text) in texts.into_iter().enumerate() {
        let engine = engine.clone();
        let semaphore = semaphore.clone();
        let options = options.clone();
        join_set.spawn(async move {
            let _permit = semaphore.acquire_owned().await;
            let scored = tokio::task::spawn_blocking(move || engine.score_with_options(&text, &options)).await;
            match scored {
                Ok(result) => (index, result),
                Err(e) => {
                    warn!("[batch] scoring task {} failed: {}", index, e);
                    (index, ScoreResult::neutral())
                }
            }
        });
    }

    let mut results: Vec<Option<ScoreResult>> = vec![None; total];
    let mut done = 0usize;
    while let Some(res) = join_set.join_next().await {
        done += 1;
        if done == total || done % 25 == 0 {
            info!(
                "[batch] progress: {}/{} (elapsed_ms={})",
                done,
                total,
                started.elapsed().as_millis()
            );
        }
        match res {
            Ok((index, result)) => results[index] = Some(result),
            Err(e) => warn!("[batch] task join failed: {}", e),
        }
    }

    results
        .into_iter()
        .map(|r| r.unwrap_or_else(ScoreResult::neutral))
        .collect()
}
