//! Batch analysis
//!
//! Releases are split into fixed-size chunks processed one after another.
//! Inside a chunk, single-release analyses run on the blocking pool with at
//! most `max_concurrency` in flight and may finish in any order; the chunk
//! completes when all of them have.

use super::{ReleaseAnalysis, ReuseManager};
use crate::model::{Release, User};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Completed,
    Empty,
}

/// Counts for one chunk
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    pub batch_size: usize,
    pub success_count: usize,
    pub error_count: usize,
    /// "Release {id}: {error}" per failed release
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub total_releases: usize,
    pub batch_count: usize,
    pub processed_count: usize,
    pub success_count: usize,
    pub error_count: usize,
    pub batches: Vec<BatchResult>,
    pub status: BatchStatus,
    pub duration_ms: u64,
}

/// Split `items` into consecutive chunks of at most `size` (0 is treated as 1)
pub fn partition<T: Clone>(items: &[T], size: usize) -> Vec<Vec<T>> {
    items.chunks(size.max(1)).map(|c| c.to_vec()).collect()
}

impl ReuseManager {
    /// Analyse every release in `releases`, chunked by `batch_size`
    pub async fn process_batch(self: &Arc<Self>, releases: Vec<Release>, user: User) -> BatchReport {
        let start = Instant::now();
        let total = releases.len();
        let chunks = partition(&releases, self.config.batch_size);
        let concurrency = self.config.max_concurrency.max(1);

        tracing::info!(
            "Starting batch reuse analysis of {} releases in {} batches (concurrency {})",
            total,
            chunks.len(),
            concurrency
        );

        let mut batches = Vec::with_capacity(chunks.len());
        let mut processed = 0usize;
        let mut success = 0usize;
        let mut errors = 0usize;

        for (index, chunk) in chunks.into_iter().enumerate() {
            let result = self.process_chunk(chunk, &user, concurrency).await;

            processed += result.batch_size;
            success += result.success_count;
            errors += result.error_count;
            tracing::info!(
                "Batch {} complete: {}/{} releases processed ({:.1}%)",
                index + 1,
                processed,
                total,
                processed as f64 / total as f64 * 100.0
            );
            batches.push(result);
        }

        let status = if total == 0 {
            BatchStatus::Empty
        } else {
            BatchStatus::Completed
        };
        tracing::info!(
            "Batch reuse analysis finished: {} succeeded, {} failed",
            success,
            errors
        );

        BatchReport {
            total_releases: total,
            batch_count: batches.len(),
            processed_count: processed,
            success_count: success,
            error_count: errors,
            batches,
            status,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    async fn process_chunk(self: &Arc<Self>, chunk: Vec<Release>, user: &User, concurrency: usize) -> BatchResult {
        let batch_size = chunk.len();
        let outcomes: Vec<(String, Result<ReleaseAnalysis, tokio::task::JoinError>)> = stream::iter(chunk)
            .map(|release| {
                let manager = Arc::clone(self);
                let user = user.clone();
                async move {
                    let id = release.id.clone();
                    let analysis =
                        tokio::task::spawn_blocking(move || manager.analyze_release(&release, &user)).await;
                    (id, analysis)
                }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut result = BatchResult {
            batch_size,
            ..Default::default()
        };
        for (id, outcome) in outcomes {
            match outcome {
                Ok(analysis) if analysis.is_success() => result.success_count += 1,
                Ok(analysis) => {
                    result.error_count += 1;
                    let message = analysis.error.unwrap_or_else(|| "unknown error".into());
                    result.errors.push(format!("Release {}: {}", id, message));
                }
                Err(e) => {
                    tracing::error!("Release analysis task for {} failed: {}", id, e);
                    result.error_count += 1;
                    result.errors.push(format!("Release {}: {}", id, e));
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{ChecksumRepository, Collaborators, InMemoryChecksumRepository};
    use crate::engine::EngineConfig;
    use crate::model::{Attachment, UserGroup};
    use crate::policy::PolicyEngine;
    use crate::{ChecksumAlgorithm, ReuseError, ReuseResult};

    fn manager(config: EngineConfig, repository: Arc<dyn ChecksumRepository>) -> Arc<ReuseManager> {
        Arc::new(ReuseManager::new(
            config,
            Arc::new(PolicyEngine::default()),
            Collaborators::in_memory(repository),
        ))
    }

    fn releases(n: usize) -> Vec<Release> {
        (0..n)
            .map(|i| {
                Release::new(format!("r{}", i), "lib", i.to_string(), "c")
                    .with_attachment(Attachment::new(format!("a{}", i), "lib.jar").with_sha1(format!("{:040x}", i)))
            })
            .collect()
    }

    /// Fails lookups for one checksum only
    struct PoisonedRepository {
        poisoned: String,
    }

    impl ChecksumRepository for PoisonedRepository {
        fn attachments_by_checksum(&self, checksum: &str, _: ChecksumAlgorithm) -> ReuseResult<Vec<Attachment>> {
            if checksum == self.poisoned {
                return Err(ReuseError::Collaborator("lookup timed out".into()));
            }
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_partition() {
        let items: Vec<u32> = (0..250).collect();
        let sizes: Vec<usize> = partition(&items, 100).iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![100, 100, 50]);
        assert!(partition::<u32>(&[], 100).is_empty());
        assert_eq!(partition(&items[..3], 0).len(), 3);
    }

    #[tokio::test]
    async fn test_250_releases_in_three_batches() {
        let input = releases(250);
        let mgr = manager(
            EngineConfig::default(),
            Arc::new(InMemoryChecksumRepository::from_releases(&input)),
        );
        let user = User::new("u", "batch@example.com", UserGroup::Admin);

        let report = mgr.process_batch(input, user).await;
        assert_eq!(report.batch_count, 3);
        let sizes: Vec<usize> = report.batches.iter().map(|b| b.batch_size).collect();
        assert_eq!(sizes, vec![100, 100, 50]);
        assert_eq!(report.processed_count, 250);
        assert_eq!(report.success_count, 250);
        assert_eq!(report.error_count, 0);
        assert_eq!(report.status, BatchStatus::Completed);
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_the_batch() {
        let input = releases(7);
        let poisoned = format!("{:040x}", 3);
        let config = EngineConfig {
            batch_size: 3,
            max_concurrency: 2,
            ..Default::default()
        };
        let mgr = manager(config, Arc::new(PoisonedRepository { poisoned }));

        let report = mgr.process_batch(input, User::new("u", "u@example.com", UserGroup::User)).await;
        assert_eq!(report.batch_count, 3);
        assert_eq!(report.processed_count, 7);
        assert_eq!(report.success_count, 6);
        assert_eq!(report.error_count, 1);
        assert_eq!(report.batches[1].errors.len(), 1);
        assert!(report.batches[1].errors[0].starts_with("Release r3: "));
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let mgr = manager(EngineConfig::default(), Arc::new(InMemoryChecksumRepository::new()));
        let report = mgr.process_batch(Vec::new(), User::default()).await;
        assert_eq!(report.status, BatchStatus::Empty);
        assert_eq!(report.batch_count, 0);
        assert_eq!(report.processed_count, 0);
    }
}
