/// Background metadata hydration with bounded concurrency
///
/// After the catalog renders, a fixed-size pool of workers fetches each
/// visible card's release details and distributes the result: the formats
/// summary to the card, the sanitized notes to every overlay panel sharing
/// the release id. The pool is a shared atomic claim counter plus exactly
/// `concurrency` tokio tasks; no index is ever claimed twice, and a failed
/// target is silently abandoned with no retry and no effect on the others.
///
/// The data source itself is a black box behind `MetadataSource`: the
/// shipped implementation reads each release's `details.json`, tests inject
/// deterministic mocks.

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::state::data::extract_numeric_id;

/// Worker-pool width used for catalog hydration
pub const HYDRATION_CONCURRENCY: usize = 4;

/// Structured release details served by the metadata source.
/// Every field is optional; absence means "nothing to update".
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ReleaseDetails {
    /// Raw notes text, may contain `[[REMOVE:...]]` marker tokens
    #[serde(default)]
    pub notes: Option<String>,
    /// Ordered pre-rendered format summary lines
    #[serde(default)]
    pub formats_lines: Option<Vec<String>>,
}

/// Why one hydration unit was abandoned
#[derive(Debug, Error)]
pub enum HydrateError {
    #[error("release has no details document")]
    Missing,
    #[error("failed to read details: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed details payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

pub type FetchFuture = Pin<Box<dyn Future<Output = Result<ReleaseDetails, HydrateError>> + Send>>;

/// Black-box source of release metadata, keyed by numeric release id
pub trait MetadataSource: Send + Sync {
    fn fetch(&self, pk: u32) -> FetchFuture;
}

/// One unit of hydration work: a card awaiting its metadata fetch
#[derive(Debug, Clone)]
pub struct HydrationTarget {
    /// Card index, for distributing the formats summary
    pub index: usize,
    /// Raw release identifier; targets without a numeric id are skipped
    pub release_id: String,
}

/// A successful fetch, ready to apply to all matching cards and panels
#[derive(Debug, Clone, PartialEq)]
pub struct HydrationOutcome {
    pub index: usize,
    pub pk: u32,
    pub details: ReleaseDetails,
}

/// Launch exactly `concurrency` workers over the target list.
///
/// Workers claim indices from a shared monotone counter until the list is
/// exhausted, then terminate; outcomes arrive on the returned channel in
/// completion order, which is unspecified across workers. The channel
/// closes once every worker has finished. Must be called inside a tokio
/// runtime.
pub fn spawn_pool(
    targets: Vec<HydrationTarget>,
    concurrency: usize,
    source: Arc<dyn MetadataSource>,
) -> mpsc::UnboundedReceiver<HydrationOutcome> {
    let (tx, rx) = mpsc::unbounded_channel();
    let targets = Arc::new(targets);
    let claim = Arc::new(AtomicUsize::new(0));

    for worker in 0..concurrency {
        let targets = Arc::clone(&targets);
        let claim = Arc::clone(&claim);
        let source = Arc::clone(&source);
        let tx = tx.clone();

        tokio::spawn(async move {
            loop {
                // Atomic claim: no two workers ever see the same index
                let i = claim.fetch_add(1, Ordering::SeqCst);
                let Some(target) = targets.get(i) else { break };
                let Some(pk) = extract_numeric_id(&target.release_id) else {
                    continue;
                };
                match source.fetch(pk).await {
                    Ok(details) => {
                        let outcome = HydrationOutcome {
                            index: target.index,
                            pk,
                            details,
                        };
                        if tx.send(outcome).is_err() {
                            // Receiver gone; nothing left to hydrate for
                            break;
                        }
                    }
                    Err(err) => {
                        log::debug!("hydration of release {} abandoned: {}", pk, err);
                    }
                }
            }
            log::trace!("hydration worker {} done", worker);
        });
    }

    rx
}

/// Metadata source backed by per-release `details.json` documents
pub struct FolderSource {
    documents: HashMap<u32, PathBuf>,
}

impl FolderSource {
    pub fn new(documents: HashMap<u32, PathBuf>) -> Self {
        FolderSource { documents }
    }
}

impl MetadataSource for FolderSource {
    fn fetch(&self, pk: u32) -> FetchFuture {
        let path = self.documents.get(&pk).cloned();
        Box::pin(async move {
            let path = path.ok_or(HydrateError::Missing)?;
            let bytes = tokio::fs::read(&path).await?;
            let details = serde_json::from_slice(&bytes)?;
            Ok(details)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Deterministic source that logs every claim it serves
    struct ClaimLog {
        claims: Mutex<Vec<u32>>,
        fail_odd: bool,
    }

    impl ClaimLog {
        fn new(fail_odd: bool) -> Arc<Self> {
            Arc::new(ClaimLog {
                claims: Mutex::new(Vec::new()),
                fail_odd,
            })
        }
    }

    impl MetadataSource for ClaimLog {
        fn fetch(&self, pk: u32) -> FetchFuture {
            self.claims.lock().unwrap().push(pk);
            let fail = self.fail_odd && pk % 2 == 1;
            Box::pin(async move {
                if fail {
                    Err(HydrateError::Missing)
                } else {
                    Ok(ReleaseDetails {
                        notes: Some(format!("notes for {}", pk)),
                        formats_lines: None,
                    })
                }
            })
        }
    }

    fn targets(n: usize) -> Vec<HydrationTarget> {
        (0..n)
            .map(|i| HydrationTarget {
                index: i,
                release_id: format!("release-{}", i),
            })
            .collect()
    }

    async fn collect(
        mut rx: mpsc::UnboundedReceiver<HydrationOutcome>,
    ) -> Vec<HydrationOutcome> {
        let mut out = Vec::new();
        while let Some(outcome) = rx.recv().await {
            out.push(outcome);
        }
        out
    }

    #[tokio::test]
    async fn test_every_target_claimed_exactly_once() {
        let source = ClaimLog::new(false);
        let rx = spawn_pool(targets(10), 4, source.clone());
        let outcomes = collect(rx).await;

        assert_eq!(outcomes.len(), 10);
        let mut claims = source.claims.lock().unwrap().clone();
        claims.sort_unstable();
        assert_eq!(claims, (0..10).collect::<Vec<u32>>());
    }

    #[tokio::test]
    async fn test_failures_are_dropped_silently() {
        let source = ClaimLog::new(true);
        let rx = spawn_pool(targets(10), 4, source.clone());
        let mut outcomes = collect(rx).await;

        // Odd releases failed; the rest were unaffected, no retries issued
        outcomes.sort_by_key(|o| o.pk);
        let pks: Vec<u32> = outcomes.iter().map(|o| o.pk).collect();
        assert_eq!(pks, vec![0, 2, 4, 6, 8]);
        assert_eq!(source.claims.lock().unwrap().len(), 10);
    }

    #[tokio::test]
    async fn test_more_workers_than_targets() {
        let source = ClaimLog::new(false);
        let rx = spawn_pool(targets(2), 8, source.clone());
        let outcomes = collect(rx).await;
        assert_eq!(outcomes.len(), 2);
    }

    #[tokio::test]
    async fn test_targets_without_numeric_id_are_skipped() {
        let source = ClaimLog::new(false);
        let mut list = targets(3);
        list[1].release_id = "no-digits".to_string();
        let rx = spawn_pool(list, 2, source.clone());
        let outcomes = collect(rx).await;

        let mut pks: Vec<u32> = outcomes.iter().map(|o| o.pk).collect();
        pks.sort_unstable();
        assert_eq!(pks, vec![0, 2]);
    }

    #[tokio::test]
    async fn test_outcome_carries_details() {
        let source = ClaimLog::new(false);
        let rx = spawn_pool(targets(1), 1, source);
        let outcomes = collect(rx).await;
        assert_eq!(
            outcomes[0].details.notes.as_deref(),
            Some("notes for 0")
        );
    }

    #[test]
    fn test_details_payload_fields_are_optional() {
        let details: ReleaseDetails = serde_json::from_str("{}").unwrap();
        assert_eq!(details, ReleaseDetails::default());

        let details: ReleaseDetails =
            serde_json::from_str(r#"{"notes": "n", "formats_lines": ["a", "b"]}"#).unwrap();
        assert_eq!(details.notes.as_deref(), Some("n"));
        assert_eq!(
            details.formats_lines,
            Some(vec!["a".to_string(), "b".to_string()])
        );
    }
}
