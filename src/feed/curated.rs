use futures::future::join_all;

use super::guard::{classify, FailureClass};
use crate::media::{MediaSummary, MediaType};
use crate::tmdb::{FetchError, MetadataSource, Query};

/// Sub-batch size for by-id lookups unless configured otherwise.
pub const DEFAULT_EDITORIAL_BATCH_SIZE: usize = 10;

/// Result of resolving a fixed id list.
#[derive(Debug, Default)]
pub struct CuratedOutcome {
    /// Records of every sub-batch that fully succeeded, in list order.
    pub items: Vec<MediaSummary>,
    /// First failure of each failed sub-batch.
    pub failures: Vec<FetchError>,
    pub batches: usize,
}

impl CuratedOutcome {
    /// Failure class when nothing at all could be resolved.
    pub fn failure_class(&self) -> Option<FailureClass> {
        if !self.items.is_empty() {
            return None;
        }
        self.failures.first().map(classify)
    }
}

/// Resolves `ids` through single-record lookups, split into sub-batches of
/// `batch_size`.
///
/// All sub-batches run concurrently, and every lookup inside a sub-batch
/// runs concurrently too. A sub-batch contributes only if every lookup in it
/// succeeded; a failed sub-batch is dropped whole and the others are kept.
pub async fn fetch_curated(
    source: &dyn MetadataSource,
    media_type: MediaType,
    ids: &[u64],
    batch_size: usize,
    query: &Query,
) -> CuratedOutcome {
    let chunks: Vec<&[u64]> = ids.chunks(batch_size.max(1)).collect();
    let batches = chunks.len();

    let results = join_all(chunks.into_iter().map(|chunk| async move {
        let lookups = chunk.iter().map(|&id| async move {
            let path = media_type.item_path(id);
            source.fetch_item(&path, query).await
        });
        join_all(lookups)
            .await
            .into_iter()
            .collect::<Result<Vec<_>, FetchError>>()
    }))
    .await;

    let mut outcome = CuratedOutcome {
        batches,
        ..CuratedOutcome::default()
    };
    for result in results {
        match result {
            Ok(raw) => outcome
                .items
                .extend(raw.iter().map(|r| MediaSummary::from_raw(r, media_type))),
            Err(e) => {
                tracing::debug!(media = %media_type, error = %e, "Curated sub-batch failed");
                outcome.failures.push(e);
            }
        }
    }
    outcome
}
