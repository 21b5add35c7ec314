//! Featured carousel at the top of each tab.

use futures::future::join;
use std::sync::Arc;

use crate::feed::{classify, fetch_curated, FeedStatus, Presentation};
use crate::media::{MediaSummary, MediaType};
use crate::tmdb::{FetchError, MetadataSource, Query};

/// Items shown from a popular list.
const FEATURED_POPULAR: usize = 5;
/// Editorial featured mix: this many movie picks and show picks.
const FEATURED_EDITORIAL_MOVIES: usize = 3;
const FEATURED_EDITORIAL_SHOWS: usize = 2;

/// What the featured carousel is built from for one activation.
#[derive(Debug, Clone)]
pub(super) enum FeaturedPlan {
    Popular(MediaType),
    Editorial { movies: Vec<u64>, shows: Vec<u64> },
}

impl FeaturedPlan {
    /// Editorial plan from an activation's shuffled pick order.
    pub(super) fn editorial(movies: &[u64], shows: &[u64]) -> Self {
        FeaturedPlan::Editorial {
            movies: movies.iter().take(FEATURED_EDITORIAL_MOVIES).copied().collect(),
            shows: shows.iter().take(FEATURED_EDITORIAL_SHOWS).copied().collect(),
        }
    }

    pub(super) fn is_editorial(&self) -> bool {
        matches!(self, FeaturedPlan::Editorial { .. })
    }
}

/// Fetches the featured items. Editorial results come back unshuffled.
pub(super) async fn fetch_featured(
    source: Arc<dyn MetadataSource>,
    plan: FeaturedPlan,
    language: String,
) -> Result<Vec<MediaSummary>, FetchError> {
    let query = Query::new(&language);
    match plan {
        FeaturedPlan::Popular(media_type) => {
            let endpoint = format!("/{media_type}/popular");
            let page = source.fetch_page(&endpoint, &query.with("page", 1)).await?;
            Ok(page
                .results
                .iter()
                .take(FEATURED_POPULAR)
                .map(|raw| MediaSummary::from_raw(raw, media_type))
                .collect())
        }
        FeaturedPlan::Editorial { movies, shows } => {
            let (movies, shows) = join(
                fetch_curated(source.as_ref(), MediaType::Movie, &movies, movies.len(), &query),
                fetch_curated(source.as_ref(), MediaType::Tv, &shows, shows.len(), &query),
            )
            .await;

            let mut items = movies.items;
            items.extend(shows.items);
            match movies.failures.into_iter().chain(shows.failures).next() {
                Some(e) if items.is_empty() => Err(e),
                _ => Ok(items),
            }
        }
    }
}

/// Featured carousel state for the current activation.
#[derive(Debug, Clone)]
pub struct Featured {
    status: FeedStatus,
    items: Vec<MediaSummary>,
}

impl Default for Featured {
    fn default() -> Self {
        Self {
            status: FeedStatus::Idle,
            items: Vec::new(),
        }
    }
}

impl Featured {
    pub(super) fn loading() -> Self {
        Self {
            status: FeedStatus::Loading,
            items: Vec::new(),
        }
    }

    pub(super) fn resolve(&mut self, result: Result<Vec<MediaSummary>, FetchError>) {
        match result {
            Ok(items) => {
                self.items = items;
                self.status = FeedStatus::Ready;
            }
            Err(e) => {
                self.status = classify(&e).into();
                if self.status == FeedStatus::Error {
                    tracing::warn!(error = %e, "Failed to load featured media");
                } else {
                    tracing::debug!(error = %e, "Featured media rate limited");
                }
            }
        }
    }

    pub(super) fn items_mut(&mut self) -> &mut Vec<MediaSummary> {
        &mut self.items
    }

    pub fn status(&self) -> FeedStatus {
        self.status
    }

    pub fn items(&self) -> &[MediaSummary] {
        &self.items
    }

    pub fn presentation(&self) -> Presentation<'_> {
        match self.status {
            FeedStatus::RateLimited => Presentation::Hidden,
            FeedStatus::Error => Presentation::Failed,
            FeedStatus::Idle | FeedStatus::Loading => Presentation::Placeholder,
            FeedStatus::Ready => Presentation::Items(&self.items),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tmdb::fake::{item, Reply, ScriptedSource};

    #[tokio::test]
    async fn test_popular_takes_first_five() {
        let source = Arc::new(ScriptedSource::new().list("/tv/popular", 3, 20));
        let items = fetch_featured(source.clone(), FeaturedPlan::Popular(MediaType::Tv), "en-US".into())
            .await
            .unwrap();
        assert_eq!(items.len(), 5);
        assert!(items.iter().all(|m| m.media_type == MediaType::Tv));
        assert_eq!(source.pages_requested("/tv/popular"), [1]);
    }

    #[tokio::test]
    async fn test_editorial_plan_takes_three_and_two() {
        let plan = FeaturedPlan::editorial(&[1, 2, 3, 4], &[10, 11, 12]);
        let source = Arc::new(
            [1, 2, 3]
                .iter()
                .fold(ScriptedSource::new(), |s, &id| s.item(&format!("/movie/{id}"), item(id, "m")))
                .item("/tv/10", item(10, "s"))
                .item("/tv/11", item(11, "s")),
        );
        let items = fetch_featured(source.clone(), plan, "en-US".into()).await.unwrap();
        assert_eq!(items.len(), 5);
        assert_eq!(source.calls().len(), 5);
    }

    #[tokio::test]
    async fn test_editorial_total_failure_is_error() {
        let source = Arc::new(
            ScriptedSource::new()
                .fail("/movie/1", 0, Reply::Status(429))
                .fail("/tv/2", 0, Reply::Status(429)),
        );
        let result = fetch_featured(source, FeaturedPlan::editorial(&[1], &[2]), "en-US".into()).await;

        let mut featured = Featured::loading();
        featured.resolve(result);
        assert_eq!(featured.status(), FeedStatus::RateLimited);
        assert_eq!(featured.presentation(), Presentation::Hidden);
    }
}
