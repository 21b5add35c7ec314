//! Discovery session: the feeds mounted for the active tab.
//!
//! The session is the single owner of every feed on the discover surface.
//! It mounts carousels when a tab activates, unmounts them when the tab
//! changes, and applies fetch results as they come back over its event
//! channel. Results tagged with an older activation, or addressed to a
//! loader that has been unmounted, are dropped on arrival.
//!
//! ```text
//! activate(tab) ──> mount rows (gated) ──> viewport scroll ──> poll gates ──> spawn batch
//!                                                                               │
//!        handle(event) <──────────────── mpsc ────────────────────────────────────┘
//! ```

mod featured;
mod tab;

pub use featured::Featured;
pub use tab::{SessionOptions, Tab};

use featured::{fetch_featured, FeaturedPlan};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::catalog;
use crate::feed::{
    anchor_id, classify, fetch_curated, BatchReport, CuratedOutcome, FailureClass, FeedIdentity,
    FeedKind, FeedLoader, FeedStatus, FetchContext, LoaderId, MediaGroup, Viewport, VisibilityGate,
};
use crate::media::{MediaSummary, MediaType};
use crate::tmdb::{FetchError, Genre, Query};

const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug)]
enum SessionEvent {
    Batch(BatchReport),
    Curated {
        activation: u64,
        media_type: MediaType,
        outcome: CuratedOutcome,
    },
    Featured {
        activation: u64,
        result: Result<Vec<MediaSummary>, FetchError>,
    },
    Genres {
        activation: u64,
        media_type: MediaType,
        result: Result<Vec<Genre>, FetchError>,
    },
}

impl From<BatchReport> for SessionEvent {
    fn from(report: BatchReport) -> Self {
        SessionEvent::Batch(report)
    }
}

/// How a newly mounted feed gets its data.
enum Supply {
    /// Fetch once the anchor comes into range.
    Gated,
    /// Fetch right away.
    Immediate,
    /// Items handed in by the session; never fetch.
    Preloaded(Vec<MediaSummary>),
    /// Filled in later by the session (editorial rows).
    Pending,
}

struct Mounted {
    loader: FeedLoader,
    refs: usize,
}

/// A carousel slot: a display name bound to a mounted feed.
#[derive(Debug, Clone)]
struct Row {
    name: String,
    anchor: String,
    loader: LoaderId,
}

/// A mounted carousel as a renderer sees it.
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    pub name: &'a str,
    pub anchor: &'a str,
    pub feed: &'a FeedLoader,
}

#[derive(Debug, Default)]
struct EditorialMix {
    movies: Option<Vec<MediaSummary>>,
    shows: Option<Vec<MediaSummary>>,
    mixed: Vec<MediaSummary>,
}

pub struct DiscoverySession {
    ctx: FetchContext,
    options: SessionOptions,
    viewport: Viewport,
    rng: StdRng,

    tab: Option<Tab>,
    activation: u64,
    next_loader: u64,

    mounted: BTreeMap<LoaderId, Mounted>,
    by_identity: HashMap<FeedIdentity, LoaderId>,
    rows: Vec<Row>,
    provider: Option<Row>,
    /// Provider id chosen by the user; survives tab switches.
    provider_choice: Option<String>,
    genre: Option<Row>,
    genres: Vec<Genre>,
    preloaded: HashMap<(MediaType, u64), Vec<MediaSummary>>,

    featured: Featured,
    editorial: EditorialMix,

    /// Spawned fetches whose event has not been handled yet.
    pending: usize,
    tx: mpsc::Sender<SessionEvent>,
    rx: mpsc::Receiver<SessionEvent>,
}

impl std::fmt::Debug for DiscoverySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoverySession")
            .field("tab", &self.tab)
            .field("activation", &self.activation)
            .field("rows", &self.rows.len())
            .field("mounted", &self.mounted.len())
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}

impl DiscoverySession {
    pub fn new(ctx: FetchContext, viewport: Viewport, options: SessionOptions) -> Self {
        let rng = options
            .seed
            .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            ctx,
            options,
            viewport,
            rng,
            tab: None,
            activation: 0,
            next_loader: 1,
            mounted: BTreeMap::new(),
            by_identity: HashMap::new(),
            rows: Vec::new(),
            provider: None,
            provider_choice: None,
            genre: None,
            genres: Vec::new(),
            preloaded: HashMap::new(),
            featured: Featured::default(),
            editorial: EditorialMix::default(),
            pending: 0,
            tx,
            rx,
        }
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn tab(&self) -> Option<Tab> {
        self.tab
    }

    /// Generation counter, bumped on every tab change.
    pub fn activation(&self) -> u64 {
        self.activation
    }

    /// Fetches spawned but not yet handled.
    pub fn in_flight(&self) -> usize {
        self.pending
    }

    /// Switches to `tab`, unmounting everything from the previous tab.
    /// Re-activating the current tab does nothing.
    pub fn activate(&mut self, tab: Tab) -> bool {
        if self.tab == Some(tab) {
            return false;
        }

        self.unmount_all();
        self.tab = Some(tab);
        self.activation += 1;
        self.featured = Featured::loading();
        self.editorial = EditorialMix::default();
        tracing::info!(tab = %tab, activation = self.activation, "Activated tab");

        match tab.media_type() {
            Some(media_type) => {
                for group in catalog::categories(media_type) {
                    self.mount_row(&group, Supply::Gated);
                }
                self.spawn_genres(media_type);
                self.spawn_featured(FeaturedPlan::Popular(media_type));
                if let Some(id) = self.provider_choice.clone() {
                    self.mount_provider(media_type, &id);
                }
            }
            None => {
                // Shuffled once here; every consumer of this activation sees the same order
                let mut movies = self.ctx.editor_picks_movies.clone();
                let mut shows = self.ctx.editor_picks_shows.clone();
                movies.shuffle(&mut self.rng);
                shows.shuffle(&mut self.rng);

                for (media_type, ids) in [(MediaType::Movie, &movies), (MediaType::Tv, &shows)] {
                    self.mount_row(&catalog::editorial(media_type), Supply::Pending);
                    self.spawn_curated(media_type, ids.clone());
                }
                self.spawn_featured(FeaturedPlan::editorial(&movies, &shows));
            }
        }

        self.relayout();
        true
    }

    /// Shows the spotlight feed of a watch provider on the current tab.
    ///
    /// The choice is remembered across tab switches. Selecting the provider
    /// that is already shown is a no-op; selecting another one discards the
    /// previous provider feed. Returns `true` if a new feed was mounted.
    pub fn select_provider(&mut self, provider_id: &str) -> bool {
        self.provider_choice = Some(provider_id.to_string());
        match self.tab.and_then(Tab::media_type) {
            Some(media_type) => self.mount_provider(media_type, provider_id),
            None => false,
        }
    }

    pub fn clear_provider(&mut self) {
        self.provider_choice = None;
        if let Some(old) = self.provider.take() {
            self.unmount(old.loader);
        }
    }

    /// Shows the spotlight feed of a genre on the current tab. Cleared on
    /// tab switch.
    pub fn select_genre(&mut self, genre: &Genre) -> bool {
        let Some(media_type) = self.tab.and_then(Tab::media_type) else {
            return false;
        };
        let group = MediaGroup::genre(genre, media_type);
        let identity = group.identity();
        if self.genre.as_ref().is_some_and(|s| self.identity_of(s.loader) == Some(&identity)) {
            return false;
        }
        if let Some(old) = self.genre.take() {
            self.unmount(old.loader);
        }
        let loader = self.mount(identity, Supply::Immediate, None);
        self.genre = Some(Row {
            anchor: group.anchor(),
            name: group.name,
            loader,
        });
        true
    }

    pub fn clear_genre(&mut self) {
        if let Some(old) = self.genre.take() {
            self.unmount(old.loader);
        }
    }

    /// Supplies results for a genre that were computed elsewhere. The
    /// genre's carousel then never fetches. Applies to a row that is
    /// already mounted but has not started loading, and to rows mounted
    /// later.
    pub fn preload_genre(&mut self, media_type: MediaType, genre_id: u64, items: Vec<MediaSummary>) {
        let identity = FeedIdentity::new(FeedKind::Genre, media_type, &genre_id.to_string());
        if let Some(&id) = self.by_identity.get(&identity) {
            if let Some(mounted) = self.mounted.get_mut(&id) {
                if mounted.loader.state().status() == FeedStatus::Idle {
                    mounted.loader = FeedLoader::preloaded(id, identity, items.clone());
                }
            }
        }
        self.preloaded.insert((media_type, genre_id), items);
    }

    /// Scrolls the carousel for `name` on the current tab into view.
    /// Does nothing (and returns `false`) if no such carousel is laid out.
    pub fn scroll_to_category(&mut self, name: &str) -> bool {
        let Some(tab) = self.tab else {
            return false;
        };
        let anchor = anchor_id(name, tab.anchor_media_type());
        if self.viewport.scroll_into_view(&anchor) {
            tracing::debug!(anchor = %anchor, "Scrolled to category");
            true
        } else {
            tracing::debug!(anchor = %anchor, "No carousel for category");
            false
        }
    }

    /// Requests the next window for a mounted feed.
    pub fn load_more(&mut self, identity: &FeedIdentity) -> bool {
        let Some(id) = self.by_identity.get(identity).copied() else {
            return false;
        };
        let Some(mounted) = self.mounted.get_mut(&id) else {
            return false;
        };
        let started = mounted.loader.load_more(&self.ctx, &self.tx);
        if started {
            self.pending += 1;
        }
        started
    }

    /// Picks a random movie from the movie feeds that finished loading.
    pub fn random_pick(&mut self) -> Option<MediaSummary> {
        let candidates: Vec<&MediaSummary> = self
            .mounted
            .values()
            .map(|m| m.loader.state())
            .filter(|s| s.identity().media_type() == MediaType::Movie && s.status() == FeedStatus::Ready)
            .flat_map(|s| s.items())
            .collect();
        let pick = candidates.choose(&mut self.rng).map(|m| (*m).clone());
        if let Some(pick) = &pick {
            tracing::debug!(id = pick.id, title = %pick.title, "Random pick");
        }
        pick
    }

    /// Carousel rows of the current tab, top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = RowView<'_>> {
        self.rows.iter().filter_map(|row| self.view(row))
    }

    pub fn provider_spotlight(&self) -> Option<RowView<'_>> {
        self.provider.as_ref().and_then(|row| self.view(row))
    }

    pub fn genre_spotlight(&self) -> Option<RowView<'_>> {
        self.genre.as_ref().and_then(|row| self.view(row))
    }

    /// Genres offered on the current tab.
    pub fn genres(&self) -> &[Genre] {
        &self.genres
    }

    pub fn feed(&self, identity: &FeedIdentity) -> Option<&FeedLoader> {
        let id = self.by_identity.get(identity)?;
        self.mounted.get(id).map(|m| &m.loader)
    }

    /// Number of distinct feeds mounted.
    pub fn mounted_feeds(&self) -> usize {
        self.mounted.len()
    }

    pub fn featured(&self) -> &Featured {
        &self.featured
    }

    /// Movie and show editor picks combined and shuffled. Empty until both
    /// lists have resolved.
    pub fn editorial_mix(&self) -> &[MediaSummary] {
        &self.editorial.mixed
    }

    /// Anchors of the current rows in layout order.
    pub fn anchors(&self) -> Vec<String> {
        self.rows.iter().map(|r| r.anchor.clone()).collect()
    }

    /// Starts the first batch of every row whose gate has just opened.
    pub fn poll_visibility(&mut self) -> usize {
        let mut started = 0;
        for row in &self.rows {
            if let Some(mounted) = self.mounted.get_mut(&row.loader) {
                if mounted.loader.poll_gate(&self.ctx, &self.tx) {
                    started += 1;
                }
            }
        }
        self.pending += started;
        started
    }

    /// Applies every event that has already arrived, then polls the gates.
    /// Never waits. Returns the number of events applied.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.rx.try_recv() {
            self.handle(event);
            applied += 1;
        }
        self.poll_visibility();
        applied
    }

    /// Runs until nothing is in flight and no gate is waiting to open at
    /// the current scroll position.
    pub async fn settle(&mut self) {
        loop {
            self.poll_visibility();
            if self.pending == 0 {
                break;
            }
            match self.rx.recv().await {
                Some(event) => self.handle(event),
                None => break,
            }
        }
    }

    fn view<'a>(&'a self, row: &'a Row) -> Option<RowView<'a>> {
        self.mounted.get(&row.loader).map(|m| RowView {
            name: &row.name,
            anchor: &row.anchor,
            feed: &m.loader,
        })
    }

    fn identity_of(&self, id: LoaderId) -> Option<&FeedIdentity> {
        self.mounted.get(&id).map(|m| m.loader.identity())
    }

    fn handle(&mut self, event: SessionEvent) {
        self.pending = self.pending.saturating_sub(1);
        match event {
            SessionEvent::Batch(report) => match self.mounted.get_mut(&report.loader) {
                Some(mounted) => mounted.loader.apply(report),
                None => {
                    tracing::debug!(loader = %report.loader, "Discarding batch for unmounted feed")
                }
            },
            SessionEvent::Curated {
                activation,
                media_type,
                outcome,
            } => {
                if !self.is_stale(activation) {
                    self.install_editorial(media_type, outcome);
                }
            }
            SessionEvent::Featured { activation, result } => {
                if !self.is_stale(activation) {
                    self.featured.resolve(result);
                    if self.tab == Some(Tab::EditorPicks) {
                        self.featured.items_mut().shuffle(&mut self.rng);
                    }
                }
            }
            SessionEvent::Genres {
                activation,
                media_type,
                result,
            } => {
                if !self.is_stale(activation) {
                    self.install_genres(media_type, result);
                }
            }
        }
    }

    fn is_stale(&self, activation: u64) -> bool {
        let stale = activation != self.activation;
        if stale {
            tracing::debug!(
                activation,
                current = self.activation,
                "Discarding result from previous activation"
            );
        }
        stale
    }

    fn install_editorial(&mut self, media_type: MediaType, outcome: CuratedOutcome) {
        let identity = catalog::editorial(media_type).identity();
        let items = outcome.items.clone();

        if let Some(&id) = self.by_identity.get(&identity) {
            let loader = match outcome.failure_class() {
                Some(class) => {
                    log_failure(&identity, class, outcome.failures.first());
                    let message = outcome
                        .failures
                        .first()
                        .map(ToString::to_string)
                        .unwrap_or_default();
                    FeedLoader::failed(id, identity, class, message)
                }
                None => {
                    tracing::debug!(
                        media = %media_type,
                        items = items.len(),
                        failed_batches = outcome.failures.len(),
                        "Editor picks loaded"
                    );
                    FeedLoader::preloaded(id, identity, outcome.items)
                }
            };
            if let Some(mounted) = self.mounted.get_mut(&id) {
                mounted.loader = loader;
            }
        }

        match media_type {
            MediaType::Movie => self.editorial.movies = Some(items),
            MediaType::Tv => self.editorial.shows = Some(items),
        }
        if let (Some(movies), Some(shows)) = (&self.editorial.movies, &self.editorial.shows) {
            let mut mixed: Vec<MediaSummary> = movies.iter().chain(shows).cloned().collect();
            mixed.shuffle(&mut self.rng);
            self.editorial.mixed = mixed;
        }
    }

    fn install_genres(&mut self, media_type: MediaType, result: Result<Vec<Genre>, FetchError>) {
        let genres = match result {
            Ok(genres) => genres,
            Err(e) => {
                let identity = FeedIdentity::new(FeedKind::Genre, media_type, "list");
                log_failure(&identity, classify(&e), Some(&e));
                return;
            }
        };

        let limit = self.options.genre_limit(media_type);
        for genre in genres.into_iter().take(limit) {
            let group = MediaGroup::genre(&genre, media_type);
            let supply = match self.preloaded.get(&(media_type, genre.id)) {
                Some(items) => Supply::Preloaded(items.clone()),
                None => Supply::Gated,
            };
            self.mount_row(&group, supply);
            self.genres.push(genre);
        }
        tracing::debug!(media = %media_type, genres = self.genres.len(), "Genre rows mounted");
        self.relayout();
    }

    fn mount_row(&mut self, group: &MediaGroup, supply: Supply) {
        let anchor = group.anchor();
        let loader = self.mount(group.identity(), supply, Some(&anchor));
        self.rows.push(Row {
            name: group.name.clone(),
            anchor,
            loader,
        });
    }

    fn mount_provider(&mut self, media_type: MediaType, provider_id: &str) -> bool {
        let Some(group) = catalog::provider(media_type, provider_id) else {
            tracing::debug!(provider = provider_id, media = %media_type, "Provider not offered for media type");
            if let Some(old) = self.provider.take() {
                self.unmount(old.loader);
            }
            return false;
        };
        let identity = group.identity();
        if self.provider.as_ref().is_some_and(|s| self.identity_of(s.loader) == Some(&identity)) {
            return false;
        }
        if let Some(old) = self.provider.take() {
            self.unmount(old.loader);
        }
        let loader = self.mount(identity, Supply::Immediate, None);
        self.provider = Some(Row {
            anchor: group.anchor(),
            name: group.name,
            loader,
        });
        true
    }

    /// Mounts a feed, or takes another reference on the already mounted
    /// feed with the same identity.
    fn mount(&mut self, identity: FeedIdentity, supply: Supply, anchor: Option<&str>) -> LoaderId {
        if let Some(&id) = self.by_identity.get(&identity) {
            if let Some(mounted) = self.mounted.get_mut(&id) {
                mounted.refs += 1;
                if matches!(supply, Supply::Immediate) && mounted.loader.start(&self.ctx, &self.tx) {
                    self.pending += 1;
                }
                tracing::debug!(feed = %identity, refs = mounted.refs, "Reusing mounted feed");
                return id;
            }
        }

        let id = LoaderId(self.next_loader);
        self.next_loader += 1;

        let window = self.ctx.page_window;
        let immediate = matches!(supply, Supply::Immediate);
        let mut loader = match supply {
            Supply::Gated => {
                let loader = FeedLoader::new(id, identity.clone(), window);
                match anchor {
                    Some(anchor) => loader.with_gate(VisibilityGate::new(
                        self.viewport.observe(anchor, self.options.margin_px),
                    )),
                    None => loader,
                }
            }
            Supply::Immediate | Supply::Pending => FeedLoader::new(id, identity.clone(), window),
            Supply::Preloaded(items) => FeedLoader::preloaded(id, identity.clone(), items),
        };
        if immediate && loader.start(&self.ctx, &self.tx) {
            self.pending += 1;
        }

        tracing::debug!(feed = %identity, loader = %id, "Mounted feed");
        self.by_identity.insert(identity, id);
        self.mounted.insert(id, Mounted { loader, refs: 1 });
        id
    }

    fn unmount(&mut self, id: LoaderId) {
        let remaining = match self.mounted.get_mut(&id) {
            Some(mounted) => {
                mounted.refs = mounted.refs.saturating_sub(1);
                mounted.refs
            }
            None => return,
        };
        if remaining > 0 {
            return;
        }
        if let Some(mounted) = self.mounted.remove(&id) {
            tracing::debug!(feed = %mounted.loader.identity(), loader = %id, "Unmounted feed");
            self.by_identity.remove(mounted.loader.identity());
        }
    }

    fn unmount_all(&mut self) {
        let rows = std::mem::take(&mut self.rows);
        for row in rows {
            self.unmount(row.loader);
        }
        for slot in [self.provider.take(), self.genre.take()].into_iter().flatten() {
            self.unmount(slot.loader);
        }
        self.genres.clear();
    }

    fn relayout(&mut self) {
        let total = self.viewport.stack(&self.anchors(), self.options.row_height);
        tracing::trace!(rows = self.rows.len(), height = total, "Laid out rows");
    }

    fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = SessionEvent> + Send + 'static,
    {
        self.pending += 1;
        let tx = self.tx.clone();
        tokio::spawn(async move {
            if tx.send(task.await).await.is_err() {
                tracing::debug!("Session gone, dropping result");
            }
        });
    }

    fn spawn_genres(&mut self, media_type: MediaType) {
        let source = Arc::clone(&self.ctx.source);
        let query = Query::new(&self.ctx.language);
        let activation = self.activation;
        self.spawn(async move {
            let path = format!("/genre/{media_type}/list");
            let result = source.fetch_genres(&path, &query).await;
            SessionEvent::Genres {
                activation,
                media_type,
                result,
            }
        });
    }

    fn spawn_curated(&mut self, media_type: MediaType, ids: Vec<u64>) {
        let source = Arc::clone(&self.ctx.source);
        let query = Query::new(&self.ctx.language);
        let batch_size = self.ctx.editorial_batch_size;
        let activation = self.activation;
        self.spawn(async move {
            let outcome = fetch_curated(source.as_ref(), media_type, &ids, batch_size, &query).await;
            SessionEvent::Curated {
                activation,
                media_type,
                outcome,
            }
        });
    }

    fn spawn_featured(&mut self, plan: FeaturedPlan) {
        let source = Arc::clone(&self.ctx.source);
        let language = self.ctx.language.clone();
        let activation = self.activation;
        tracing::debug!(editorial = plan.is_editorial(), "Fetching featured media");
        self.spawn(async move {
            let result = fetch_featured(source, plan, language).await;
            SessionEvent::Featured { activation, result }
        });
    }
}

fn log_failure(identity: &FeedIdentity, class: FailureClass, error: Option<&FetchError>) {
    let error = error.map(ToString::to_string).unwrap_or_default();
    match class {
        FailureClass::RateLimited => tracing::debug!(feed = %identity, error = %error, "Rate limited"),
        FailureClass::NetworkOrUpstream => {
            tracing::warn!(feed = %identity, error = %error, "Failed to load feed")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::Presentation;
    use crate::tmdb::fake::{item, Reply, ScriptedSource};
    use crate::tmdb::MetadataSource;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    fn genre(id: u64, name: &str) -> Genre {
        Genre {
            id,
            name: name.to_string(),
        }
    }

    fn movie_source() -> ScriptedSource {
        ScriptedSource::new()
            .list("/movie/now_playing", 4, 5)
            .list("/movie/top_rated", 4, 5)
            .list("/movie/popular", 4, 5)
            .list("/discover/movie", 3, 5)
            .genres("/genre/movie/list", vec![genre(28, "Action"), genre(35, "Comedy")])
    }

    fn tv_source(source: ScriptedSource) -> ScriptedSource {
        source
            .list("/tv/on_the_air", 2, 5)
            .list("/tv/top_rated", 2, 5)
            .list("/tv/popular", 2, 5)
            .list("/discover/tv", 2, 5)
            .genres("/genre/tv/list", vec![genre(16, "Animation")])
    }

    fn session(source: Arc<ScriptedSource>, options: SessionOptions) -> DiscoverySession {
        let ctx = FetchContext::new(source as Arc<dyn MetadataSource>, "en-US", "US");
        DiscoverySession::new(ctx, Viewport::new(600), SessionOptions { seed: Some(7), ..options })
    }

    fn status_of(session: &DiscoverySession, name: &str) -> Option<FeedStatus> {
        session
            .rows()
            .find(|r| r.name == name)
            .map(|r| r.feed.state().status())
    }

    #[tokio::test]
    async fn test_only_rows_in_range_fetch() {
        let source = Arc::new(movie_source());
        let mut session = session(source.clone(), SessionOptions::default());

        assert!(session.activate(Tab::Movies));
        session.settle().await;

        // rows at 0, 300, 600 are within 200px of a 600px viewport; genres at 900, 1200 are not
        assert_eq!(status_of(&session, "Now Playing"), Some(FeedStatus::Ready));
        assert_eq!(status_of(&session, "Most Popular"), Some(FeedStatus::Ready));
        assert_eq!(status_of(&session, "Action"), Some(FeedStatus::Idle));
        assert_eq!(source.count("/discover/movie"), 0);
        assert_eq!(source.count("/tv/"), 0);
        assert_eq!(source.pages_requested("/movie/now_playing"), [1, 2]);

        session.viewport().scroll_by(600);
        session.settle().await;
        assert_eq!(status_of(&session, "Comedy"), Some(FeedStatus::Ready));
        assert_eq!(source.count("/discover/movie"), 4);
        let genres: HashSet<String> = source
            .calls()
            .iter()
            .filter(|(path, _)| path == "/discover/movie")
            .filter_map(|(_, q)| q.get("with_genres").map(str::to_string))
            .collect();
        assert_eq!(genres, HashSet::from(["28".to_string(), "35".to_string()]));
    }

    #[tokio::test]
    async fn test_reactivating_same_tab_is_noop() {
        let source = Arc::new(movie_source());
        let mut session = session(source.clone(), SessionOptions::default());
        session.activate(Tab::Movies);
        session.settle().await;
        let calls = source.calls().len();

        assert!(!session.activate(Tab::Movies));
        session.settle().await;
        assert_eq!(session.activation(), 1);
        assert_eq!(source.calls().len(), calls);
    }

    #[tokio::test]
    async fn test_tab_switch_discards_previous_tab() {
        let source = Arc::new(tv_source(movie_source()));
        let mut session = session(source.clone(), SessionOptions::default());

        session.activate(Tab::Movies);
        assert_eq!(session.poll_visibility(), 3);
        session.activate(Tab::TvShows);
        session.settle().await;

        // the movie batches ran but had nowhere to land
        assert_eq!(source.pages_requested("/movie/now_playing"), [1, 2]);

        let names: Vec<&str> = session.rows().map(|r| r.name).collect();
        assert_eq!(names, ["On The Air", "Top Rated", "Most Popular", "Animation"]);
        assert!(session.rows().all(|r| r.feed.identity().media_type() == MediaType::Tv));
        assert_eq!(session.genres().len(), 1);
        assert_eq!(session.in_flight(), 0);
        assert_eq!(status_of(&session, "On The Air"), Some(FeedStatus::Ready));
        assert!(session
            .featured()
            .items()
            .iter()
            .all(|m| m.media_type == MediaType::Tv));
    }

    #[tokio::test]
    async fn test_provider_swap_discards_previous_feed() {
        let source = Arc::new(movie_source());
        let mut session = session(source.clone(), SessionOptions::default());
        session.activate(Tab::Movies);

        assert!(session.select_provider("8"));
        assert!(!session.select_provider("8"));
        session.settle().await;
        let netflix = session.provider_spotlight().unwrap();
        assert_eq!(netflix.name, "Netflix");
        assert_eq!(netflix.feed.state().status(), FeedStatus::Ready);
        let netflix_identity = netflix.feed.identity().clone();

        assert!(session.select_provider("337"));
        assert!(session.feed(&netflix_identity).is_none());
        let spotlight = session.provider_spotlight().unwrap();
        assert_eq!(spotlight.name, "Disney Plus");
        assert!(spotlight.feed.state().items().is_empty());

        session.settle().await;
        let providers: Vec<String> = source
            .calls()
            .iter()
            .filter_map(|(_, q)| q.get("with_watch_providers").map(str::to_string))
            .collect();
        assert_eq!(providers.iter().filter(|p| *p == "8").count(), 2);
        assert_eq!(providers.iter().filter(|p| *p == "337").count(), 2);
        assert!(source
            .calls()
            .iter()
            .filter(|(_, q)| q.get("with_watch_providers").is_some())
            .all(|(_, q)| q.get("watch_region") == Some("US")));
    }

    #[tokio::test]
    async fn test_provider_choice_follows_tab() {
        let source = Arc::new(tv_source(movie_source()));
        let mut session = session(source.clone(), SessionOptions::default());
        session.activate(Tab::Movies);
        session.select_provider("15");
        session.activate(Tab::TvShows);
        session.settle().await;

        let spotlight = session.provider_spotlight().unwrap();
        assert_eq!(spotlight.feed.identity().media_type(), MediaType::Tv);
        assert_eq!(spotlight.feed.identity().endpoint().as_deref(), Some("/discover/tv"));

        session.activate(Tab::EditorPicks);
        assert!(session.provider_spotlight().is_none());
    }

    #[tokio::test]
    async fn test_genre_spotlight_shares_row_feed() {
        let source = Arc::new(movie_source());
        let mut session = session(source.clone(), SessionOptions::default());
        session.activate(Tab::Movies);
        session.settle().await;
        let mounted = session.mounted_feeds();

        assert!(session.select_genre(&genre(35, "Comedy")));
        assert_eq!(session.mounted_feeds(), mounted);
        session.settle().await;
        assert_eq!(status_of(&session, "Comedy"), Some(FeedStatus::Ready));
        assert_eq!(source.count("/discover/movie"), 2);

        session.clear_genre();
        assert!(session.genre_spotlight().is_none());
        assert_eq!(status_of(&session, "Comedy"), Some(FeedStatus::Ready));
    }

    #[tokio::test]
    async fn test_editorial_mix_has_every_pick_once() {
        let movies = [1, 2, 3];
        let shows = [10, 11];
        let source = movies
            .iter()
            .fold(ScriptedSource::new(), |s, &id| s.item(&format!("/movie/{id}"), item(id, "m")));
        let source = Arc::new(
            shows
                .iter()
                .fold(source, |s, &id| s.item(&format!("/tv/{id}"), item(id, "s"))),
        );
        let ctx = FetchContext::new(source.clone() as Arc<dyn MetadataSource>, "en-US", "US")
            .with_editor_picks(movies.to_vec(), shows.to_vec());
        let options = SessionOptions {
            seed: Some(7),
            ..SessionOptions::default()
        };
        let mut session = DiscoverySession::new(ctx, Viewport::new(600), options);

        session.activate(Tab::EditorPicks);
        assert!(session.editorial_mix().is_empty());
        session.settle().await;

        let ids: HashSet<u64> = session.editorial_mix().iter().map(|m| m.id).collect();
        assert_eq!(session.editorial_mix().len(), 5);
        assert_eq!(ids, HashSet::from([1, 2, 3, 10, 11]));

        let rows: Vec<(&str, FeedStatus, usize)> = session
            .rows()
            .map(|r| (r.anchor, r.feed.state().status(), r.feed.state().items().len()))
            .collect();
        assert_eq!(
            rows,
            [
                ("carousel-editor-picks-movie", FeedStatus::Ready, 3),
                ("carousel-editor-picks-tv", FeedStatus::Ready, 2),
            ]
        );
        assert_eq!(session.featured().items().len(), 5);
        assert!(source.calls().iter().all(|(_, q)| q.page().is_none()));

        let before: Vec<u64> = session.editorial_mix().iter().map(|m| m.id).collect();
        session.pump();
        let after: Vec<u64> = session.editorial_mix().iter().map(|m| m.id).collect();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_rate_limited_row_does_not_affect_siblings() {
        let source = Arc::new(
            movie_source()
                .fail("/movie/top_rated", 1, Reply::Status(429))
                .fail("/movie/now_playing", 2, Reply::Status(500)),
        );
        let mut session = session(source, SessionOptions::default());
        session.activate(Tab::Movies);
        session.settle().await;

        let top_rated = session.rows().find(|r| r.name == "Top Rated").unwrap();
        assert_eq!(top_rated.feed.presentation(), Presentation::Hidden);
        let now_playing = session.rows().find(|r| r.name == "Now Playing").unwrap();
        assert_eq!(now_playing.feed.state().status(), FeedStatus::Error);
        assert!(matches!(now_playing.feed.presentation(), Presentation::Items(items) if items.len() == 5));
        assert_eq!(status_of(&session, "Most Popular"), Some(FeedStatus::Ready));
    }

    #[tokio::test]
    async fn test_preloaded_genre_never_fetches() {
        let source = Arc::new(movie_source());
        let mut session = session(source.clone(), SessionOptions::default());
        let items: Vec<MediaSummary> = (1..=4)
            .map(|id| MediaSummary::from_raw(&item(id, "a"), MediaType::Movie))
            .collect();
        session.preload_genre(MediaType::Movie, 28, items);

        session.activate(Tab::Movies);
        session.settle().await;
        session.viewport().scroll_to(800);
        session.settle().await;

        assert!(source
            .calls()
            .iter()
            .all(|(_, q)| q.get("with_genres") != Some("28")));
        assert_eq!(source.count("/discover/movie"), 2);
        let action = session.rows().find(|r| r.name == "Action").unwrap();
        assert!(action.feed.is_preloaded());
        assert_eq!(action.feed.state().items().len(), 4);
    }

    #[tokio::test]
    async fn test_scroll_to_category() {
        let source = Arc::new(movie_source());
        let mut session = session(source, SessionOptions::default());
        assert!(!session.scroll_to_category("Top Rated"));

        session.activate(Tab::Movies);
        assert!(!session.scroll_to_category("Action"));
        assert_eq!(session.viewport().scroll_top(), 0);

        session.settle().await;
        assert!(session.scroll_to_category("Comedy"));
        assert_eq!(session.viewport().scroll_top(), 1050);
        assert!(!session.scroll_to_category("Westerns"));
        assert_eq!(session.viewport().scroll_top(), 1050);
    }

    #[tokio::test]
    async fn test_load_more_twice_issues_one_batch() {
        let source = Arc::new(movie_source());
        let mut session = session(source.clone(), SessionOptions::default());
        session.activate(Tab::Movies);
        session.settle().await;

        let identity = catalog::categories(MediaType::Movie)[0].identity();
        assert!(session.load_more(&identity));
        assert!(!session.load_more(&identity));
        session.settle().await;
        assert_eq!(source.pages_requested("/movie/now_playing"), [1, 2, 3, 4]);
        let feed = session.feed(&identity).unwrap();
        assert_eq!(feed.state().items().len(), 20);
        assert!(!feed.state().has_more());
        assert!(!session.load_more(&identity));
    }

    #[tokio::test]
    async fn test_random_pick_uses_ready_movies() {
        let source = Arc::new(movie_source());
        let mut session = session(source, SessionOptions::default());
        assert!(session.random_pick().is_none());

        session.activate(Tab::Movies);
        session.settle().await;
        let pick = session.random_pick().unwrap();
        assert_eq!(pick.media_type, MediaType::Movie);
    }
}
