//! Viewport proximity tracking for lazy feeds.
//!
//! The [`Viewport`] knows where each carousel anchor sits and where the
//! user has scrolled. Each [`Observation`] is a subscription to one
//! anchor's "within N px of the viewport" flag, delivered through a
//! `watch` channel so consumers can either poll the current value or await
//! the next change. Dropping the observation deregisters it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::watch;

/// Load when within this many pixels of the viewport.
pub const DEFAULT_MARGIN_PX: i64 = 200;

#[derive(Debug, Clone, Copy)]
struct Region {
    top: i64,
    height: i64,
}

struct Observer {
    anchor: String,
    margin: i64,
    tx: watch::Sender<bool>,
}

#[derive(Default)]
struct Inner {
    scroll_top: i64,
    height: i64,
    regions: HashMap<String, Region>,
    observers: HashMap<u64, Observer>,
    next_id: u64,
}

impl Inner {
    fn intersects(&self, anchor: &str, margin: i64) -> bool {
        let Some(region) = self.regions.get(anchor) else {
            return false;
        };
        let view_top = self.scroll_top - margin;
        let view_bottom = self.scroll_top + self.height + margin;
        region.top < view_bottom && region.top + region.height.max(1) > view_top
    }

    /// Pushes the current flag to every observer whose value changed.
    fn publish(&self) {
        for observer in self.observers.values() {
            let now = self.intersects(&observer.anchor, observer.margin);
            observer.tx.send_if_modified(|visible| {
                if *visible == now {
                    return false;
                }
                *visible = now;
                true
            });
        }
    }
}

/// Shared scroll/layout model.
///
/// Cloning yields another handle to the same viewport.
#[derive(Clone)]
pub struct Viewport {
    inner: Arc<Mutex<Inner>>,
}

impl std::fmt::Debug for Viewport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("Viewport")
            .field("scroll_top", &inner.scroll_top)
            .field("height", &inner.height)
            .field("anchors", &inner.regions.len())
            .field("observers", &inner.observers.len())
            .finish()
    }
}

impl Viewport {
    pub fn new(height: i64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                height: height.max(0),
                ..Inner::default()
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Positions (or moves) an anchor's region.
    pub fn place(&self, anchor: &str, top: i64, height: i64) {
        let mut inner = self.lock();
        inner.regions.insert(anchor.to_string(), Region { top, height });
        inner.publish();
    }

    pub fn remove(&self, anchor: &str) {
        let mut inner = self.lock();
        inner.regions.remove(anchor);
        inner.publish();
    }

    /// Replaces the layout with `anchors` stacked top to bottom, each
    /// `row_height` tall. Returns the total content height.
    pub fn stack(&self, anchors: &[String], row_height: i64) -> i64 {
        let mut inner = self.lock();
        inner.regions.clear();
        let mut top = 0;
        for anchor in anchors {
            inner.regions.insert(
                anchor.clone(),
                Region {
                    top,
                    height: row_height,
                },
            );
            top += row_height;
        }
        inner.publish();
        top
    }

    pub fn scroll_to(&self, top: i64) {
        let mut inner = self.lock();
        inner.scroll_top = top.max(0);
        inner.publish();
    }

    pub fn scroll_by(&self, delta: i64) {
        let top = self.scroll_top().saturating_add(delta);
        self.scroll_to(top);
    }

    pub fn resize(&self, height: i64) {
        let mut inner = self.lock();
        inner.height = height.max(0);
        inner.publish();
    }

    pub fn scroll_top(&self) -> i64 {
        self.lock().scroll_top
    }

    pub fn height(&self) -> i64 {
        self.lock().height
    }

    pub fn has_anchor(&self, anchor: &str) -> bool {
        self.lock().regions.contains_key(anchor)
    }

    /// Scrolls so the anchor is vertically centred. Returns `false` (and
    /// leaves the scroll position alone) when no such anchor is laid out.
    pub fn scroll_into_view(&self, anchor: &str) -> bool {
        let mut inner = self.lock();
        let Some(region) = inner.regions.get(anchor).copied() else {
            return false;
        };
        let centre = region.top + region.height / 2;
        inner.scroll_top = (centre - inner.height / 2).max(0);
        inner.publish();
        true
    }

    /// Starts observing `anchor`. An anchor that is not laid out yet
    /// reports `false` until it is placed.
    pub fn observe(&self, anchor: &str, margin: i64) -> Observation {
        let mut inner = self.lock();
        let (tx, rx) = watch::channel(inner.intersects(anchor, margin));
        let id = inner.next_id;
        inner.next_id += 1;
        inner.observers.insert(
            id,
            Observer {
                anchor: anchor.to_string(),
                margin,
                tx,
            },
        );
        Observation {
            id,
            viewport: Arc::downgrade(&self.inner),
            rx,
        }
    }

    /// Number of live observations.
    pub fn observer_count(&self) -> usize {
        self.lock().observers.len()
    }
}

/// One registered observation. Deregisters on drop.
pub struct Observation {
    id: u64,
    viewport: Weak<Mutex<Inner>>,
    rx: watch::Receiver<bool>,
}

impl std::fmt::Debug for Observation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observation")
            .field("id", &self.id)
            .field("visible", &*self.rx.borrow())
            .finish()
    }
}

impl Observation {
    pub fn is_visible(&self) -> bool {
        *self.rx.borrow()
    }

    /// Waits for the flag to change and returns the new value. Returns
    /// `None` once the viewport is gone.
    pub async fn changed(&mut self) -> Option<bool> {
        self.rx.changed().await.ok()?;
        Some(*self.rx.borrow_and_update())
    }
}

impl Drop for Observation {
    fn drop(&mut self) {
        if let Some(inner) = self.viewport.upgrade() {
            inner
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .observers
                .remove(&self.id);
        }
    }
}

/// Latches the first `true` of an observation.
///
/// The observation keeps toggling as the user scrolls; the gate only cares
/// about the first time it opened and never closes again.
#[derive(Debug)]
pub struct VisibilityGate {
    observation: Observation,
    opened: bool,
}

impl VisibilityGate {
    pub fn new(observation: Observation) -> Self {
        Self {
            observation,
            opened: false,
        }
    }

    /// Returns `true` exactly once: on the first poll that sees the anchor
    /// in range.
    pub fn poll_opened(&mut self) -> bool {
        if self.opened || !self.observation.is_visible() {
            return false;
        }
        self.opened = true;
        true
    }

    pub fn is_open(&self) -> bool {
        self.opened
    }

    /// Current (unlatched) proximity flag.
    pub fn is_visible(&self) -> bool {
        self.observation.is_visible()
    }
}
