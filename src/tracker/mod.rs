//! Position tracking
//!
//! A [`PositionTracker`] follows one open book. It turns viewport events into
//! [`ReadingPosition`]s, debounces scroll bursts, saves snapshots through a
//! [`PositionStore`] and restores saved Locations through the [`Renderer`].
//!
//! ```text
//!            start                    on_scroll               debounce due
//!   Idle ───────────► Observing ─────────────► Debouncing ─────────────► Committed
//!    ▲                    │                        ▲   │                     │
//!    │       stop         │                        └───┘ on_scroll           │
//!    └────────────────────┴──────────────────────────────────────────────────┘
//! ```
//!
//! The debounce and autosave timers run as Tokio tasks and report back over a
//! channel. The host either awaits [`PositionTracker::next_timer`] or calls
//! [`PositionTracker::poll`] from its event loop; tracker state is only
//! touched from those calls.

mod observers;
mod renderer;
mod strategy;
mod timer;
mod types;

use std::marker::PhantomData;

use chrono::Utc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::config::{Config, ReadingMode, TrackerConfig};
use crate::location::{
    parse, resolve, Generator, GeneratorOptions, Location, LocationParseError, RangeLocation,
    Validator,
};
use crate::store::PositionStore;
use crate::tree::{DocumentTree, NodeKind};

use timer::TimerEvent;

pub use observers::{Observers, Subscription};
pub use renderer::{book_progress, Align, NodeOf, PageInfo, Renderer, Viewport};
pub use strategy::{FirstVisible, LocateStrategy, MostVisible};
pub use timer::{Debouncer, Ticker};
pub use types::{
    ChangeType, PositionChangeEvent, PositionDelta, ReadingPosition, ReadingSession,
};

/// Sub-state while tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for viewport events
    Observing,
    /// A scroll burst is in progress
    Debouncing,
    /// The last burst has been evaluated
    Committed,
}

/// Tracker lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    Idle,
    Tracking(Phase),
}

/// What a call to [`PositionTracker::poll`] did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollOutcome {
    pub debounce_fired: bool,
    pub autosave_fired: bool,
    pub saved: bool,
}

/// Derives, debounces, saves and restores the reading position of one book
pub struct PositionTracker<R: Renderer, S: PositionStore> {
    book_id: String,
    config: TrackerConfig,
    generator_options: GeneratorOptions,
    validator: Validator,
    strategy: Box<dyn LocateStrategy<R::Tree>>,
    store: S,
    observers: Observers,
    state: TrackerState,
    debounce: Debouncer,
    autosave: Ticker,
    timer_tx: UnboundedSender<TimerEvent>,
    timer_rx: UnboundedReceiver<TimerEvent>,
    current: Option<ReadingPosition>,
    last_saved: Option<ReadingPosition>,
    session: Option<ReadingSession>,
    last_selection: Option<RangeLocation>,
    /// Bumped on every scroll event
    generation: u64,
    /// Generation at the time of the last save
    saved_generation: Option<u64>,
    /// Bumped on every start; autosave ticks from earlier runs are ignored
    run: u64,
    _renderer: PhantomData<fn(&R)>,
}

impl<R: Renderer, S: PositionStore> PositionTracker<R, S> {
    pub fn new(book_id: impl Into<String>, config: &Config, store: S) -> Self {
        let tracker = config.tracker.clone();
        let strategy: Box<dyn LocateStrategy<R::Tree>> = match tracker.reading_mode {
            ReadingMode::Scrolled => Box::new(MostVisible::default()),
            ReadingMode::Paginated => Box::new(FirstVisible),
        };
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();

        Self {
            book_id: book_id.into(),
            validator: Validator::new(tracker.drift_policy),
            debounce: Debouncer::new(tracker.debounce()),
            autosave: Ticker::new(tracker.save_interval()),
            timer_tx,
            timer_rx,
            generator_options: config.generator.clone(),
            config: tracker,
            strategy,
            store,
            observers: Observers::new(),
            state: TrackerState::Idle,
            current: None,
            last_saved: None,
            session: None,
            last_selection: None,
            generation: 0,
            saved_generation: None,
            run: 0,
            _renderer: PhantomData,
        }
    }

    /// Replace the current-position strategy
    pub fn with_strategy(mut self, strategy: Box<dyn LocateStrategy<R::Tree>>) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn book_id(&self) -> &str {
        &self.book_id
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn is_tracking(&self) -> bool {
        matches!(self.state, TrackerState::Tracking(_))
    }

    /// Latest derived position
    pub fn current(&self) -> Option<&ReadingPosition> {
        self.current.as_ref()
    }

    /// Last persisted position
    pub fn last_saved(&self) -> Option<&ReadingPosition> {
        self.last_saved.as_ref()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Subscribe to position changes
    pub fn on_position_change<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&PositionChangeEvent) + 'static,
    {
        self.observers.subscribe(callback)
    }

    /// Unsubscribe a callback registered with [`Self::on_position_change`]
    pub fn off_position_change(&self, subscription: Subscription) -> bool {
        subscription.dispose()
    }

    /// Start tracking
    ///
    /// Captures the initial position as the last saved one, arms autosave and
    /// opens a reading session.
    pub fn start(&mut self, renderer: &R) {
        if self.is_tracking() {
            return;
        }

        let position = self.compute_position(renderer);

        if let Some(position) = &position {
            self.session = Some(ReadingSession::start(&self.book_id, position, Utc::now()));
        }
        self.current = position.clone();
        self.last_saved = position;
        self.saved_generation = Some(self.generation);

        self.run += 1;
        self.drain_timers();
        if self.config.auto_save {
            self.autosave.start(&self.timer_tx, TimerEvent::Autosave { run: self.run });
        }
        self.state = TrackerState::Tracking(Phase::Observing);

        tracing::info!(
            book_id = %self.book_id,
            strategy = self.strategy.name(),
            location = ?self.current.as_ref().map(|p| p.location.to_string()),
            "Position tracking started"
        );
    }

    /// Stop tracking
    ///
    /// Aborts the timer tasks, records the reading session and clears the
    /// current and last saved positions.
    pub fn stop(&mut self) {
        if !self.is_tracking() {
            return;
        }

        self.debounce.cancel();
        self.autosave.cancel();
        self.drain_timers();

        if let Some(mut session) = self.session.take() {
            let end = self.current.as_ref().or(self.last_saved.as_ref());
            session.finish(end, Utc::now());
            if let Err(e) = self.store.record_session(&session) {
                tracing::warn!(book_id = %self.book_id, error = %e, "Failed to record reading session");
            }
        }

        self.current = None;
        self.last_saved = None;
        self.last_selection = None;
        self.saved_generation = None;
        self.state = TrackerState::Idle;

        tracing::info!(book_id = %self.book_id, "Position tracking stopped");
    }

    /// Stop tracking and drop every subscriber
    pub fn destroy(mut self) -> S {
        self.stop();
        self.observers.clear();
        self.store
    }

    /// Record a scroll event
    ///
    /// Restarts the debounce window; nothing is computed until it elapses.
    pub fn on_scroll(&mut self) {
        if !self.is_tracking() {
            return;
        }

        self.generation += 1;
        self.debounce.trigger(
            &self.timer_tx,
            TimerEvent::Debounce {
                generation: self.generation,
            },
        );
        self.state = TrackerState::Tracking(Phase::Debouncing);

        tracing::trace!(generation = self.generation, "Scroll debounce armed");
    }

    /// A debounce or autosave timer is armed
    pub fn has_pending_timers(&self) -> bool {
        self.debounce.is_pending() || self.autosave.is_running()
    }

    /// Handle every timer that has fired, without waiting
    pub fn poll(&mut self, renderer: &R) -> PollOutcome {
        let mut due = Due::default();
        while let Ok(event) = self.timer_rx.try_recv() {
            self.accept(event, &mut due);
        }
        self.fire(renderer, due)
    }

    /// Wait for the next timer to fire and handle it
    ///
    /// Returns at once when no timer is armed. Cancel safe: dropping the
    /// future before it completes loses no timer message.
    pub async fn next_timer(&mut self, renderer: &R) -> PollOutcome {
        let mut due = Due::default();
        while !due.any() {
            if !self.is_tracking() || !self.has_pending_timers() {
                return PollOutcome::default();
            }
            match self.timer_rx.recv().await {
                Some(event) => self.accept(event, &mut due),
                None => return PollOutcome::default(),
            }
        }
        while let Ok(event) = self.timer_rx.try_recv() {
            self.accept(event, &mut due);
        }
        self.fire(renderer, due)
    }

    /// Save the current position now
    ///
    /// Returns false when nothing could be located, or when this scroll
    /// generation was already saved at the same place.
    pub fn save_position(&mut self, renderer: &R) -> bool {
        let Some(position) = self.compute_position(renderer) else {
            return false;
        };

        let already_saved = self.saved_generation == Some(self.generation)
            && self
                .last_saved
                .as_ref()
                .map(|saved| saved.same_place(&position))
                .unwrap_or(false);
        if already_saved {
            tracing::debug!(book_id = %self.book_id, "Position already saved");
            self.current = Some(position);
            return false;
        }

        self.persist(position, ChangeType::Scroll)
    }

    /// The renderer switched chapters
    pub fn on_chapter_change(&mut self, renderer: &R) -> bool {
        self.commit_now(renderer, ChangeType::Chapter)
    }

    /// The renderer turned a page
    pub fn on_page_change(&mut self, renderer: &R) -> bool {
        self.commit_now(renderer, ChangeType::Page)
    }

    /// The platform selection changed
    ///
    /// Emits a selection event when selection tracking is on and the
    /// selection is new and non-empty. Selections are not persisted.
    pub fn on_selection_change(&mut self, renderer: &R) -> bool {
        if !self.config.track_selection || !self.is_tracking() {
            return false;
        }

        let range = match renderer.selection() {
            Some(range) if !range.is_collapsed() => range,
            _ => {
                self.last_selection = None;
                return false;
            }
        };

        let tree = renderer.tree();
        let generator = Generator::with_options(tree, self.generator_options.clone());
        let selection = match generator.from_range(&range, tree.chapter_id()) {
            Ok(selection) => selection,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring selection");
                return false;
            }
        };

        if self.last_selection.as_ref() == Some(&selection) {
            return false;
        }

        let Some(mut position) = self.compute_position(renderer) else {
            return false;
        };
        position.location = selection.start.clone();

        tracing::debug!(
            start = %selection.start,
            end = %selection.end,
            chars = selection.char_count,
            "Selection changed"
        );

        let event = PositionChangeEvent::new(position, self.current.clone(), ChangeType::Selection)
            .with_selection(selection.clone());
        self.last_selection = Some(selection);
        self.observers.emit(&event);
        true
    }

    /// Scroll the renderer to `location`
    ///
    /// Returns false, without scrolling, if the Location does not validate
    /// against the renderer's current tree.
    pub fn restore_location(&mut self, renderer: &mut R, location: &Location, align: Align) -> bool {
        let target = {
            let tree = renderer.tree();
            if !self.validator.validate(location, tree) {
                tracing::warn!(
                    book_id = %self.book_id,
                    location = %location,
                    chapter = %tree.chapter_id(),
                    "Cannot restore stale or foreign location"
                );
                return false;
            }

            let Some(resolved) = resolve(location, tree) else {
                return false;
            };
            match resolved.kind {
                // Scroll to the element that holds the text
                NodeKind::Text => tree.parent(resolved.node).unwrap_or(resolved.node),
                NodeKind::Element => resolved.node,
            }
        };

        renderer.scroll_to(target, align);
        tracing::info!(book_id = %self.book_id, location = %location, align = ?align, "Restored position");
        true
    }

    /// Parse and restore a Location string
    ///
    /// Malformed strings are errors; stale ones return `Ok(false)`.
    pub fn restore_str(
        &mut self,
        renderer: &mut R,
        raw: &str,
        align: Align,
    ) -> Result<bool, LocationParseError> {
        let location = parse(raw)?;
        Ok(self.restore_location(renderer, &location, align))
    }

    /// Restore the book's saved snapshot from the store
    pub fn restore_saved(&mut self, renderer: &mut R) -> bool {
        let saved = match self.store.get(&self.book_id) {
            Ok(Some(saved)) => saved,
            Ok(None) => return false,
            Err(e) => {
                tracing::warn!(book_id = %self.book_id, error = %e, "Failed to load saved position");
                return false;
            }
        };

        if saved.chapter_id != renderer.tree().chapter_id() {
            tracing::debug!(
                saved_chapter = %saved.chapter_id,
                "Saved position is in another chapter"
            );
            return false;
        }

        self.restore_location(renderer, &saved.location, Align::Start)
    }

    /// Evaluate the end of a scroll burst
    fn commit_scroll(&mut self, renderer: &R) -> bool {
        self.state = TrackerState::Tracking(Phase::Committed);

        let Some(position) = self.compute_position(renderer) else {
            return false;
        };

        if !self.exceeds_threshold(&position) {
            tracing::trace!(offset = ?position.viewport_offset, "Below save threshold");
            self.current = Some(position);
            return false;
        }

        self.persist(position, ChangeType::Scroll)
    }

    fn autosave_tick(&mut self, renderer: &R) -> bool {
        let Some(position) = self.compute_position(renderer) else {
            return false;
        };

        let unchanged = self
            .last_saved
            .as_ref()
            .map(|saved| saved.same_place(&position))
            .unwrap_or(false);
        if unchanged {
            self.current = Some(position);
            return false;
        }

        tracing::debug!(book_id = %self.book_id, "Autosave");
        self.persist(position, ChangeType::Scroll)
    }

    fn commit_now(&mut self, renderer: &R, change_type: ChangeType) -> bool {
        if !self.is_tracking() {
            return false;
        }

        self.debounce.cancel();
        self.state = TrackerState::Tracking(Phase::Committed);

        match self.compute_position(renderer) {
            Some(position) => self.persist(position, change_type),
            None => false,
        }
    }

    fn exceeds_threshold(&self, position: &ReadingPosition) -> bool {
        let Some(saved) = &self.last_saved else {
            return true;
        };

        if saved.chapter_id != position.chapter_id || saved.page_number != position.page_number {
            return true;
        }

        let moved = (position.viewport_offset.unwrap_or(0.0) - saved.viewport_offset.unwrap_or(0.0)).abs();
        moved > self.config.position_threshold
    }

    /// Snapshot, persist and announce `position`
    ///
    /// A failed write leaves the last saved position untouched, so the next
    /// autosave tick sees the move and writes again.
    fn persist(&mut self, position: ReadingPosition, change_type: ChangeType) -> bool {
        if let Err(e) = self.store.upsert(&self.book_id, &position) {
            tracing::warn!(
                book_id = %self.book_id,
                location = %position.location,
                error = %e,
                "Failed to persist position"
            );
            self.current = Some(position);
            return false;
        }

        tracing::info!(
            book_id = %self.book_id,
            location = %position.location,
            change = ?change_type,
            book_progress = position.book_progress,
            "Position saved"
        );

        let previous = self.last_saved.replace(position.clone());
        self.current = Some(position.clone());
        self.saved_generation = Some(self.generation);

        let event = PositionChangeEvent::new(position, previous, change_type);
        self.observers.emit(&event);
        true
    }

    /// Note a timer message if it belongs to the live timers
    fn accept(&self, event: TimerEvent, due: &mut Due) {
        match event {
            TimerEvent::Debounce { generation } => {
                if generation == self.generation && self.debounce.is_pending() {
                    due.debounce = true;
                }
            }
            TimerEvent::Autosave { run } => {
                if run == self.run && self.autosave.is_running() {
                    due.autosave = true;
                }
            }
        }
    }

    fn fire(&mut self, renderer: &R, due: Due) -> PollOutcome {
        let mut outcome = PollOutcome::default();
        if !self.is_tracking() {
            return outcome;
        }

        if due.debounce {
            self.debounce.cancel();
            outcome.debounce_fired = true;
            outcome.saved |= self.commit_scroll(renderer);
        }
        if due.autosave {
            outcome.autosave_fired = true;
            outcome.saved |= self.autosave_tick(renderer);
        }
        outcome
    }

    /// Discard timer messages already posted
    fn drain_timers(&mut self) {
        while self.timer_rx.try_recv().is_ok() {}
    }

    /// Derive the reading position from the renderer
    fn compute_position(&self, renderer: &R) -> Option<ReadingPosition> {
        let tree = renderer.tree();
        let chapter_id = tree.chapter_id();
        let viewport = renderer.viewport();
        let geometry = |node: NodeOf<R>| renderer.bounding_rect(node);
        let generator = Generator::with_options(tree, self.generator_options.clone());

        let located = self
            .strategy
            .locate(tree, &viewport, &geometry)
            .and_then(|node| generator.from_node(node, chapter_id).ok());

        let location = match located {
            Some(location) => location,
            None => match generator.from_scroll_offset(viewport.scroll_top, chapter_id, &geometry) {
                Ok(location) => location,
                Err(e) => {
                    tracing::debug!(error = %e, "No position in viewport");
                    return None;
                }
            },
        };

        let chapter_progress = viewport.chapter_progress();
        Some(ReadingPosition {
            location,
            chapter_id: chapter_id.to_string(),
            chapter_progress,
            book_progress: book_progress(
                renderer.chapter_index(),
                renderer.chapter_count(),
                chapter_progress,
            ),
            timestamp: Utc::now(),
            viewport_offset: Some(viewport.scroll_top),
            page_number: viewport.page.map(|p| p.number),
            total_pages: viewport.page.map(|p| p.total),
        })
    }
}

/// Timers that fired since the last poll
#[derive(Debug, Clone, Copy, Default)]
struct Due {
    debounce: bool,
    autosave: bool,
}

impl Due {
    fn any(&self) -> bool {
        self.debounce || self.autosave
    }
}
