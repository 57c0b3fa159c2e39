use crate::core::pagination::{FetchOutcome, InfiniteQuery, PageSource, PageStatus};

/// Fraction of the sentinel that must be on screen to count as visible.
pub const DEFAULT_THRESHOLD: f32 = 0.1;

/// One observation of the sentinel element at the end of a list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intersection {
    pub ratio: f32,
}

impl Intersection {
    pub fn visible() -> Self {
        Intersection { ratio: 1.0 }
    }

    pub fn hidden() -> Self {
        Intersection { ratio: 0.0 }
    }
}

/// Requests the next page when the sentinel scrolls into view.
///
/// Not throttled: the rate of the visibility signal itself is the only debounce.
#[derive(Debug, Clone)]
pub struct VisibilityTrigger {
    threshold: f32,
    visible: bool,
    stopped: bool,
}

impl Default for VisibilityTrigger {
    fn default() -> Self {
        VisibilityTrigger::with_threshold(DEFAULT_THRESHOLD)
    }
}

impl VisibilityTrigger {
    pub fn new() -> Self {
        VisibilityTrigger::default()
    }

    pub fn with_threshold(threshold: f32) -> Self {
        VisibilityTrigger {
            threshold,
            visible: false,
            stopped: false,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Detach from the signal; later observations are ignored.
    pub fn stop(&mut self) {
        self.stopped = true;
        self.visible = false;
    }

    /// Record an observation and return whether the sentinel is now visible.
    pub fn observe(&mut self, signal: Intersection) -> bool {
        if self.stopped {
            return false;
        }
        self.visible = signal.ratio >= self.threshold;
        self.visible
    }

    /// Visible, more pages exist, and nothing is in flight.
    pub fn should_fetch(&self, status: &PageStatus) -> bool {
        !self.stopped && self.visible && status.has_more && !status.is_in_flight()
    }

    /// Observe `signal` and fetch the next page of `query` if warranted.
    pub async fn on_signal<S: PageSource>(
        &mut self,
        signal: Intersection,
        query: &InfiniteQuery<S>,
    ) -> Option<FetchOutcome> {
        self.observe(signal);
        if !self.should_fetch(&query.status()) {
            return None;
        }
        Some(query.fetch_next_page().await)
    }
}
