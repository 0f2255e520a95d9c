//! Document visibility signal
//!
//! The host (a window, a tab, a terminal focus handler) owns a
//! [`VisibilitySource`] and reports transitions; pollers hold receivers.
//! Every hidden → visible transition bumps a counter, so a receiver that
//! only wakes after a quick hide-then-show still sees that it happened.

use std::sync::Arc;

use tokio::sync::watch;

/// Whether the hosting surface is currently shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Visible,
    Hidden,
}

impl Visibility {
    pub fn is_visible(self) -> bool {
        self == Visibility::Visible
    }
}

/// Value carried by the visibility channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VisibilitySignal {
    pub visibility: Visibility,
    /// Number of hidden → visible transitions so far
    pub reveals: u64,
}

/// Receiver side handed to pollers
pub type VisibilityWatch = watch::Receiver<VisibilitySignal>;

/// Publisher side of the visibility signal
#[derive(Clone)]
pub struct VisibilitySource {
    tx: Arc<watch::Sender<VisibilitySignal>>,
}

impl VisibilitySource {
    pub fn new(initial: Visibility) -> Self {
        let (tx, _rx) = watch::channel(VisibilitySignal {
            visibility: initial,
            reveals: 0,
        });
        Self { tx: Arc::new(tx) }
    }

    /// Report the current visibility; repeated reports of the same state are
    /// not forwarded as transitions
    pub fn set(&self, visibility: Visibility) {
        self.tx.send_if_modified(|current| {
            if current.visibility == visibility {
                return false;
            }
            if visibility.is_visible() {
                current.reveals += 1;
            }
            tracing::trace!(?visibility, reveals = current.reveals, "Visibility changed");
            current.visibility = visibility;
            true
        });
    }

    pub fn current(&self) -> Visibility {
        self.tx.borrow().visibility
    }

    pub fn subscribe(&self) -> VisibilityWatch {
        self.tx.subscribe()
    }
}

impl Default for VisibilitySource {
    fn default() -> Self {
        Self::new(Visibility::Visible)
    }
}
