//! Visibility-aware polling and the unread badge built on it

pub mod poller;
pub mod unread;
pub mod visibility;

pub use poller::{PollCallback, Poller, PollerOptions};
pub use unread::{UnreadAggregator, UnreadBadge, UNREAD_PAGE_SIZE, UNREAD_POLL_INTERVAL};
pub use visibility::{Visibility, VisibilitySignal, VisibilitySource, VisibilityWatch};
