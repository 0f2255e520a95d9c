//! Process-wide chat intent bus
//!
//! Any surface can ask for the chat widget to open; whichever listeners are
//! subscribed at that moment receive the intent. There is no queue: an
//! intent emitted with no listener is gone.

use std::sync::OnceLock;

use prolink_shared::ChatIntent;
use tokio::sync::broadcast;

/// Intents buffered per listener before the slowest one starts lagging
const LISTENER_CAPACITY: usize = 16;

static GLOBAL_BUS: OnceLock<ChatIntentBus> = OnceLock::new();

/// Publish side of the chat intent topic
#[derive(Clone)]
pub struct ChatIntentBus {
    tx: broadcast::Sender<ChatIntent>,
}

impl ChatIntentBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(LISTENER_CAPACITY);
        Self { tx }
    }

    /// Shared bus for the whole process
    pub fn global() -> &'static ChatIntentBus {
        GLOBAL_BUS.get_or_init(ChatIntentBus::new)
    }

    /// Deliver an intent to every current listener
    ///
    /// Returns how many listeners it reached; zero means it was dropped.
    pub fn emit_open(&self, intent: ChatIntent) -> usize {
        self.tx.send(intent).unwrap_or(0)
    }

    /// Start listening; only intents emitted after this call are seen
    pub fn subscribe(&self) -> ChatIntentListener {
        ChatIntentListener {
            rx: self.tx.subscribe(),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ChatIntentBus {
    fn default() -> Self {
        Self::new()
    }
}

/// A mounted chat surface; dropping it unsubscribes
pub struct ChatIntentListener {
    rx: broadcast::Receiver<ChatIntent>,
}

impl ChatIntentListener {
    /// Wait for the next intent; `None` once the bus is gone
    pub async fn recv(&mut self) -> Option<ChatIntent> {
        loop {
            match self.rx.recv().await {
                Ok(intent) => return Some(intent),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Chat intent listener lagged, oldest intents lost");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Next intent if one is already waiting
    pub fn try_recv(&mut self) -> Option<ChatIntent> {
        loop {
            match self.rx.try_recv() {
                Ok(intent) => return Some(intent),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Chat intent listener lagged, oldest intents lost");
                }
                Err(_) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_listener_is_dropped() {
        let bus = ChatIntentBus::new();
        assert_eq!(bus.emit_open(ChatIntent::with_professional("p1")), 0);

        // A listener mounted afterwards never sees it
        let mut listener = bus.subscribe();
        assert_eq!(listener.try_recv(), None);
    }

    #[tokio::test]
    async fn test_every_listener_receives() {
        let bus = ChatIntentBus::new();
        let mut widget = bus.subscribe();
        let mut header = bus.subscribe();

        let intent = ChatIntent::with_conversation("c9");
        assert_eq!(bus.emit_open(intent.clone()), 2);

        assert_eq!(widget.recv().await, Some(intent.clone()));
        assert_eq!(header.recv().await, Some(intent));
    }

    #[test]
    fn test_dropped_listener_unsubscribes() {
        let bus = ChatIntentBus::new();
        let listener = bus.subscribe();
        assert_eq!(bus.listener_count(), 1);

        drop(listener);
        assert_eq!(bus.listener_count(), 0);
        assert_eq!(bus.emit_open(ChatIntent::close()), 0);
    }

    #[tokio::test]
    async fn test_recv_ends_when_bus_dropped() {
        let bus = ChatIntentBus::new();
        let mut listener = bus.subscribe();
        drop(bus);
        assert_eq!(listener.recv().await, None);
    }

    #[test]
    fn test_global_is_shared() {
        assert!(std::ptr::eq(ChatIntentBus::global(), ChatIntentBus::global()));
    }
}
