//! Activity reporters
//!
//! Long-running loops that turn badge and chat-intent updates into log
//! lines. Each ends when its source goes away.

use prolink_client::chat::ChatIntentListener;
use tokio::sync::watch;
use tracing::info;

/// Log the unread total now and on every change
pub async fn report_unread(mut count: watch::Receiver<u32>) -> u32 {
    let mut reported = 0;
    loop {
        let unread = *count.borrow_and_update();
        info!(unread, "Unread messages");
        reported += 1;

        if count.changed().await.is_err() {
            return reported;
        }
    }
}

/// Log every chat intent seen on the bus
pub async fn report_chat_intents(mut listener: ChatIntentListener) -> u32 {
    let mut reported = 0;
    while let Some(intent) = listener.recv().await {
        info!(
            open = intent.open,
            professional_id = ?intent.professional_id,
            conversation_id = ?intent.conversation_id,
            "Chat intent"
        );
        reported += 1;
    }
    reported
}

#[cfg(test)]
mod tests {
    use super::*;
    use prolink_client::ChatIntentBus;
    use prolink_shared::ChatIntent;

    #[tokio::test]
    async fn test_unread_reporter_follows_changes() {
        let (tx, rx) = watch::channel(0u32);
        let reporter = tokio::spawn(report_unread(rx));

        tokio::task::yield_now().await;
        tx.send(4).unwrap();
        tokio::task::yield_now().await;
        drop(tx);

        // Initial value plus at least the final change; intermediate values
        // may coalesce
        assert!(reporter.await.unwrap() >= 1);
    }

    #[tokio::test]
    async fn test_intent_reporter_ends_with_bus() {
        let bus = ChatIntentBus::new();
        let reporter = tokio::spawn(report_chat_intents(bus.subscribe()));

        bus.emit_open(ChatIntent::with_professional("p1"));
        bus.emit_open(ChatIntent::close());
        drop(bus);

        assert_eq!(reporter.await.unwrap(), 2);
    }
}
