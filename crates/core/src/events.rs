//! Cache change notifications.

use tokio::sync::broadcast;

use crate::entities::{AccountEntity, AccountInfo};

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    AccountAdded(AccountInfo),
    AccountRemoved(AccountInfo),
    /// The active-account pointer was set, replaced or cleared.
    ActiveAccountChanged(Option<AccountInfo>),
}

/// Fan-out of [`CacheEvent`]s to any number of subscribers.
///
/// Emitting with no subscribers is not an error; the event is dropped.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CacheEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: CacheEvent) {
        tracing::trace!(?event, "cache event");
        let _ = self.sender.send(event);
    }

    pub(crate) fn account_added(&self, account: &AccountEntity) {
        self.emit(CacheEvent::AccountAdded(account.account_info()));
    }

    pub(crate) fn account_removed(&self, account: &AccountEntity) {
        self.emit(CacheEvent::AccountRemoved(account.account_info()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::account::tests::sample_account;

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let account = sample_account("uid.utid");

        bus.account_added(&account);
        bus.emit(CacheEvent::ActiveAccountChanged(None));

        assert_eq!(rx.recv().await.unwrap(), CacheEvent::AccountAdded(account.account_info()));
        assert_eq!(rx.recv().await.unwrap(), CacheEvent::ActiveAccountChanged(None));
    }

    #[test]
    fn test_emit_without_subscribers() {
        EventBus::new().emit(CacheEvent::ActiveAccountChanged(None));
    }
}
