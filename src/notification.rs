//! New-account notifications
//!
//! The engine emits a [`NewAccountEvent`] per first-seen account. A
//! [`Notifier`] decides what to do with it; the default just logs the
//! rendered notice.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::types::Account;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAccountEvent {
    pub id: Uuid,
    pub account: Account,
    pub detected_at: DateTime<Utc>,
}

impl NewAccountEvent {
    pub fn new(account: Account) -> Self {
        Self {
            id: Uuid::new_v4(),
            account,
            detected_at: Utc::now(),
        }
    }

    pub fn title(&self) -> &'static str {
        "New Account"
    }

    pub fn body(&self) -> String {
        let status = if self.account.recently_ordered {
            "Completed their Order"
        } else {
            "Still pending"
        };
        format!("{} - Status: {}", self.account.name, status)
    }
}

/// Sink for new-account events. Called from the engine task; must not block.
pub trait Notifier: Send + Sync {
    fn notify(&self, event: &NewAccountEvent);
}

/// Writes each notice to the log.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, event: &NewAccountEvent) {
        log::info!("{}: {}", event.title(), event.body());
    }
}

impl Notifier for mpsc::UnboundedSender<NewAccountEvent> {
    fn notify(&self, event: &NewAccountEvent) {
        if self.send(event.clone()).is_err() {
            log::debug!("Notifier: receiver dropped, discarding {}", event.account.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(recently_ordered: bool) -> Account {
        Account {
            id: 1,
            name: "Maria Lopez".to_string(),
            email: "maria@example.com".to_string(),
            recently_ordered,
        }
    }

    #[test]
    fn test_body_reports_order_status() {
        assert_eq!(
            NewAccountEvent::new(account(true)).body(),
            "Maria Lopez - Status: Completed their Order"
        );
        assert_eq!(
            NewAccountEvent::new(account(false)).body(),
            "Maria Lopez - Status: Still pending"
        );
    }

    #[test]
    fn test_channel_notifier_forwards_events() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let event = NewAccountEvent::new(account(false));

        tx.notify(&event);

        assert_eq!(rx.try_recv().unwrap(), event);
    }

    #[test]
    fn test_channel_notifier_tolerates_closed_receiver() {
        let (tx, rx) = mpsc::unbounded_channel::<NewAccountEvent>();
        drop(rx);

        tx.notify(&NewAccountEvent::new(account(true)));
    }
}
