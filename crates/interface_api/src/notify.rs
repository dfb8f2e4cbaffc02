//! Notification dispatch adapters

use tracing::info;

use core_kernel::DomainPort;
use domain_billing::{LedgerEvent, NotificationDispatcher};

/// Dispatcher that records ledger events in the structured log
///
/// Stands in for the external notification channel: dispatch happens after
/// the financial mutation has committed and can never fail it.
#[derive(Debug, Default, Clone)]
pub struct TracingDispatcher;

impl DomainPort for TracingDispatcher {}

impl NotificationDispatcher for TracingDispatcher {
    fn notify(&self, event: LedgerEvent) {
        match serde_json::to_string(&event) {
            Ok(payload) => info!(target: "ledger_events", %payload, "ledger event"),
            Err(e) => info!(target: "ledger_events", error = %e, "unserializable ledger event"),
        }
    }
}
