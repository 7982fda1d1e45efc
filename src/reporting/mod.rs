//! Run reporting: the balance ledger and the operator notification sink

pub mod ledger;
pub mod notifier;

pub use ledger::{BalanceLedger, LedgerEntry};
pub use notifier::{format_line, NotificationSink, TelegramClient};
