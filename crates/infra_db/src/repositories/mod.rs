//! Repository implementations

pub mod catalog;
pub mod collections;
pub mod invoices;
pub mod ledger;

pub use catalog::CatalogRepository;
pub use collections::{AgingBucketRow, CollectionsQueries, DebtorRow};
pub use invoices::{InvoiceFilter, InvoiceItemRow, InvoiceRepository, InvoiceRow, ScheduleEntryRow};
pub use ledger::{LedgerRepository, PaymentRow, RetrySettings};
