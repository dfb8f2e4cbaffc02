//! Database Infrastructure Layer
//!
//! SQLx/PostgreSQL persistence for the billing core. The ledger repository
//! carries the concurrency contract: per-invoice row locks, bounded
//! jittered retry on contention, a transaction deadline, and post-commit
//! notification dispatch.
//!
//! Queries use the runtime API (`sqlx::query`/`query_as` with binds), so
//! the workspace builds without a live database.

pub mod error;
pub mod pool;
pub mod repositories;

pub use error::{DatabaseError, RepositoryError};
pub use pool::{create_pool, create_pool_from_url, run_migrations, DatabaseConfig, DatabasePool};
pub use repositories::{
    CatalogRepository, CollectionsQueries, InvoiceFilter, InvoiceRepository, LedgerRepository,
    RetrySettings,
};
