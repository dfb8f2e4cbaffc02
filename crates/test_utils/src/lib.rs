//! Shared Test Utilities
//!
//! Fixtures, builders, and assertions for the billing test suite. These
//! keep tests focused on the behavior under test by supplying sensible
//! defaults for everything else.

pub mod assertions;
pub mod builders;
pub mod fixtures;
