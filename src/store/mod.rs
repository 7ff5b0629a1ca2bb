//! Account store adapters.
//!
//! - [`MemoryAccountStore`]: in-process store, generic over the account key.
//! - [`PgAccountStore`]: `PostgreSQL` store keyed by `Uuid` (schema in `sql/schema.sql`).

pub mod lockout;
pub mod memory;
pub mod password;
pub mod postgres;
mod utils;

pub use lockout::LockoutPolicy;
pub use memory::{GeneratedKey, MemoryAccountStore};
pub use postgres::PgAccountStore;
