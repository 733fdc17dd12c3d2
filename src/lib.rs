//! # Asset Ledger
//!
//! Dealer asset records kept in a key-value world state, with every write
//! logged per key so the full change history of a record can be replayed.
//!
//! Two layers:
//!
//! - [`StateStore`]: `get` / `put` / `delete` / `history_of` over raw bytes.
//!   Ships with [`MemoryStore`], a SQLite store (`sqlite` feature, default)
//!   and a Postgres store (`postgres` feature).
//! - [`AssetContract`]: create / read / update-balance / history of JSON
//!   [`Asset`] records, enforcing that a dealer id is created once and only
//!   read or updated once it exists.
//!
//! ```rust,ignore
//! let store = StoreConfig::from_env()?.connect().await?;
//!
//! AssetContract::create(&store, &request).await?;
//! AssetContract::update_balance(&store, "D1", "150.5").await?;
//!
//! for entry in AssetContract::history(&store, "D1").await? {
//!     println!("{} {:?}", entry.tx_id(), entry.asset().map(|a| a.balance));
//! }
//! ```
//!
//! ## Feature flags
//!
//! | Flag       | Default | Description                  |
//! |------------|---------|------------------------------|
//! | `sqlite`   | ✓       | SQLite store via sqlx        |
//! | `postgres` |         | PostgreSQL store via sqlx    |

pub mod adapters;
pub mod asset;
pub mod config;
pub mod contract;
pub mod error;
pub mod history;

pub use adapters::{KeyModification, MemoryStore, StateStore};
pub use asset::{Asset, CreateAssetRequest, UpdateBalanceRequest, parse_decimal};
pub use config::StoreConfig;
pub use contract::AssetContract;
pub use error::LedgerError;
pub use history::HistoryEntry;

#[cfg(feature = "postgres")]
pub use adapters::postgres::PostgresStore;
#[cfg(feature = "sqlite")]
pub use adapters::sqlite::SqliteStore;
