use crate::adapters::{MemoryStore, StateStore};
use crate::error::LedgerError;

/// Environment variable read by [`StoreConfig::from_env`].
pub const STORE_URL_ENV: &str = "ASSET_LEDGER_STORE_URL";

/// Which store backs the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StoreConfig {
    #[default]
    Memory,
    /// `path` of `:memory:` opens a private in-memory database.
    Sqlite { path: String },
    Postgres { url: String },
}

impl StoreConfig {
    /// Accepted forms: `memory`, `memory://`, `sqlite::memory:`,
    /// `sqlite://<path>`, `sqlite:<path>`, `postgres://...`,
    /// `postgresql://...`.
    pub fn from_url(url: &str) -> Result<Self, LedgerError> {
        let url = url.trim();

        if url == "memory" || url == "memory://" {
            return Ok(Self::Memory);
        }

        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            return Ok(Self::Postgres {
                url: url.to_string(),
            });
        }

        if let Some(rest) = url.strip_prefix("sqlite:") {
            let path = rest.strip_prefix("//").unwrap_or(rest);
            if path.is_empty() {
                return Err(LedgerError::Storage(format!(
                    "sqlite url without a path: {}",
                    url
                )));
            }
            return Ok(Self::Sqlite {
                path: path.to_string(),
            });
        }

        Err(LedgerError::Storage(format!("unsupported store url: {}", url)))
    }

    /// Reads [`STORE_URL_ENV`]; unset means [`StoreConfig::Memory`].
    pub fn from_env() -> Result<Self, LedgerError> {
        match std::env::var(STORE_URL_ENV) {
            Ok(url) => Self::from_url(&url),
            Err(_) => Ok(Self::default()),
        }
    }

    pub fn backend(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Sqlite { .. } => "sqlite",
            Self::Postgres { .. } => "postgres",
        }
    }

    /// Open the configured store and make sure its schema exists.
    pub async fn connect(&self) -> Result<Box<dyn StateStore>, LedgerError> {
        tracing::info!(backend = self.backend(), "opening state store");

        match self {
            Self::Memory => Ok(Box::new(MemoryStore::new())),

            #[cfg(feature = "sqlite")]
            Self::Sqlite { path } => {
                let store = if path == ":memory:" {
                    crate::adapters::sqlite::SqliteStore::new_memory().await?
                } else {
                    crate::adapters::sqlite::SqliteStore::new_file(path).await?
                };
                store.init_schema().await?;
                Ok(Box::new(store))
            }

            #[cfg(feature = "postgres")]
            Self::Postgres { url } => {
                let store = crate::adapters::postgres::PostgresStore::connect(url).await?;
                store.init_schema().await?;
                Ok(Box::new(store))
            }

            #[allow(unreachable_patterns)]
            other => Err(LedgerError::Storage(format!(
                "store backend not compiled in: {}",
                other.backend()
            ))),
        }
    }
}
