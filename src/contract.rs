use metrics::histogram;
use std::time::Instant;

use crate::adapters::StateStore;
use crate::asset::{Asset, CreateAssetRequest, parse_decimal};
use crate::error::LedgerError;
use crate::history::HistoryEntry;

/// Records `asset_ledger.op.duration_ms` for `op` when dropped, so failed
/// calls are measured as well as successful ones.
struct OpTimer {
    op: &'static str,
    start: Instant,
}

impl OpTimer {
    fn start(op: &'static str) -> Self {
        Self {
            op,
            start: Instant::now(),
        }
    }
}

impl Drop for OpTimer {
    fn drop(&mut self) {
        histogram!("asset_ledger.op.duration_ms",
            "op" => self.op
        )
        .record(self.start.elapsed().as_secs_f64() * 1000.0);
    }
}

/// Asset operations over a [`StateStore`].
///
/// Holds no state: every call receives the store it works against. Each
/// operation touches a single key and either completes or leaves the store
/// untouched.
///
/// ```rust,ignore
/// let store = MemoryStore::new();
/// AssetContract::create(&store, &request).await?;
/// AssetContract::update_balance(&store, "D1", "150.5").await?;
/// let asset = AssetContract::read(&store, "D1").await?;
/// ```
pub struct AssetContract;

impl AssetContract {
    /// True when a value is stored under `dealer_id`
    pub async fn exists<S>(store: &S, dealer_id: &str) -> Result<bool, LedgerError>
    where
        S: StateStore + ?Sized,
    {
        Ok(store.get(dealer_id).await?.is_some())
    }

    /// Validate and store a new asset. Returns the stored record.
    pub async fn create<S>(store: &S, request: &CreateAssetRequest) -> Result<Asset, LedgerError>
    where
        S: StateStore + ?Sized,
    {
        let _timer = OpTimer::start("create");
        let dealer_id = request.dealer_id.as_str();

        // Reported ahead of number validation; put_new below is what
        // actually guards the key.
        if Self::exists(store, dealer_id).await? {
            tracing::warn!(dealer_id, "create rejected: asset already exists");
            return Err(LedgerError::AlreadyExists(dealer_id.to_string()));
        }

        let asset = request.to_asset().inspect_err(|err| {
            tracing::warn!(dealer_id, error = %err, "create rejected");
        })?;

        if !store.put_new(dealer_id, asset.to_bytes()?).await? {
            tracing::warn!(dealer_id, "create rejected: asset created concurrently");
            return Err(LedgerError::AlreadyExists(dealer_id.to_string()));
        }
        tracing::info!(dealer_id, balance = asset.balance, "asset created");

        Ok(asset)
    }

    pub async fn read<S>(store: &S, dealer_id: &str) -> Result<Asset, LedgerError>
    where
        S: StateStore + ?Sized,
    {
        let _timer = OpTimer::start("read");
        let bytes = store
            .get(dealer_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(dealer_id.to_string()))?;

        let asset = Asset::from_bytes(dealer_id, &bytes)?;
        tracing::debug!(dealer_id, "asset read");

        Ok(asset)
    }

    /// Replace the balance of an existing asset. The whole record is
    /// rewritten, so the history entry carries the full asset.
    pub async fn update_balance<S>(
        store: &S,
        dealer_id: &str,
        new_balance: &str,
    ) -> Result<Asset, LedgerError>
    where
        S: StateStore + ?Sized,
    {
        let _timer = OpTimer::start("update_balance");
        let mut asset = Self::read(store, dealer_id).await?;

        asset.balance = parse_decimal("newBalance", new_balance).inspect_err(|err| {
            tracing::warn!(dealer_id, error = %err, "balance update rejected");
        })?;

        store.put(dealer_id, asset.to_bytes()?).await?;
        tracing::info!(dealer_id, balance = asset.balance, "balance updated");

        Ok(asset)
    }

    /// Every logged modification of `dealer_id`, oldest first. Unknown ids
    /// have an empty history.
    pub async fn history<S>(store: &S, dealer_id: &str) -> Result<Vec<HistoryEntry>, LedgerError>
    where
        S: StateStore + ?Sized,
    {
        let _timer = OpTimer::start("history");
        let modifications = store.history_of(dealer_id).await?;

        let history = modifications
            .into_iter()
            .map(|m| {
                if m.is_delete {
                    return Ok(HistoryEntry::Deleted {
                        tx_id: m.tx_id,
                        timestamp: m.timestamp,
                    });
                }

                let bytes = m.value.ok_or_else(|| {
                    LedgerError::Corrupt(format!("{}: write {} has no value", dealer_id, m.tx_id))
                })?;
                Ok(HistoryEntry::Present {
                    asset: Asset::from_bytes(dealer_id, &bytes)?,
                    tx_id: m.tx_id,
                    timestamp: m.timestamp,
                })
            })
            .collect::<Result<Vec<_>, LedgerError>>()?;

        tracing::debug!(dealer_id, entries = history.len(), "history read");
        Ok(history)
    }
}
