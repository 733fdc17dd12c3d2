use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::asset::Asset;

/// One logged mutation of a dealer id, as returned by the contract.
///
/// Serializes to `{ "txId", "isDelete", "timestamp", "value" }` where
/// `value` is the asset JSON, or `null` for a delete marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "HistoryRecord", try_from = "HistoryRecord")]
pub enum HistoryEntry {
    Deleted {
        tx_id: String,
        timestamp: DateTime<Utc>,
    },
    Present {
        tx_id: String,
        timestamp: DateTime<Utc>,
        asset: Asset,
    },
}

impl HistoryEntry {
    pub fn tx_id(&self) -> &str {
        match self {
            Self::Deleted { tx_id, .. } | Self::Present { tx_id, .. } => tx_id,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Deleted { timestamp, .. } | Self::Present { timestamp, .. } => *timestamp,
        }
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, Self::Deleted { .. })
    }

    pub fn asset(&self) -> Option<&Asset> {
        match self {
            Self::Deleted { .. } => None,
            Self::Present { asset, .. } => Some(asset),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryRecord {
    tx_id: String,
    is_delete: bool,
    timestamp: DateTime<Utc>,
    value: Option<Asset>,
}

impl From<HistoryEntry> for HistoryRecord {
    fn from(entry: HistoryEntry) -> Self {
        match entry {
            HistoryEntry::Deleted { tx_id, timestamp } => Self {
                tx_id,
                is_delete: true,
                timestamp,
                value: None,
            },
            HistoryEntry::Present {
                tx_id,
                timestamp,
                asset,
            } => Self {
                tx_id,
                is_delete: false,
                timestamp,
                value: Some(asset),
            },
        }
    }
}

impl TryFrom<HistoryRecord> for HistoryEntry {
    type Error = String;

    fn try_from(record: HistoryRecord) -> Result<Self, Self::Error> {
        let HistoryRecord {
            tx_id,
            is_delete,
            timestamp,
            value,
        } = record;

        match (is_delete, value) {
            (true, _) => Ok(Self::Deleted { tx_id, timestamp }),
            (false, Some(asset)) => Ok(Self::Present {
                tx_id,
                timestamp,
                asset,
            }),
            (false, None) => Err(format!("history entry {} has no value", tx_id)),
        }
    }
}
