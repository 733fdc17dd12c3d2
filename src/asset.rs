use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// Account-like record stored under its dealer id. Fields missing from a
/// stored record decode to their zero value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Asset {
    pub dealer_id: String,
    pub msisdn: String,
    pub mpin: String,
    pub balance: f64,
    pub status: String,
    pub trans_amount: f64,
    pub trans_type: String,
    pub remarks: String,
}

impl Asset {
    pub(crate) fn to_bytes(&self) -> Result<Vec<u8>, LedgerError> {
        serde_json::to_vec(self).map_err(|e| LedgerError::Storage(e.to_string()))
    }

    pub(crate) fn from_bytes(dealer_id: &str, bytes: &[u8]) -> Result<Self, LedgerError> {
        serde_json::from_slice(bytes)
            .map_err(|e| LedgerError::Corrupt(format!("{}: {}", dealer_id, e)))
    }
}

/// Create payload as an API facade decodes it. Numeric fields are still
/// strings here and get validated by the contract.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAssetRequest {
    pub dealer_id: String,
    pub msisdn: String,
    pub mpin: String,
    pub balance: String,
    pub status: String,
    pub trans_amount: String,
    pub trans_type: String,
    pub remarks: String,
}

impl CreateAssetRequest {
    pub(crate) fn to_asset(&self) -> Result<Asset, LedgerError> {
        let balance = parse_decimal("balance", &self.balance)?;
        let trans_amount = parse_decimal("transAmount", &self.trans_amount)?;

        Ok(Asset {
            dealer_id: self.dealer_id.clone(),
            msisdn: self.msisdn.clone(),
            mpin: self.mpin.clone(),
            balance,
            status: self.status.clone(),
            trans_amount,
            trans_type: self.trans_type.clone(),
            remarks: self.remarks.clone(),
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBalanceRequest {
    pub dealer_id: String,
    pub new_balance: String,
}

/// Parses a decimal string, or a hex float such as `0x1.8p3`. Non-finite
/// results are rejected since JSON has no representation for them.
pub fn parse_decimal(field: &'static str, input: &str) -> Result<f64, LedgerError> {
    let parsed = input
        .parse::<f64>()
        .ok()
        .or_else(|| parse_hex_float(input));

    match parsed {
        Some(value) if value.is_finite() => Ok(value),
        _ => Err(LedgerError::InvalidNumber {
            field,
            input: input.to_string(),
        }),
    }
}

/// `[+-]0x<hex mantissa>p<decimal exponent>`; the binary exponent is
/// mandatory.
fn parse_hex_float(input: &str) -> Option<f64> {
    let (negative, rest) = match input.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, input.strip_prefix('+').unwrap_or(input)),
    };
    let rest = rest
        .strip_prefix("0x")
        .or_else(|| rest.strip_prefix("0X"))?;
    let (mantissa, exponent) = rest.split_once(['p', 'P'])?;
    let exponent: i32 = exponent.parse().ok()?;

    let (int_digits, frac_digits) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    if int_digits.is_empty() && frac_digits.is_empty() {
        return None;
    }

    let mut value = 0.0_f64;
    for c in int_digits.chars().chain(frac_digits.chars()) {
        value = value * 16.0 + f64::from(c.to_digit(16)?);
    }

    let frac_bits = i32::try_from(frac_digits.len()).ok()?.checked_mul(4)?;
    let value = value * 2.0_f64.powi(exponent.checked_sub(frac_bits)?);

    Some(if negative { -value } else { value })
}
