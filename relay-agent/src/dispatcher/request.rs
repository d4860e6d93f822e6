use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Parameters of a random outputs request; both fields are optional on the wire
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RandomOutputsRequest {
    #[serde(default, deserialize_with = "null_as_default")]
    pub amounts: Vec<u64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub mixin: u64,
}

/// Treats an explicit `null` like a missing field
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A queued payload, classified into the daemon call it asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayRequest {
    /// `{ rawTransaction, hash? }`
    RawTransaction {
        raw_transaction: String,
        /// Transaction hash supplied by the requester, only used for logging
        hash: Option<String>,
    },
    /// `{ blockBlob }`
    BlockBlob(String),
    /// `{ walletAddress, reserveSize }`
    BlockTemplate {
        wallet_address: String,
        reserve_size: u64,
    },
    /// `{ randomOutputs: { amounts?, mixin? } }`
    RandomOutputs(RandomOutputsRequest),
    /// Nothing we know how to relay
    Unrecognized,
}

fn present(payload: &Value, field: &str) -> Option<Value> {
    payload.get(field).filter(|value| !value.is_null()).cloned()
}

/// Non-negative integer field; integral floats such as `8.0` count too
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::float_cmp
)]
fn count_field(payload: &Value, field: &str) -> Option<u64> {
    let value = payload.get(field)?;
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|n| *n >= 0.0 && n.fract() == 0.0 && *n <= u64::MAX as f64)
            .map(|n| n as u64)
    })
}

fn string_field(payload: &Value, field: &str) -> Option<String> {
    payload
        .get(field)
        .and_then(Value::as_str)
        .map(ToString::to_string)
}

impl RelayRequest {
    /// Classifies a payload by the fields it carries
    ///
    /// Checked in a fixed order: raw transaction, block blob, wallet address
    /// with reserve size, random outputs. The first match wins, so a payload
    /// carrying several shapes is handled as the highest-priority one. Fields
    /// of the wrong JSON type do not match.
    #[must_use]
    pub fn classify(payload: &Value) -> Self {
        if let Some(raw_transaction) = string_field(payload, "rawTransaction") {
            return Self::RawTransaction {
                raw_transaction,
                hash: string_field(payload, "hash"),
            };
        }

        if let Some(block_blob) = string_field(payload, "blockBlob") {
            return Self::BlockBlob(block_blob);
        }

        let wallet_address = string_field(payload, "walletAddress");
        let reserve_size = count_field(payload, "reserveSize");
        if let (Some(wallet_address), Some(reserve_size)) = (wallet_address, reserve_size) {
            return Self::BlockTemplate {
                wallet_address,
                reserve_size,
            };
        }

        if let Some(random_outputs) = present(payload, "randomOutputs") {
            return serde_json::from_value(random_outputs)
                .map_or(Self::Unrecognized, Self::RandomOutputs);
        }

        Self::Unrecognized
    }

    /// Name of the daemon operation, for log context
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        match self {
            Self::RawTransaction { .. } => "send_raw_transaction",
            Self::BlockBlob(_) => "submit_block",
            Self::BlockTemplate { .. } => "block_template",
            Self::RandomOutputs(_) => "random_outputs",
            Self::Unrecognized => "none",
        }
    }

    /// Identifier of what is being relayed, for log context
    #[must_use]
    pub fn subject(&self) -> String {
        match self {
            Self::RawTransaction { hash, .. } => hash.clone().unwrap_or_else(|| "unknown".to_string()),
            Self::BlockBlob(block_blob) => block_blob.clone(),
            Self::BlockTemplate { wallet_address, .. } => wallet_address.clone(),
            Self::RandomOutputs(request) => format!("{:?}", request.amounts),
            Self::Unrecognized => String::new(),
        }
    }
}
