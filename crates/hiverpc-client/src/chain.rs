//! Primary-chain data types, as returned by `condenser_api`.
//!
//! Only the fields the streaming engine inspects are modelled strictly;
//! everything else defaults so that nodes running slightly different
//! versions still decode.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Chain-wide state, including the head and last irreversible block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicGlobalProperties {
    pub head_block_number: u64,
    #[serde(default)]
    pub head_block_id: String,
    #[serde(default, with = "block_time::option")]
    pub time: Option<DateTime<Utc>>,
    pub last_irreversible_block_num: u64,
    /// Remaining properties, untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An operation as `[name, payload]`.
///
/// The appbase `{"type": "vote_operation", "value": {…}}` form is accepted
/// too and normalised to the same name.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub name: String,
    pub payload: Value,
}

impl Operation {
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawOperation {
    Legacy(String, Value),
    Appbase {
        #[serde(rename = "type")]
        kind: String,
        value: Value,
    },
}

impl<'de> Deserialize<'de> for Operation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match RawOperation::deserialize(deserializer)? {
            RawOperation::Legacy(name, payload) => Self { name, payload },
            RawOperation::Appbase { kind, value } => Self {
                name: kind.strip_suffix("_operation").unwrap_or(&kind).to_string(),
                payload: value,
            },
        })
    }
}

impl Serialize for Operation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (&self.name, &self.payload).serialize(serializer)
    }
}

/// A transaction as included in a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(default)]
    pub ref_block_num: u32,
    #[serde(default)]
    pub ref_block_prefix: u64,
    #[serde(default)]
    pub expiration: String,
    pub operations: Vec<Operation>,
    #[serde(default)]
    pub extensions: Vec<Value>,
    #[serde(default)]
    pub signatures: Vec<String>,
}

/// Unsigned block header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub previous: String,
    #[serde(with = "block_time")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub witness: String,
    #[serde(default)]
    pub transaction_merkle_root: String,
    #[serde(default)]
    pub extensions: Vec<Value>,
}

/// A full signed block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedBlock {
    pub previous: String,
    #[serde(with = "block_time")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub witness: String,
    #[serde(default)]
    pub transaction_merkle_root: String,
    #[serde(default)]
    pub extensions: Vec<Value>,
    #[serde(default)]
    pub witness_signature: String,
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub block_id: String,
    #[serde(default)]
    pub signing_key: String,
    #[serde(default)]
    pub transaction_ids: Vec<String>,
}

impl SignedBlock {
    /// Id of the transaction at `index`, if the node reported one.
    pub fn transaction_id(&self, index: usize) -> Option<&str> {
        self.transaction_ids.get(index).map(String::as_str)
    }
}

/// One entry of `get_ops_in_block`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedOperation {
    #[serde(default)]
    pub trx_id: String,
    pub block: u64,
    #[serde(default)]
    pub trx_in_block: u32,
    #[serde(default)]
    pub op_in_trx: u32,
    /// Nodes report this as either a boolean or a non-zero integer.
    #[serde(default, deserialize_with = "flag")]
    pub virtual_op: bool,
    #[serde(default, with = "block_time::option")]
    pub timestamp: Option<DateTime<Utc>>,
    pub op: Operation,
}

fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n > 0.0),
        _ => false,
    })
}

/// Chain timestamps: `YYYY-MM-DDTHH:MM:SS`, no zone, always UTC.
pub mod block_time {
    use super::*;

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

    /// Parse a chain timestamp. A trailing `Z` or explicit offset is tolerated.
    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        NaiveDateTime::parse_from_str(raw, FORMAT)
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f"))
            .map(|naive| naive.and_utc())
            .ok()
            .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.with_timezone(&Utc)))
    }

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid block time: {raw}")))
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error> {
            match value {
                Some(dt) => super::serialize(dt, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error> {
            Ok(Option::<String>::deserialize(deserializer)?.as_deref().and_then(parse))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use serde_json::json;

    fn block_json() -> Value {
        json!({
            "previous": "0000000a",
            "timestamp": "2016-03-24T16:05:00",
            "witness": "initminer",
            "transaction_merkle_root": "00",
            "extensions": [],
            "witness_signature": "1f",
            "block_id": "0000000b",
            "signing_key": "STM",
            "transaction_ids": ["tx0", "tx1"],
            "transactions": [
                {"ref_block_num": 1, "ref_block_prefix": 2, "expiration": "2016-03-24T16:06:00",
                 "operations": [["vote", {"voter": "a"}], ["comment", {"author": "b"}]],
                 "extensions": [], "signatures": []},
                {"operations": [{"type": "transfer_operation", "value": {"from": "c"}}]}
            ]
        })
    }

    #[test]
    fn block_decodes_with_utc_time() {
        let block: SignedBlock = serde_json::from_value(block_json()).unwrap();
        assert_eq!(block.timestamp.year(), 2016);
        assert_eq!(block.timestamp.hour(), 16);
        assert_eq!(block.transactions.len(), 2);
        assert_eq!(block.transactions[0].operations[1].name, "comment");
        assert_eq!(block.transactions[1].operations[0].name, "transfer");
        assert_eq!(block.transaction_id(1), Some("tx1"));
        assert_eq!(block.transaction_id(2), None);
    }

    #[test]
    fn block_without_transactions_is_malformed() {
        let mut raw = block_json();
        raw.as_object_mut().unwrap().remove("transactions");
        assert!(serde_json::from_value::<SignedBlock>(raw).is_err());
    }

    #[test]
    fn virtual_op_accepts_number_or_bool() {
        let op = |flag: Value| -> AppliedOperation {
            serde_json::from_value(json!({
                "trx_id": "0000", "block": 5, "trx_in_block": 0, "op_in_trx": 0,
                "virtual_op": flag, "timestamp": "2016-03-24T16:05:00",
                "op": ["producer_reward", {"producer": "initminer"}]
            }))
            .unwrap()
        };
        assert!(op(json!(1)).virtual_op);
        assert!(op(json!(true)).virtual_op);
        assert!(!op(json!(0)).virtual_op);
        assert!(!op(json!(false)).virtual_op);
    }

    #[test]
    fn block_time_forms() {
        let plain = block_time::parse("2016-03-24T16:05:00").unwrap();
        assert_eq!(block_time::parse("2016-03-24T16:05:00Z"), Some(plain));
        assert_eq!(block_time::parse("2016-03-24T16:05:00.000"), Some(plain));
        assert!(block_time::parse("yesterday").is_none());
    }

    #[test]
    fn operation_serializes_as_pair() {
        let op = Operation::new("vote", json!({"voter": "a"}));
        assert_eq!(serde_json::to_value(&op).unwrap(), json!(["vote", {"voter": "a"}]));
    }
}
