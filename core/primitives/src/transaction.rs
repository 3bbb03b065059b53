use serde::{Deserialize, Serialize};

use taskchain_hash::Hash;

/// A transaction as received from a client and recorded on a chain.
///
/// The canonical hash covers `version`, `type`, `timestamp` and `content`
/// only: `from` identifies the sender and `hash` is the computed digest
/// itself, so including either in the hash would be circular.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: i32,
    pub from: String,
    #[serde(rename = "type")]
    pub tx_type: i64,
    pub timestamp: i64,
    pub content: serde_json::Value,
    pub hash: String,
}

#[derive(Serialize)]
struct HashableTransaction<'a> {
    version: i32,
    #[serde(rename = "type")]
    tx_type: i64,
    timestamp: i64,
    content: &'a serde_json::Value,
}

impl Transaction {
    /// Recomputes the canonical hash of this transaction's hashed fields,
    /// independent of whatever is currently stored in `self.hash`.
    pub fn compute_hash(&self) -> Result<Hash, serde_json::Error> {
        let hashable = HashableTransaction {
            version: self.version,
            tx_type: self.tx_type,
            timestamp: self.timestamp,
            content: &self.content,
        };
        taskchain_hash::hash_canonical(&hashable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_excludes_from_and_hash_fields() {
        let mut a = Transaction {
            version: 1,
            from: "alice".into(),
            tx_type: 100,
            timestamp: 1000,
            content: serde_json::json!({"tid": "t1"}),
            hash: "deadbeef".into(),
        };
        let mut b = a.clone();
        b.from = "bob".into();
        b.hash = "00000000".into();
        assert_eq!(a.compute_hash().unwrap(), b.compute_hash().unwrap());

        a.timestamp += 1;
        assert_ne!(a.compute_hash().unwrap(), b.compute_hash().unwrap());
    }
}
