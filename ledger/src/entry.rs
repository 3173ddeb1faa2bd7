use af_types::Event;
use af_types::digest::ContentHasher;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};

/// `prev_hash` of the first entry.
pub const GENESIS_HASH: &str = "";

/// One committed ledger record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    pub event: Event,
    pub prev_hash: String,
    pub hash: String,
}

impl LedgerEntry {
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        self.event.event_type()
    }
}

/// Truncate a timestamp to the precision stored in the ledger (microseconds).
///
/// Callers that build state from a timestamp before appending must use the
/// truncated value so live state and replayed state agree.
#[must_use]
pub fn canonical_timestamp(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.trunc_subsecs(6)
}

pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Hash over the stored columns of one row, chained to its predecessor.
pub(crate) fn entry_hash(
    seq: u64,
    event_type: &str,
    timestamp: &str,
    actor: &str,
    prev_hash: &str,
    payload: &str,
) -> String {
    let mut hasher = ContentHasher::new("af.ledger.v1");
    hasher
        .field(&seq.to_string())
        .field(event_type)
        .field(timestamp)
        .field(actor)
        .field(prev_hash)
        .field(payload);
    hasher.finish_hex()
}
