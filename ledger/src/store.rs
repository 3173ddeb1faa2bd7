// Proof ledger - append-only event log with hash chaining
//
// Each row stores the event payload together with its sequence number, the
// hash of the previous row and its own hash. Rows are only ever inserted.

use af_types::Event;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use std::mem;
use std::path::Path;

use crate::entry::{
    GENESIS_HASH, LedgerEntry, canonical_timestamp, entry_hash, format_timestamp,
};
use crate::sqlite_util::open_secure_db;
use crate::LedgerError;

/// Outcome of a successful [`Ledger::verify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyReport {
    pub entries: u64,
    pub head_hash: String,
}

struct StoredRow {
    position: i64,
    seq: i64,
    event_type: String,
    timestamp: String,
    actor: String,
    payload: String,
    prev_hash: String,
    hash: String,
}

/// SQLite-backed ledger. The sole source of truth for proof state.
pub struct Ledger {
    db: Connection,
}

impl Ledger {
    const SCHEMA: &'static str = r"
        CREATE TABLE IF NOT EXISTS ledger (
            position INTEGER PRIMARY KEY AUTOINCREMENT,
            seq INTEGER NOT NULL,
            event_type TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            actor TEXT NOT NULL,
            payload TEXT NOT NULL,
            prev_hash TEXT NOT NULL,
            hash TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_ledger_seq ON ledger(seq);
    ";

    /// Open or create a ledger database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref();
        let db = open_secure_db(path)?;
        tracing::debug!(path = %path.display(), "Opened ledger");
        Self::initialize(db)
    }

    /// Open an in-memory ledger (for testing).
    pub fn open_in_memory() -> Result<Self, LedgerError> {
        let db = Connection::open_in_memory()?;
        Self::initialize(db)
    }

    fn initialize(db: Connection) -> Result<Self, LedgerError> {
        db.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=FULL;")?;
        db.execute_batch(Self::SCHEMA)?;
        Ok(Self { db })
    }

    /// Append the events of one logical mutation.
    ///
    /// All events share `actor` and `timestamp` and are written inside a
    /// single transaction: either every entry lands or none does. The
    /// ledger head must still be at `expected_seq`; a writer that built its
    /// events against an older head gets [`LedgerError::Conflict`]. Returns
    /// the committed entries with their assigned sequence numbers and hashes.
    pub fn append(
        &mut self,
        expected_seq: u64,
        actor: &str,
        timestamp: DateTime<Utc>,
        events: &[Event],
    ) -> Result<Vec<LedgerEntry>, LedgerError> {
        if events.is_empty() {
            return Ok(Vec::new());
        }

        let timestamp = canonical_timestamp(timestamp);
        let tx = self
            .db
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let head: Option<(i64, String)> = tx
            .query_row(
                "SELECT seq, hash FROM ledger ORDER BY position DESC LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let (mut seq, mut prev_hash) = match head {
            Some((seq, hash)) => (to_seq(seq, 0)?, hash),
            None => (0, GENESIS_HASH.to_owned()),
        };
        if seq != expected_seq {
            return Err(LedgerError::Conflict {
                expected: expected_seq,
                found: seq,
            });
        }

        let timestamp_text = format_timestamp(timestamp);
        let mut committed = Vec::with_capacity(events.len());
        for event in events {
            seq += 1;
            let payload = serde_json::to_string(event)?;
            let event_type = event.event_type();
            let hash = entry_hash(
                seq,
                event_type,
                &timestamp_text,
                actor,
                &prev_hash,
                &payload,
            );
            tx.execute(
                "INSERT INTO ledger (seq, event_type, timestamp, actor, payload, prev_hash, hash)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    from_seq(seq)?,
                    event_type,
                    &timestamp_text,
                    actor,
                    payload,
                    &prev_hash,
                    &hash
                ],
            )?;
            committed.push(LedgerEntry {
                seq,
                timestamp,
                actor: actor.to_owned(),
                event: event.clone(),
                prev_hash: mem::replace(&mut prev_hash, hash.clone()),
                hash,
            });
        }

        tx.commit()?;
        Ok(committed)
    }

    /// Sequence number of the newest entry, or 0 for an empty ledger.
    pub fn last_seq(&self) -> Result<u64, LedgerError> {
        let seq: Option<i64> = self
            .db
            .query_row(
                "SELECT seq FROM ledger ORDER BY position DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        seq.map_or(Ok(0), |seq| to_seq(seq, 0))
    }

    /// Recompute every stored hash and check sequence structure.
    ///
    /// A row whose own hash does not match its columns is reported as
    /// [`LedgerError::HashMismatch`]. Gaps, reordering, duplicates, broken
    /// `prev_hash` links and unparseable rows are
    /// [`LedgerError::Inconsistent`].
    pub fn verify(&self) -> Result<VerifyReport, LedgerError> {
        let entries = self.verified_entries()?;
        Ok(VerifyReport {
            entries: entries.len() as u64,
            head_hash: entries
                .last()
                .map_or_else(|| GENESIS_HASH.to_owned(), |entry| entry.hash.clone()),
        })
    }

    /// Read all entries in sequence order, verifying each one.
    pub fn verified_entries(&self) -> Result<Vec<LedgerEntry>, LedgerError> {
        let rows = self.stored_rows()?;
        let mut entries = Vec::with_capacity(rows.len());
        let mut expected_prev = GENESIS_HASH.to_owned();

        for (index, row) in rows.into_iter().enumerate() {
            let expected_seq = index as u64 + 1;
            let seq = to_seq(row.seq, row.position)?;
            if seq != expected_seq {
                let detail = if seq > expected_seq {
                    format!("gap: expected seq {expected_seq}, found {seq}")
                } else {
                    format!("out of order: expected seq {expected_seq}, found {seq}")
                };
                return Err(inconsistent(row.position, detail));
            }

            let recomputed = entry_hash(
                seq,
                &row.event_type,
                &row.timestamp,
                &row.actor,
                &row.prev_hash,
                &row.payload,
            );
            if recomputed != row.hash {
                return Err(LedgerError::HashMismatch {
                    seq,
                    stored: row.hash,
                    computed: recomputed,
                });
            }

            if row.prev_hash != expected_prev {
                return Err(inconsistent(
                    row.position,
                    format!("seq {seq} does not link to its predecessor"),
                ));
            }

            let event: Event = serde_json::from_str(&row.payload).map_err(|err| {
                inconsistent(row.position, format!("seq {seq} payload unreadable: {err}"))
            })?;
            if event.event_type() != row.event_type {
                return Err(inconsistent(
                    row.position,
                    format!(
                        "seq {seq} recorded as {} but payload is {}",
                        row.event_type,
                        event.event_type()
                    ),
                ));
            }
            let timestamp = DateTime::parse_from_rfc3339(&row.timestamp)
                .map_err(|err| {
                    inconsistent(row.position, format!("seq {seq} timestamp unreadable: {err}"))
                })?
                .with_timezone(&Utc);

            expected_prev.clone_from(&row.hash);
            entries.push(LedgerEntry {
                seq,
                timestamp,
                actor: row.actor,
                event,
                prev_hash: row.prev_hash,
                hash: row.hash,
            });
        }

        Ok(entries)
    }

    fn stored_rows(&self) -> Result<Vec<StoredRow>, LedgerError> {
        let mut stmt = self.db.prepare(
            "SELECT position, seq, event_type, timestamp, actor, payload, prev_hash, hash
             FROM ledger ORDER BY position ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(StoredRow {
                position: row.get(0)?,
                seq: row.get(1)?,
                event_type: row.get(2)?,
                timestamp: row.get(3)?,
                actor: row.get(4)?,
                payload: row.get(5)?,
                prev_hash: row.get(6)?,
                hash: row.get(7)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(LedgerError::from)
    }
}

fn inconsistent(position: i64, detail: String) -> LedgerError {
    LedgerError::Inconsistent {
        position: position.max(0) as u64,
        detail,
    }
}

fn to_seq(raw: i64, position: i64) -> Result<u64, LedgerError> {
    u64::try_from(raw).map_err(|_err| inconsistent(position, format!("negative seq {raw}")))
}

fn from_seq(seq: u64) -> Result<i64, LedgerError> {
    i64::try_from(seq).map_err(|_err| inconsistent(0, format!("seq {seq} exceeds storage range")))
}
