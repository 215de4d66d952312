//! sled-backed storage for short links and their click counters.
//!
//! Two trees live side by side in one database:
//! - `urls`: short code → JSON encoded [`UrlRecord`]
//! - `stats`: short code → decimal click counter
//!
//! Both are written together inside one transaction when a link is created.

use crate::model::UrlRecord;
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionError,
    TransactionalTree,
};
use sled::{Db, IVec, Transactional, Tree};
use std::path::Path;
use thiserror::Error;

const URLS_TREE: &str = "urls";
const STATS_TREE: &str = "stats";
const INITIAL_COUNTER: &[u8] = b"0";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid click counter for {0}")]
    InvalidCounter(String),
}

impl From<TransactionError<StorageError>> for StorageError {
    fn from(err: TransactionError<StorageError>) -> Self {
        match err {
            TransactionError::Abort(err) => err,
            TransactionError::Storage(err) => StorageError::Database(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// A link as seen by a full scan of the `urls` tree.
#[derive(Debug, Clone)]
pub struct UrlEntry {
    pub code: String,
    pub record: UrlRecord,
    pub clicks: u64,
}

/// Result of walking every stored link in key order.
#[derive(Debug, Default)]
pub struct UrlScan {
    /// Every key in `urls`, including records that failed to decode.
    pub total: usize,
    pub entries: Vec<UrlEntry>,
}

pub struct Storage {
    db: Db,
    urls: Tree,
    stats: Tree,
}

impl Storage {
    /// Open (or create) the database at `path` and make sure both trees exist.
    ///
    /// Fails straight away when another process holds the database lock.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_db(sled::open(path)?)
    }

    /// Open a throwaway database that is removed on drop.
    pub fn open_temporary() -> Result<Self> {
        Self::from_db(sled::Config::new().temporary(true).open()?)
    }

    fn from_db(db: Db) -> Result<Self> {
        let urls = db.open_tree(URLS_TREE)?;
        let stats = db.open_tree(STATS_TREE)?;
        Ok(Self { db, urls, stats })
    }

    /// Run a read-only closure against a consistent view of both trees.
    pub fn view<F, T>(&self, f: F) -> Result<T>
    where
        F: Fn(&TransactionalTree, &TransactionalTree) -> ConflictableTransactionResult<T, StorageError>,
    {
        self.transaction(f)
    }

    /// Run a closure whose writes to both trees commit atomically.
    pub fn update<F, T>(&self, f: F) -> Result<T>
    where
        F: Fn(&TransactionalTree, &TransactionalTree) -> ConflictableTransactionResult<T, StorageError>,
    {
        self.transaction(f)
    }

    // sled has no separate read-only transaction; both scopes share one
    // serializable transaction type.
    fn transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: Fn(&TransactionalTree, &TransactionalTree) -> ConflictableTransactionResult<T, StorageError>,
    {
        Ok((&self.urls, &self.stats).transaction(|(urls, stats)| f(urls, stats))?)
    }

    /// Store a new link with a zero counter.
    ///
    /// Returns `false` without writing anything when `code` is already taken.
    pub fn insert_url(&self, code: &str, record: &UrlRecord) -> Result<bool> {
        let encoded = serde_json::to_vec(record)?;
        self.update(|urls, stats| {
            if urls.get(code)?.is_some() {
                return Ok(false);
            }
            urls.insert(code.as_bytes(), encoded.as_slice())?;
            stats.insert(code.as_bytes(), INITIAL_COUNTER)?;
            Ok(true)
        })
    }

    pub fn get_url(&self, code: &str) -> Result<Option<UrlRecord>> {
        let value = self.view(|urls, _| Ok(urls.get(code)?))?;
        value.map(|bytes| decode_record(&bytes)).transpose()
    }

    /// Read a link together with its click counter.
    pub fn get_url_with_clicks(&self, code: &str) -> Result<Option<(UrlRecord, u64)>> {
        let found = self.view(|urls, stats| match urls.get(code)? {
            Some(record) => {
                let clicks = stats
                    .get(code)?
                    .map(|counter| parse_counter(code, &counter))
                    .transpose()
                    .map_err(ConflictableTransactionError::Abort)?
                    .unwrap_or(0);
                Ok(Some((record, clicks)))
            }
            None => Ok(None),
        })?;
        match found {
            Some((bytes, clicks)) => Ok(Some((decode_record(&bytes)?, clicks))),
            None => Ok(None),
        }
    }

    /// Add one click to `code` and return the new total.
    pub fn increment_clicks(&self, code: &str) -> Result<u64> {
        self.update(|_, stats| {
            let current = stats
                .get(code)?
                .map(|counter| parse_counter(code, &counter))
                .transpose()
                .map_err(ConflictableTransactionError::Abort)?
                .unwrap_or(0);
            let next = current + 1;
            stats.insert(code.as_bytes(), next.to_string().as_bytes())?;
            Ok(next)
        })
    }

    /// Walk every link in key order, joining each with its counter.
    ///
    /// Records that fail to decode are counted in [`UrlScan::total`] but left
    /// out of the entries.
    pub fn scan(&self) -> Result<UrlScan> {
        let mut scan = UrlScan::default();
        for item in self.urls.iter() {
            let (key, value) = item?;
            scan.total += 1;
            let code = String::from_utf8_lossy(&key).into_owned();
            let record = match decode_record(&value) {
                Ok(record) => record,
                Err(err) => {
                    tracing::warn!("Skipping undecodable record {}: {}", code, err);
                    continue;
                }
            };
            let clicks = match self.stats.get(&key)? {
                Some(counter) => parse_counter(&code, &counter)?,
                None => 0,
            };
            scan.entries.push(UrlEntry {
                code,
                record,
                clicks,
            });
        }
        Ok(scan)
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

fn decode_record(bytes: &IVec) -> Result<UrlRecord> {
    Ok(serde_json::from_slice(bytes)?)
}

fn parse_counter(code: &str, bytes: &[u8]) -> Result<u64> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|text| text.parse().ok())
        .ok_or_else(|| StorageError::InvalidCounter(code.to_string()))
}
