//! Address book persistence layer.
//!
//! The hardhat tasks record every deployment in JSON files under
//! `{root}/info/`, keyed first by network and then by contract name:
//!
//! - `address.json`: named contracts (stablecoins, DEG, core contracts)
//! - `NPToken.json`: naughty price tokens (`address`, `deadline`, `settleTime`)
//! - `NPPool.json`:  swap pools keyed by token name (`poolAddress`, ...)
//!
//! This module only reads them. Each call re-reads the file so that entries
//! written by a deployment a moment ago are visible; nothing is cached.

use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::types::{Direction, InstrumentName, InstrumentPair, RoundLabel, Token};

/// Sub-directory of the hardhat project holding the address books.
const INFO_DIR: &str = "info";

// ---------------------------------------------------------------------------
// Books
// ---------------------------------------------------------------------------

/// One of the JSON address books.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Book {
    Contracts,
    Tokens,
    Pools,
}

impl Book {
    pub fn file_name(&self) -> &'static str {
        match self {
            Book::Contracts => "address.json",
            Book::Tokens => "NPToken.json",
            Book::Pools => "NPPool.json",
        }
    }
}

impl fmt::Display for Book {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// Address book lookup failures.
#[derive(Debug, thiserror::Error)]
pub enum AddressBookError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{book} has no section for network {network}")]
    NetworkMissing { book: Book, network: String },

    #[error("{key} not found in {book} for network {network}")]
    NotFound {
        book: Book,
        network: String,
        key: String,
    },

    #[error("{key} in {book} has no {field} field")]
    MissingField {
        book: Book,
        key: String,
        field: &'static str,
    },
}

// ---------------------------------------------------------------------------
// Address book
// ---------------------------------------------------------------------------

/// Read-only view of the address books of one network.
#[derive(Debug, Clone)]
pub struct AddressBook {
    info_dir: PathBuf,
    network: String,
}

impl AddressBook {
    /// Address books of the hardhat project at `root`.
    pub fn new(root: &Path, network: &str) -> Self {
        Self::with_info_dir(root.join(INFO_DIR), network)
    }

    pub fn with_info_dir(info_dir: PathBuf, network: &str) -> Self {
        Self {
            info_dir,
            network: network.to_string(),
        }
    }

    pub fn path(&self, book: Book) -> PathBuf {
        self.info_dir.join(book.file_name())
    }

    /// Load the network section of a book, preserving file order.
    pub fn load(&self, book: Book) -> Result<Map<String, Value>, AddressBookError> {
        let path = self.path(book);
        let json = std::fs::read_to_string(&path).map_err(|source| AddressBookError::Io {
            path: path.clone(),
            source,
        })?;
        let mut root: Map<String, Value> =
            serde_json::from_str(&json).map_err(|source| AddressBookError::Parse {
                path: path.clone(),
                source,
            })?;

        let section = match root.remove(&self.network) {
            Some(Value::Object(section)) => section,
            _ => {
                return Err(AddressBookError::NetworkMissing {
                    book,
                    network: self.network.clone(),
                })
            }
        };

        debug!(path = %path.display(), entries = section.len(), "Address book loaded");
        Ok(section)
    }

    fn entry(&self, book: Book, key: &str) -> Result<Value, AddressBookError> {
        self.load(book)?
            .remove(key)
            .ok_or_else(|| AddressBookError::NotFound {
                book,
                network: self.network.clone(),
                key: key.to_string(),
            })
    }

    fn field(book: Book, key: &str, entry: &Value, field: &'static str) -> Result<String, AddressBookError> {
        entry
            .get(field)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| AddressBookError::MissingField {
                book,
                key: key.to_string(),
                field,
            })
    }

    /// Address of a named contract in `address.json` (e.g. `MockUSD`).
    ///
    /// Entries are either a bare address string or an object with `address`.
    pub fn contract_address(&self, name: &str) -> Result<String, AddressBookError> {
        let entry = self.entry(Book::Contracts, name)?;
        match entry {
            Value::String(address) => Ok(address),
            other => Self::field(Book::Contracts, name, &other, "address"),
        }
    }

    /// Address of a deployed naughty price token.
    pub fn token_address(&self, instrument: &InstrumentName) -> Result<String, AddressBookError> {
        let key = instrument.as_str();
        let entry = self.entry(Book::Tokens, key)?;
        Self::field(Book::Tokens, key, &entry, "address")
    }

    /// Swap pool address recorded for an instrument in `NPPool.json`.
    pub fn pool_address(&self, instrument: &InstrumentName) -> Result<String, AddressBookError> {
        let key = instrument.as_str();
        let entry = self.entry(Book::Pools, key)?;
        Self::field(Book::Pools, key, &entry, "poolAddress")
    }

    /// Most recently recorded instrument of `token` in `round` on the given leg.
    pub fn latest_instrument(
        &self,
        book: Book,
        token: Token,
        round: &RoundLabel,
        direction: Direction,
    ) -> Result<InstrumentName, AddressBookError> {
        let section = self.load(book)?;
        find_latest(section.keys().map(String::as_str), token, round, direction).ok_or_else(|| {
            AddressBookError::NotFound {
                book,
                network: self.network.clone(),
                key: format!("{token}_*_{}_{round}", direction.marker()),
            }
        })
    }

    /// Most recent call and put instruments of `token` in `round`.
    pub fn latest_pair(
        &self,
        book: Book,
        token: Token,
        round: &RoundLabel,
    ) -> Result<InstrumentPair, AddressBookError> {
        Ok(InstrumentPair {
            call: self.latest_instrument(book, token, round, Direction::High)?,
            put: self.latest_instrument(book, token, round, Direction::Low)?,
        })
    }
}

/// Scan names newest-first and return the first one for `token`, `round`
/// and `direction`. Names that are not instrument names are skipped.
pub fn find_latest<'a, I>(
    names: I,
    token: Token,
    round: &RoundLabel,
    direction: Direction,
) -> Option<InstrumentName>
where
    I: DoubleEndedIterator<Item = &'a str>,
{
    names
        .rev()
        .filter_map(|name| name.parse::<InstrumentName>().ok())
        .find(|name| name.matches(token, round, direction))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
