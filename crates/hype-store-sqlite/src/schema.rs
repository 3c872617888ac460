//! SQL schema for the document store.
//!
//! Executed once at connection startup. `PRAGMA user_version` records the
//! layout version for later migrations.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- One row per document. `collection` is the full slash-separated path,
-- e.g. 'users/<uid>/games'; `body` is a compact JSON object.
CREATE TABLE IF NOT EXISTS documents (
    collection  TEXT NOT NULL,
    key         TEXT NOT NULL,
    body        TEXT NOT NULL,
    PRIMARY KEY (collection, key)
) WITHOUT ROWID;

PRAGMA user_version = 1;
";
