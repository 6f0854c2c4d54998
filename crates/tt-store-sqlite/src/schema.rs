//! SQL schema for the tt SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    id     INTEGER PRIMARY KEY AUTOINCREMENT,
    name   TEXT NOT NULL UNIQUE,
    email  TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS things (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    address      TEXT NOT NULL,
    type         TEXT NOT NULL
                 CHECK (type IN ('dir', 'file', 'irods', 'openstack', 's3')),
    created      TEXT NOT NULL,            -- RFC 3339 UTC; server-assigned
    description  TEXT NOT NULL DEFAULT '',
    reason       TEXT NOT NULL,
    remove       TEXT NOT NULL,            -- YYYY-MM-DD
    warned1      TEXT,                     -- RFC 3339 UTC or NULL
    warned2      TEXT,                     -- RFC 3339 UTC or NULL
    removed      INTEGER NOT NULL DEFAULT 0
);

-- The creator of a thing is its subscriber with creator = 1.
CREATE TABLE IF NOT EXISTS subscribers (
    user_id   INTEGER NOT NULL REFERENCES users(id)  ON DELETE CASCADE,
    thing_id  INTEGER NOT NULL REFERENCES things(id) ON DELETE CASCADE,
    creator   INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (user_id, thing_id)
);

CREATE INDEX IF NOT EXISTS things_type_idx        ON things(type);
CREATE INDEX IF NOT EXISTS things_remove_idx      ON things(remove);
CREATE INDEX IF NOT EXISTS subscribers_thing_idx  ON subscribers(thing_id);

PRAGMA user_version = 1;
";
