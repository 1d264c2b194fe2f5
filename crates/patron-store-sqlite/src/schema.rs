//! SQL schema for the Patron SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Aggregate columns are rewritten only by the donation recorder.
CREATE TABLE IF NOT EXISTS donors (
    donor_id        TEXT PRIMARY KEY,
    organization_id TEXT NOT NULL,
    first_name      TEXT NOT NULL,
    last_name       TEXT NOT NULL,
    email           TEXT,
    phone           TEXT,
    address         TEXT,
    city            TEXT,
    state           TEXT,
    zip_code        TEXT,
    status          TEXT NOT NULL DEFAULT 'active',
    total_gifts     INTEGER NOT NULL DEFAULT 0,
    total_amount    TEXT NOT NULL DEFAULT '0',   -- exact decimal string
    first_gift_date TEXT,
    last_gift_date  TEXT,
    retention_risk  TEXT NOT NULL DEFAULT 'unknown',
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

-- Donations are strictly append-only.
-- No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS donations (
    donation_id     TEXT PRIMARY KEY,
    donor_id        TEXT NOT NULL REFERENCES donors(donor_id),
    campaign_id     TEXT,
    amount          TEXT NOT NULL,              -- exact decimal string
    date            TEXT NOT NULL,              -- RFC 3339 UTC, microseconds
    donation_type   TEXT NOT NULL DEFAULT 'one_time',
    method          TEXT,
    notes           TEXT,
    idempotency_key TEXT,
    created_at      TEXT NOT NULL,
    UNIQUE (donor_id, idempotency_key)
);

CREATE INDEX IF NOT EXISTS donors_org_idx      ON donors(organization_id);
CREATE INDEX IF NOT EXISTS donations_donor_idx ON donations(donor_id);
CREATE INDEX IF NOT EXISTS donations_date_idx  ON donations(date);

PRAGMA user_version = 1;
";
