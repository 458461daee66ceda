//! SQL schema for the POC SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Allow-list of valid keys. Populated by deployment, read by the engine.
CREATE TABLE IF NOT EXISTS project_phases (
    company TEXT NOT NULL,
    project TEXT NOT NULL,
    phase   TEXT NOT NULL DEFAULT '',
    PRIMARY KEY (company, project, phase)
);

-- POC values. Rows are soft-deleted (active = 0) and never removed.
CREATE TABLE IF NOT EXISTS poc_records (
    record_id       TEXT PRIMARY KEY,
    company         TEXT NOT NULL,
    project         TEXT NOT NULL,
    phase           TEXT NOT NULL DEFAULT '',
    year            INTEGER NOT NULL,
    month           INTEGER NOT NULL CHECK (month BETWEEN 1 AND 12),
    value           REAL NOT NULL CHECK (value >= 0 AND value <= 100),
    recognition     TEXT NOT NULL,   -- 'actual' | 'projected'
    active          INTEGER NOT NULL DEFAULT 1 CHECK (active IN (0, 1)),
    created_at      TEXT NOT NULL,
    created_by      TEXT NOT NULL,
    updated_at      TEXT NOT NULL,
    updated_by      TEXT NOT NULL,
    deleted_at      TEXT,
    deleted_by      TEXT,
    deletion_reason TEXT
);

-- At most one active row per natural key.
CREATE UNIQUE INDEX IF NOT EXISTS poc_records_active_idx
    ON poc_records(company, project, phase, year, month)
    WHERE active = 1;

CREATE TRIGGER IF NOT EXISTS poc_records_no_reactivate
    BEFORE UPDATE OF active ON poc_records
    WHEN OLD.active = 0 AND NEW.active = 1
BEGIN
    SELECT RAISE(ABORT, 'deactivated POC records cannot be reactivated');
END;

CREATE TRIGGER IF NOT EXISTS poc_records_no_delete
    BEFORE DELETE ON poc_records
BEGIN
    SELECT RAISE(ABORT, 'POC records are soft-deleted only');
END;

-- Completion dates are strictly append-only.
CREATE TABLE IF NOT EXISTS completion_dates (
    record_id       TEXT PRIMARY KEY,
    company         TEXT NOT NULL,
    project         TEXT NOT NULL,
    phase           TEXT NOT NULL DEFAULT '',
    completion_type TEXT NOT NULL,   -- 'actual' | 'projected'
    completion_date TEXT NOT NULL,   -- YYYY-MM-DD
    created_at      TEXT NOT NULL,   -- RFC 3339 UTC, fixed width
    created_by      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS completion_dates_key_idx
    ON completion_dates(company, project, phase, created_at);

CREATE TRIGGER IF NOT EXISTS completion_dates_no_update
    BEFORE UPDATE ON completion_dates
BEGIN
    SELECT RAISE(ABORT, 'completion_dates is append-only');
END;

CREATE TRIGGER IF NOT EXISTS completion_dates_no_delete
    BEFORE DELETE ON completion_dates
BEGIN
    SELECT RAISE(ABORT, 'completion_dates is append-only');
END;

CREATE TABLE IF NOT EXISTS pending_redistributions (
    redistribution_id   TEXT PRIMARY KEY,
    company             TEXT NOT NULL,
    project             TEXT NOT NULL,
    phase               TEXT NOT NULL DEFAULT '',
    orphaned_total      REAL NOT NULL,
    new_completion_date TEXT NOT NULL,
    old_completion_date TEXT NOT NULL,
    created_at          TEXT NOT NULL,
    created_by          TEXT NOT NULL,
    status              TEXT NOT NULL DEFAULT 'pending_manual_entry',
    resolved_at         TEXT,
    resolved_by         TEXT
);

CREATE INDEX IF NOT EXISTS pending_redistributions_key_idx
    ON pending_redistributions(company, project, phase, status);

PRAGMA user_version = 1;
";
