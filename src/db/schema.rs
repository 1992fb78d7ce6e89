//! SQL DDL for initializing the relay storage.
//! SQLite-first design; can be adapted for other RDBMS.

/// SQLite schema with:
/// - `connected_accounts`: one row per (user_id, platform), enforced by UNIQUE
/// - `reviews`: ingested and manual reviews; the unique index on
///   (platform, platform_review_id) is the dedup key used by insert-if-absent.
///   Manual entries carry a NULL platform_review_id and are not constrained.
/// - `connect_tokens`: short-lived single-use tokens that start the browser
///   OAuth connect flow for one user
/// - timestamps stored as RFC3339 TEXT, booleans as INTEGER 0/1
pub const SQLITE_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS connected_accounts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    platform TEXT NOT NULL,
    access_token TEXT NOT NULL,
    refresh_token TEXT NULL,
    expires_at TEXT NULL, -- RFC3339, NULL means the token never expires
    is_active INTEGER NOT NULL DEFAULT 1,
    account_email TEXT NULL,
    location_id TEXT NULL, -- accounts/{a}/locations/{l}
    location_name TEXT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (user_id, platform)
);

CREATE TABLE IF NOT EXISTS reviews (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    platform TEXT NOT NULL,
    platform_review_id TEXT NULL,
    reviewer_name TEXT NOT NULL,
    reviewer_avatar TEXT NULL,
    rating INTEGER NOT NULL,
    body TEXT NOT NULL DEFAULT '',
    reviewed_at TEXT NOT NULL,
    ingested_at TEXT NOT NULL,
    blurb TEXT NULL,
    sentiment TEXT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_reviews_platform_review
    ON reviews(platform, platform_review_id);

CREATE INDEX IF NOT EXISTS idx_reviews_user_reviewed_at
    ON reviews(user_id, reviewed_at);

CREATE TABLE IF NOT EXISTS connect_tokens (
    token TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    expires_at TEXT NOT NULL
);
"#;
