//! v001 -- Initial schema creation.
//!
//! Creates the six core tables: `users`, `chats`, `chat_members`, `labels`,
//! `chat_labels`, and `messages`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id         TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    name       TEXT NOT NULL,
    phone      TEXT NOT NULL,
    avatar_url TEXT NOT NULL,
    created_at TEXT NOT NULL                -- ISO-8601 / RFC-3339
);

-- ----------------------------------------------------------------
-- Chats
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS chats (
    id              TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    title           TEXT NOT NULL,
    kind            TEXT NOT NULL,              -- 'direct' | 'group'
    last_message    TEXT,                       -- preview of the latest message
    last_message_at TEXT,                       -- ISO-8601, nullable
    created_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chats_last_message_at
    ON chats(last_message_at DESC);

-- ----------------------------------------------------------------
-- Chat membership
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS chat_members (
    chat_id TEXT NOT NULL,
    user_id TEXT NOT NULL,

    PRIMARY KEY (chat_id, user_id),
    FOREIGN KEY (chat_id) REFERENCES chats(id) ON DELETE CASCADE,
    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);

-- ----------------------------------------------------------------
-- Labels
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS labels (
    id    INTEGER PRIMARY KEY AUTOINCREMENT,
    name  TEXT NOT NULL UNIQUE,
    color TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS chat_labels (
    chat_id  TEXT NOT NULL,
    label_id INTEGER NOT NULL,

    PRIMARY KEY (chat_id, label_id),
    FOREIGN KEY (chat_id)  REFERENCES chats(id)  ON DELETE CASCADE,
    FOREIGN KEY (label_id) REFERENCES labels(id) ON DELETE CASCADE
);

-- ----------------------------------------------------------------
-- Messages
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    id         TEXT PRIMARY KEY NOT NULL,      -- UUID v4, assigned by the store
    chat_id    TEXT NOT NULL,                  -- FK -> chats(id)
    sender_id  TEXT NOT NULL,                  -- FK -> users(id)
    content    TEXT NOT NULL,
    created_at TEXT NOT NULL,                  -- ISO-8601, the ordering key
    is_read    INTEGER NOT NULL DEFAULT 0,     -- monotonic 0 -> 1

    FOREIGN KEY (chat_id)   REFERENCES chats(id)  ON DELETE CASCADE,
    FOREIGN KEY (sender_id) REFERENCES users(id)
);

CREATE INDEX IF NOT EXISTS idx_messages_chat_created
    ON messages(chat_id, created_at ASC);
"#;

/// Apply the migration.
pub fn up(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(UP_SQL)
}
