//! CRUD operations for chat rows, membership, and labels.

use chrono::{DateTime, Utc};
use rusqlite::params;
use uuid::Uuid;

use causerie_shared::{
    ChatId, ChatKind, ChatLabel, ChatMember, ChatRecord, ChatSummary, SenderProfile, UserId,
};

use crate::database::Database;
use crate::error::{Result, StoreError};

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new chat row.
    pub fn create_chat(&self, chat: &ChatRecord) -> Result<()> {
        self.conn().execute(
            "INSERT INTO chats (id, title, kind, last_message, last_message_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                chat.id.to_string(),
                chat.title,
                chat.kind.as_str(),
                chat.last_message,
                chat.last_message_at.map(|t| t.to_rfc3339()),
                chat.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Add a user to a chat.  Adding an existing member is a no-op.
    pub fn add_member(&self, chat_id: ChatId, user_id: UserId) -> Result<()> {
        self.conn().execute(
            "INSERT OR IGNORE INTO chat_members (chat_id, user_id) VALUES (?1, ?2)",
            params![chat_id.to_string(), user_id.to_string()],
        )?;
        Ok(())
    }

    /// Attach a label to a chat, creating the label row on first use.
    pub fn add_label(&self, chat_id: ChatId, label: &ChatLabel) -> Result<()> {
        self.conn().execute(
            "INSERT OR IGNORE INTO labels (name, color) VALUES (?1, ?2)",
            params![label.name, label.color],
        )?;

        self.conn().execute(
            "INSERT OR IGNORE INTO chat_labels (chat_id, label_id)
             SELECT ?1, id FROM labels WHERE name = ?2",
            params![chat_id.to_string(), label.name],
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single chat with its members and labels.
    pub fn get_chat(&self, id: ChatId) -> Result<ChatSummary> {
        let record = self
            .conn()
            .query_row(
                "SELECT id, title, kind, last_message, last_message_at, created_at
                 FROM chats WHERE id = ?1",
                params![id.to_string()],
                row_to_chat,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })?;

        self.hydrate_chat(record)
    }

    /// List all chats with members and labels, newest activity first
    /// (chats with no messages yet sort last).
    pub fn list_chats(&self) -> Result<Vec<ChatSummary>> {
        let records = {
            let mut stmt = self.conn().prepare(
                "SELECT id, title, kind, last_message, last_message_at, created_at
                 FROM chats
                 ORDER BY last_message_at IS NULL, last_message_at DESC",
            )?;

            let rows = stmt.query_map([], row_to_chat)?;

            let mut records = Vec::new();
            for row in rows {
                records.push(row?);
            }
            records
        };

        let mut chats = Vec::with_capacity(records.len());
        for record in records {
            chats.push(self.hydrate_chat(record)?);
        }
        Ok(chats)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Refresh the denormalized last-message preview on a chat row.
    pub fn touch_last_message(
        &self,
        chat_id: ChatId,
        preview: &str,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE chats SET last_message = ?2, last_message_at = ?3 WHERE id = ?1",
            params![chat_id.to_string(), preview, at.to_rfc3339()],
        )?;
        Ok(affected > 0)
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn hydrate_chat(&self, record: ChatRecord) -> Result<ChatSummary> {
        let members = self.chat_members(record.id)?;
        let labels = self.chat_labels(record.id)?;

        Ok(ChatSummary {
            id: record.id,
            title: record.title,
            kind: record.kind,
            last_message: record.last_message,
            last_message_at: record.last_message_at,
            labels,
            members,
            created_at: record.created_at,
        })
    }

    fn chat_members(&self, chat_id: ChatId) -> Result<Vec<ChatMember>> {
        let mut stmt = self.conn().prepare(
            "SELECT u.id, u.name, u.phone, u.avatar_url
             FROM chat_members cm
             JOIN users u ON u.id = cm.user_id
             WHERE cm.chat_id = ?1
             ORDER BY u.name ASC",
        )?;

        let rows = stmt.query_map(params![chat_id.to_string()], |row| {
            let id_str: String = row.get(0)?;
            let id = Uuid::parse_str(&id_str).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
            })?;
            Ok(ChatMember {
                user_id: UserId(id),
                profile: SenderProfile {
                    name: row.get(1)?,
                    phone: row.get(2)?,
                    avatar_url: row.get(3)?,
                },
            })
        })?;

        let mut members = Vec::new();
        for row in rows {
            members.push(row?);
        }
        Ok(members)
    }

    fn chat_labels(&self, chat_id: ChatId) -> Result<Vec<ChatLabel>> {
        let mut stmt = self.conn().prepare(
            "SELECT l.name, l.color
             FROM chat_labels cl
             JOIN labels l ON l.id = cl.label_id
             WHERE cl.chat_id = ?1
             ORDER BY l.name ASC",
        )?;

        let rows = stmt.query_map(params![chat_id.to_string()], |row| {
            Ok(ChatLabel {
                name: row.get(0)?,
                color: row.get(1)?,
            })
        })?;

        let mut labels = Vec::new();
        for row in rows {
            labels.push(row?);
        }
        Ok(labels)
    }
}

fn row_to_chat(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChatRecord> {
    let id_str: String = row.get(0)?;
    let title: String = row.get(1)?;
    let kind_str: String = row.get(2)?;
    let last_message: Option<String> = row.get(3)?;
    let last_message_str: Option<String> = row.get(4)?;
    let created_str: String = row.get(5)?;

    let id = Uuid::parse_str(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let kind = ChatKind::from_str(&kind_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            format!("unknown chat kind: {kind_str}").into(),
        )
    })?;

    let last_message_at = last_message_str
        .map(|s| DateTime::parse_from_rfc3339(&s).map(|dt| dt.with_timezone(&Utc)))
        .transpose()
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?;

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(ChatRecord {
        id: ChatId(id),
        title,
        kind,
        last_message,
        last_message_at,
        created_at,
    })
}
