//! CRUD operations for message rows.

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter};
use uuid::Uuid;

use causerie_shared::{ChatId, Message, MessageId, MessageRecord, SenderProfile, UserId};

use crate::database::Database;
use crate::error::{Result, StoreError};

impl Database {
    /// Insert a message row.  The id must already be assigned.
    pub fn insert_message(&self, record: &MessageRecord) -> Result<()> {
        self.conn().execute(
            "INSERT INTO messages (id, chat_id, sender_id, content, created_at, is_read)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.id.to_string(),
                record.chat_id.to_string(),
                record.sender_id.to_string(),
                record.content,
                record.created_at.to_rfc3339(),
                record.is_read,
            ],
        )?;
        Ok(())
    }

    /// Full ordered read of a chat's messages, ascending by creation
    /// timestamp (ties broken by id), each joined with its sender's
    /// profile row.
    pub fn messages_for_chat(&self, chat_id: ChatId) -> Result<Vec<Message>> {
        let mut stmt = self.conn().prepare(
            "SELECT m.id, m.chat_id, m.sender_id, m.content, m.created_at, m.is_read,
                    u.name, u.phone, u.avatar_url
             FROM messages m
             JOIN users u ON u.id = m.sender_id
             WHERE m.chat_id = ?1
             ORDER BY m.created_at ASC, m.id ASC",
        )?;

        let rows = stmt.query_map(params![chat_id.to_string()], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    /// Fetch a single message row by id.
    pub fn get_message(&self, id: MessageId) -> Result<MessageRecord> {
        self.conn()
            .query_row(
                "SELECT id, chat_id, sender_id, content, created_at, is_read
                 FROM messages WHERE id = ?1",
                params![id.to_string()],
                row_to_record,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// Flip the read flag on every listed message in one statement.
    /// Returns the number of rows affected.
    pub fn mark_read(&self, ids: &[MessageId]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!("UPDATE messages SET is_read = 1 WHERE id IN ({placeholders})");

        let affected = self
            .conn()
            .execute(&sql, params_from_iter(ids.iter().map(|id| id.to_string())))?;
        Ok(affected)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRecord> {
    let id_str: String = row.get(0)?;
    let chat_id_str: String = row.get(1)?;
    let sender_id_str: String = row.get(2)?;
    let content: String = row.get(3)?;
    let created_str: String = row.get(4)?;
    let is_read: bool = row.get(5)?;

    let id = Uuid::parse_str(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let chat_id = Uuid::parse_str(&chat_id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let sender_id = Uuid::parse_str(&sender_id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(MessageRecord {
        id: MessageId(id),
        chat_id: ChatId(chat_id),
        sender_id: UserId(sender_id),
        content,
        created_at,
        is_read,
    })
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let record = row_to_record(row)?;

    let name: String = row.get(6)?;
    let phone: String = row.get(7)?;
    let avatar_url: String = row.get(8)?;

    Ok(Message::from_record(
        record,
        SenderProfile {
            name,
            phone,
            avatar_url,
        },
    ))
}
