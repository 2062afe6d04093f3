//! CRUD operations for user directory rows.

use chrono::{DateTime, Utc};
use rusqlite::params;
use uuid::Uuid;

use causerie_shared::{SenderProfile, UserId, UserRecord};

use crate::database::Database;
use crate::error::{Result, StoreError};

impl Database {
    /// Insert a user, or refresh the profile fields if the id is already
    /// known.
    pub fn upsert_user(&self, user: &UserRecord) -> Result<()> {
        self.conn().execute(
            "INSERT INTO users (id, name, phone, avatar_url, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 phone = excluded.phone,
                 avatar_url = excluded.avatar_url",
            params![
                user.id.to_string(),
                user.profile.name,
                user.profile.phone,
                user.profile.avatar_url,
                user.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Fetch a single user by id.
    pub fn get_user(&self, id: UserId) -> Result<UserRecord> {
        self.conn()
            .query_row(
                "SELECT id, name, phone, avatar_url, created_at
                 FROM users WHERE id = ?1",
                params![id.to_string()],
                row_to_user,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRecord> {
    let id_str: String = row.get(0)?;
    let name: String = row.get(1)?;
    let phone: String = row.get(2)?;
    let avatar_url: String = row.get(3)?;
    let created_str: String = row.get(4)?;

    let id = Uuid::parse_str(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(UserRecord {
        id: UserId(id),
        profile: SenderProfile {
            name,
            phone,
            avatar_url,
        },
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_refreshes_profile_fields() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("test.db")).unwrap();

        let mut user = UserRecord {
            id: UserId::new(),
            profile: SenderProfile {
                name: "Colette".to_string(),
                phone: "+33 6 11 22 33 44".to_string(),
                avatar_url: "https://avatars.test/colette.png".to_string(),
            },
            created_at: Utc::now(),
        };

        db.upsert_user(&user).unwrap();

        user.profile.name = "Colette D.".to_string();
        db.upsert_user(&user).unwrap();

        let loaded = db.get_user(user.id).unwrap();
        assert_eq!(loaded.profile.name, "Colette D.");
    }

    #[test]
    fn get_missing_user_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("test.db")).unwrap();

        assert!(matches!(db.get_user(UserId::new()), Err(StoreError::NotFound)));
    }
}
