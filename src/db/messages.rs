//! Message records: one turn of a conversation.

use anyhow::Result;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::{params, OptionalExtension, Row, ToSql};

use super::{new_id, next_created_at, Database};

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

impl ToSql for Role {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Role {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        Role::from_str(s).ok_or(FromSqlError::InvalidType)
    }
}

/// One turn within a session, optionally carrying a local audio copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub session_id: String,
    pub role: Role,
    pub text: String,
    pub audio_path: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub session_id: String,
    pub role: Role,
    pub text: String,
    pub audio_path: Option<String>,
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        session_id: row.get(1)?,
        role: row.get(2)?,
        text: row.get(3)?,
        audio_path: row.get(4)?,
        created_at: row.get(5)?,
    })
}

pub(crate) const MESSAGE_COLUMNS: &str = "id, session_id, role, text, audio_path, created_at";

impl Database {
    /// Insert a message, returning the stored record with generated id and
    /// creation timestamp.
    pub fn add_message(&self, new: NewMessage) -> Result<Message> {
        let id = new_id("message");
        let created_at = next_created_at();
        self.conn.execute(
            r#"
            INSERT INTO messages (id, type, session_id, role, text, audio_path, created_at)
            VALUES (?, 'message', ?, ?, ?, ?, ?)
            "#,
            params![id, new.session_id, new.role, new.text, new.audio_path, created_at],
        )?;
        Ok(Message {
            id,
            session_id: new.session_id,
            role: new.role,
            text: new.text,
            audio_path: new.audio_path,
            created_at,
        })
    }

    pub fn get_message(&self, id: &str) -> Result<Option<Message>> {
        let result = self
            .conn
            .query_row(
                &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?"),
                [id],
                message_from_row,
            )
            .optional()?;
        Ok(result)
    }

    /// Conversation history, oldest first.
    pub fn messages_for_session(&self, session_id: &str) -> Result<Vec<Message>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE session_id = ? ORDER BY created_at ASC"
        ))?;
        let messages = stmt
            .query_map([session_id], message_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(messages)
    }

    /// Attach a downloaded audio copy to an existing message.
    pub fn set_message_audio_path(&self, id: &str, audio_path: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE messages SET audio_path = ? WHERE id = ?",
            params![audio_path, id],
        )?;
        Ok(())
    }
}
