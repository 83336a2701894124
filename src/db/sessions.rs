//! Session records: the conversational thread behind one artwork.

use anyhow::Result;
use rusqlite::{params, OptionalExtension, Row};

use super::messages::MESSAGE_COLUMNS;
use super::{next_created_at, Database, Message};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Server-assigned id, threaded through from the recognition response
    /// and trusted as-is.
    pub id: String,
    pub created_at: i64,
    pub artwork_id: String,
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        id: row.get(0)?,
        created_at: row.get(1)?,
        artwork_id: row.get(2)?,
    })
}

impl Database {
    /// Insert a session under its server-assigned id.
    pub fn add_session(&self, artwork_id: &str, session_id: &str) -> Result<Session> {
        let created_at = next_created_at();
        self.conn.execute(
            "INSERT INTO sessions (id, type, created_at, artwork_id) VALUES (?, 'session', ?, ?)",
            params![session_id, created_at, artwork_id],
        )?;
        Ok(Session {
            id: session_id.to_string(),
            created_at,
            artwork_id: artwork_id.to_string(),
        })
    }

    pub fn get_session(&self, id: &str) -> Result<Option<Session>> {
        let result = self
            .conn
            .query_row(
                "SELECT id, created_at, artwork_id FROM sessions WHERE id = ?",
                [id],
                session_from_row,
            )
            .optional()?;
        Ok(result)
    }

    /// Sessions belonging to one artwork, newest first.
    pub fn sessions_for_artwork(&self, artwork_id: &str) -> Result<Vec<Session>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, created_at, artwork_id FROM sessions WHERE artwork_id = ? ORDER BY created_at DESC",
        )?;
        let sessions = stmt
            .query_map([artwork_id], session_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(sessions)
    }

    pub fn delete_session(&self, id: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM sessions WHERE id = ?", [id])?;
        Ok(())
    }

    /// A session together with its full message history, oldest message first.
    pub fn session_with_messages(&self, id: &str) -> Result<Option<(Session, Vec<Message>)>> {
        let Some(session) = self.get_session(id)? else {
            return Ok(None);
        };
        let messages = self.messages_for_session(id)?;
        Ok(Some((session, messages)))
    }

    /// Replace the whole message history of a session in one transaction.
    /// Incoming messages keep their ids and timestamps.
    pub fn replace_session_messages(&self, session_id: &str, messages: &[Message]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM messages WHERE session_id = ?", [session_id])?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO messages ({MESSAGE_COLUMNS}, type) VALUES (?, ?, ?, ?, ?, ?, 'message')"
            ))?;
            for message in messages {
                stmt.execute(params![
                    message.id,
                    session_id,
                    message.role,
                    message.text,
                    message.audio_path,
                    message.created_at,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{NewMessage, Role};

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        db
    }

    #[test]
    fn test_caller_supplied_id_is_trusted() {
        let db = test_db();
        let session = db.add_session("artwork_1", "srv-issued-id").unwrap();
        assert_eq!(session.id, "srv-issued-id");

        let fetched = db.get_session("srv-issued-id").unwrap().unwrap();
        assert_eq!(fetched, session);
    }

    #[test]
    fn test_sessions_for_artwork_newest_first() {
        let db = test_db();
        db.add_session("artwork_1", "s1").unwrap();
        db.add_session("artwork_1", "s2").unwrap();
        db.add_session("artwork_2", "s3").unwrap();

        let sessions = db.sessions_for_artwork("artwork_1").unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].id, "s2");
        assert_eq!(sessions[1].id, "s1");
    }

    #[test]
    fn test_delete_session_then_get_is_none() {
        let db = test_db();
        db.add_session("artwork_1", "s1").unwrap();
        db.add_session("artwork_1", "s2").unwrap();

        db.delete_session("s1").unwrap();
        assert!(db.get_session("s1").unwrap().is_none());
        assert!(db.get_session("s2").unwrap().is_some());

        // Deleting an already-absent session is a no-op.
        db.delete_session("s1").unwrap();
    }

    #[test]
    fn test_session_with_messages() {
        let db = test_db();
        db.add_session("artwork_1", "s1").unwrap();
        db.add_message(NewMessage {
            session_id: "s1".to_string(),
            role: Role::User,
            text: "first".to_string(),
            audio_path: None,
        })
        .unwrap();
        db.add_message(NewMessage {
            session_id: "s1".to_string(),
            role: Role::Assistant,
            text: "second".to_string(),
            audio_path: None,
        })
        .unwrap();

        let (session, messages) = db.session_with_messages("s1").unwrap().unwrap();
        assert_eq!(session.id, "s1");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].text, "first");

        assert!(db.session_with_messages("missing").unwrap().is_none());
    }

    #[test]
    fn test_replace_session_messages_overwrites_history() {
        let db = test_db();
        db.add_session("artwork_1", "s1").unwrap();
        db.add_message(NewMessage {
            session_id: "s1".to_string(),
            role: Role::User,
            text: "stale".to_string(),
            audio_path: None,
        })
        .unwrap();

        let replacement = vec![
            Message {
                id: "message_a".to_string(),
                session_id: "s1".to_string(),
                role: Role::User,
                text: "edited".to_string(),
                audio_path: None,
                created_at: 100,
            },
            Message {
                id: "message_b".to_string(),
                session_id: "s1".to_string(),
                role: Role::Assistant,
                text: "reply".to_string(),
                audio_path: Some("/data/audio/r.mp3".to_string()),
                created_at: 200,
            },
        ];
        db.replace_session_messages("s1", &replacement).unwrap();

        let history = db.messages_for_session("s1").unwrap();
        assert_eq!(history, replacement);
    }
}
