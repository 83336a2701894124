//! Artwork records and their accessors.

use anyhow::Result;
use rusqlite::{params, OptionalExtension, Row};

use super::{new_id, next_created_at, Database};

/// One recognized piece of art and its recognition result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artwork {
    pub id: String,
    pub museum_name: String,
    pub title: String,
    pub artist: String,
    pub image_uri: Option<String>,
    pub description: Option<String>,
    pub created_at: i64,
    /// Server-assigned conversation id, also the key of the session row.
    pub session_id: String,
    pub audio_url: Option<String>,
    pub liked: bool,
}

/// Fields the caller supplies; id and created_at are generated on insert.
#[derive(Debug, Clone, Default)]
pub struct NewArtwork {
    pub museum_name: String,
    pub title: String,
    pub artist: String,
    pub image_uri: Option<String>,
    pub description: Option<String>,
    pub session_id: String,
    pub audio_url: Option<String>,
}

/// Media files that belonged to a deleted artwork. The row deletes are
/// transactional; removing these files is the caller's follow-up step.
#[derive(Debug, Clone, Default)]
pub struct DeletedMedia {
    pub image_uri: Option<String>,
    /// The artwork row's audio reference. A local path once the poller has
    /// backfilled it, a remote URL if synthesis finished server-side only.
    pub audio_url: Option<String>,
    pub audio_paths: Vec<String>,
}

fn artwork_from_row(row: &Row<'_>) -> rusqlite::Result<Artwork> {
    Ok(Artwork {
        id: row.get(0)?,
        museum_name: row.get(1)?,
        title: row.get(2)?,
        artist: row.get(3)?,
        image_uri: row.get(4)?,
        description: row.get(5)?,
        created_at: row.get(6)?,
        session_id: row.get(7)?,
        audio_url: row.get(8)?,
        liked: row.get(9)?,
    })
}

const ARTWORK_COLUMNS: &str =
    "id, museum_name, title, artist, image_uri, description, created_at, session_id, audio_url, liked";

impl Database {
    /// Insert an artwork, returning the stored record with generated id
    /// and creation timestamp.
    pub fn add_artwork(&self, new: NewArtwork) -> Result<Artwork> {
        let id = new_id("artwork");
        let created_at = next_created_at();
        self.conn.execute(
            r#"
            INSERT INTO artworks (id, type, museum_name, title, artist, image_uri, description, created_at, session_id, audio_url, liked)
            VALUES (?, 'artwork', ?, ?, ?, ?, ?, ?, ?, ?, 0)
            "#,
            params![
                id,
                new.museum_name,
                new.title,
                new.artist,
                new.image_uri,
                new.description,
                created_at,
                new.session_id,
                new.audio_url,
            ],
        )?;
        Ok(Artwork {
            id,
            museum_name: new.museum_name,
            title: new.title,
            artist: new.artist,
            image_uri: new.image_uri,
            description: new.description,
            created_at,
            session_id: new.session_id,
            audio_url: new.audio_url,
            liked: false,
        })
    }

    /// Look up a single artwork. Not-found is an absent result, not an error.
    pub fn get_artwork(&self, id: &str) -> Result<Option<Artwork>> {
        let result = self
            .conn
            .query_row(
                &format!("SELECT {ARTWORK_COLUMNS} FROM artworks WHERE id = ?"),
                [id],
                artwork_from_row,
            )
            .optional()?;
        Ok(result)
    }

    /// All artworks, newest first.
    pub fn all_artworks(&self) -> Result<Vec<Artwork>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ARTWORK_COLUMNS} FROM artworks ORDER BY created_at DESC"
        ))?;
        let artworks = stmt
            .query_map([], artwork_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(artworks)
    }

    /// Artworks recognized at one museum, newest first.
    pub fn artworks_by_museum(&self, museum_name: &str) -> Result<Vec<Artwork>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ARTWORK_COLUMNS} FROM artworks WHERE museum_name = ? ORDER BY created_at DESC"
        ))?;
        let artworks = stmt
            .query_map([museum_name], artwork_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(artworks)
    }

    /// Full-row overwrite by id. Last writer wins; id and created_at are
    /// never rewritten.
    pub fn update_artwork(&self, artwork: &Artwork) -> Result<()> {
        self.conn.execute(
            r#"
            UPDATE artworks
            SET museum_name = ?, title = ?, artist = ?, image_uri = ?, description = ?, session_id = ?, audio_url = ?, liked = ?
            WHERE id = ?
            "#,
            params![
                artwork.museum_name,
                artwork.title,
                artwork.artist,
                artwork.image_uri,
                artwork.description,
                artwork.session_id,
                artwork.audio_url,
                artwork.liked,
                artwork.id,
            ],
        )?;
        Ok(())
    }

    pub fn set_artwork_liked(&self, id: &str, liked: bool) -> Result<()> {
        self.conn.execute(
            "UPDATE artworks SET liked = ? WHERE id = ?",
            params![liked, id],
        )?;
        Ok(())
    }

    /// Backfill the audio reference once synthesis has completed.
    pub fn set_artwork_audio_url(&self, id: &str, audio_url: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE artworks SET audio_url = ? WHERE id = ?",
            params![audio_url, id],
        )?;
        Ok(())
    }

    /// Delete an artwork together with its session and all messages of
    /// that session, in a single transaction. Returns the media files the
    /// rows referenced so the caller can remove the local copies.
    pub fn delete_artwork(&self, id: &str) -> Result<DeletedMedia> {
        let tx = self.conn.unchecked_transaction()?;

        let artwork = tx
            .query_row(
                &format!("SELECT {ARTWORK_COLUMNS} FROM artworks WHERE id = ?"),
                [id],
                artwork_from_row,
            )
            .optional()?;
        let Some(artwork) = artwork else {
            anyhow::bail!("artwork not found: {id}");
        };

        let mut stmt = tx.prepare(
            "SELECT audio_path FROM messages
             WHERE audio_path IS NOT NULL
               AND session_id IN (SELECT id FROM sessions WHERE artwork_id = ?)",
        )?;
        let audio_paths = stmt
            .query_map([id], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        drop(stmt);

        tx.execute(
            "DELETE FROM messages WHERE session_id IN (SELECT id FROM sessions WHERE artwork_id = ?)",
            [id],
        )?;
        tx.execute("DELETE FROM sessions WHERE artwork_id = ?", [id])?;
        tx.execute("DELETE FROM artworks WHERE id = ?", [id])?;
        tx.commit()?;

        Ok(DeletedMedia {
            image_uri: artwork.image_uri,
            audio_url: artwork.audio_url,
            audio_paths,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{NewMessage, Role};
    use chrono::Utc;

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        db
    }

    fn sample(title: &str, session_id: &str) -> NewArtwork {
        NewArtwork {
            museum_name: "Rijksmuseum".to_string(),
            title: title.to_string(),
            artist: "Vermeer".to_string(),
            image_uri: Some("/data/images/a.jpg".to_string()),
            description: Some("A quiet interior scene.".to_string()),
            session_id: session_id.to_string(),
            audio_url: None,
        }
    }

    #[test]
    fn test_add_then_get_returns_equal_record() {
        let db = test_db();
        let before = Utc::now().timestamp_millis();

        let added = db.add_artwork(sample("The Milkmaid", "sess_1")).unwrap();
        assert!(!added.id.is_empty());
        assert!(added.created_at >= before);

        let fetched = db.get_artwork(&added.id).unwrap().unwrap();
        assert_eq!(fetched, added);
    }

    #[test]
    fn test_get_missing_is_none() {
        let db = test_db();
        assert!(db.get_artwork("artwork_nope").unwrap().is_none());
    }

    #[test]
    fn test_all_artworks_ordered_by_recency() {
        let db = test_db();
        for i in 0..5 {
            db.add_artwork(sample(&format!("piece {i}"), &format!("sess_{i}")))
                .unwrap();
        }

        let all = db.all_artworks().unwrap();
        assert_eq!(all.len(), 5);
        for pair in all.windows(2) {
            assert!(pair[0].created_at >= pair[1].created_at);
        }
        assert_eq!(all[0].title, "piece 4");
    }

    #[test]
    fn test_artworks_by_museum_filters() {
        let db = test_db();
        db.add_artwork(sample("a", "s1")).unwrap();
        let mut other = sample("b", "s2");
        other.museum_name = "Louvre".to_string();
        db.add_artwork(other).unwrap();

        let rijks = db.artworks_by_museum("Rijksmuseum").unwrap();
        assert_eq!(rijks.len(), 1);
        assert_eq!(rijks[0].title, "a");
    }

    #[test]
    fn test_update_overwrites_full_row() {
        let db = test_db();
        let mut artwork = db.add_artwork(sample("draft", "sess_1")).unwrap();
        artwork.title = "final".to_string();
        artwork.audio_url = Some("https://cdn.example/audio.mp3".to_string());
        artwork.liked = true;
        db.update_artwork(&artwork).unwrap();

        let fetched = db.get_artwork(&artwork.id).unwrap().unwrap();
        assert_eq!(fetched, artwork);
    }

    #[test]
    fn test_liked_flag_toggle() {
        let db = test_db();
        let artwork = db.add_artwork(sample("a", "sess_1")).unwrap();
        assert!(!artwork.liked);

        db.set_artwork_liked(&artwork.id, true).unwrap();
        assert!(db.get_artwork(&artwork.id).unwrap().unwrap().liked);

        db.set_artwork_liked(&artwork.id, false).unwrap();
        assert!(!db.get_artwork(&artwork.id).unwrap().unwrap().liked);
    }

    #[test]
    fn test_delete_cascades_sessions_and_messages() {
        let db = test_db();
        let artwork = db.add_artwork(sample("a", "sess_1")).unwrap();
        db.add_session(&artwork.id, "sess_1").unwrap();
        db.set_artwork_audio_url(&artwork.id, "/data/audio/description.mp3")
            .unwrap();
        db.add_message(NewMessage {
            session_id: "sess_1".to_string(),
            role: Role::User,
            text: "who painted this?".to_string(),
            audio_path: None,
        })
        .unwrap();
        db.add_message(NewMessage {
            session_id: "sess_1".to_string(),
            role: Role::Assistant,
            text: "Vermeer.".to_string(),
            audio_path: Some("/data/audio/reply.mp3".to_string()),
        })
        .unwrap();

        let media = db.delete_artwork(&artwork.id).unwrap();
        assert_eq!(media.image_uri.as_deref(), Some("/data/images/a.jpg"));
        assert_eq!(media.audio_url.as_deref(), Some("/data/audio/description.mp3"));
        assert_eq!(media.audio_paths, vec!["/data/audio/reply.mp3".to_string()]);

        assert!(db.get_artwork(&artwork.id).unwrap().is_none());
        assert!(db.get_session("sess_1").unwrap().is_none());
        assert!(db.messages_for_session("sess_1").unwrap().is_empty());
    }

    #[test]
    fn test_delete_missing_artwork_is_an_error() {
        let db = test_db();
        assert!(db.delete_artwork("artwork_nope").is_err());
    }
}
