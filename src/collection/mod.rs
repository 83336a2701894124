//! Collection service: the orchestration behind the capture, chat and
//! delete flows.
//!
//! Ties the recognition API, the database and the media store together so
//! callers work with whole flows instead of individual rows and files.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use crate::api::{ChatTurn, FollowupRequest, RecognitionApi};
use crate::audio::{poll_audio, AudioPollHandle, AudioPollOptions, PollOutcome};
use crate::db::{Artwork, Database, Message, NewArtwork, NewMessage, Role};
use crate::storage::MediaStore;

fn is_remote(reference: &str) -> bool {
    reference.starts_with("http://") || reference.starts_with("https://")
}

pub struct CollectionService {
    db: Database,
    api: Arc<dyn RecognitionApi>,
    store: MediaStore,
}

impl CollectionService {
    pub fn new(db: Database, api: Arc<dyn RecognitionApi>, store: MediaStore) -> Self {
        Self { db, api, store }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Recognize a captured image and store the result: a private image
    /// copy, an artwork row and its session row.
    ///
    /// Recognition runs first; a failed upload leaves no local state
    /// behind, so the caller can simply retry.
    pub fn add_from_capture(&self, capture: &Path) -> Result<Artwork> {
        let info = self
            .api
            .recognize(capture)
            .context("artwork recognition failed")?;

        let image_uri = self.store.save_image(capture)?;
        let artwork = self.db.add_artwork(NewArtwork {
            museum_name: info.museum_name,
            title: info.title,
            artist: info.artist,
            image_uri: Some(image_uri.to_string_lossy().to_string()),
            description: Some(info.description),
            session_id: info.session_id.clone(),
            audio_url: info.audio_url,
        })?;
        self.db.add_session(&artwork.id, &info.session_id)?;

        tracing::info!(artwork_id = %artwork.id, title = %artwork.title, "artwork added");
        Ok(artwork)
    }

    /// Ask a follow-up question about an artwork. The user turn and the
    /// assistant reply are persisted only after the server answered, so a
    /// failed request leaves the history untouched and retryable.
    pub fn ask(&self, artwork_id: &str, question: &str) -> Result<Message> {
        let artwork = self
            .db
            .get_artwork(artwork_id)?
            .with_context(|| format!("artwork not found: {artwork_id}"))?;

        let history = self.db.messages_for_session(&artwork.session_id)?;
        let request = FollowupRequest {
            user_input: question.to_string(),
            artwork_name: artwork.title.clone(),
            artwork_artist: artwork.artist.clone(),
            artwork_museum: artwork.museum_name.clone(),
            message_history: history
                .iter()
                .map(|m| ChatTurn {
                    role: m.role.as_str().to_string(),
                    content: m.text.clone(),
                })
                .collect(),
        };
        let reply = self.api.followup(&request)?;

        // An audio copy is nice to have; a failed download only loses that.
        let audio_path = match reply.audio_url.as_deref() {
            Some(url) => match self
                .api
                .fetch_audio(url)
                .and_then(|bytes| self.store.save_audio(&bytes))
            {
                Ok(path) => Some(path.to_string_lossy().to_string()),
                Err(e) => {
                    tracing::warn!(artwork_id = %artwork_id, error = %e, "reply audio download failed");
                    None
                }
            },
            None => None,
        };

        self.db.add_message(NewMessage {
            session_id: artwork.session_id.clone(),
            role: Role::User,
            text: question.to_string(),
            audio_path: None,
        })?;
        let assistant = self.db.add_message(NewMessage {
            session_id: artwork.session_id,
            role: Role::Assistant,
            text: reply.reply,
            audio_path,
        })?;
        Ok(assistant)
    }

    /// Delete an artwork: its session and messages go in one transaction,
    /// then the stored media copies are removed. A file that fails to
    /// delete is logged, not fatal - the rows are already gone.
    pub fn delete(&self, artwork_id: &str) -> Result<()> {
        let media = self.db.delete_artwork(artwork_id)?;

        if let Some(uri) = &media.image_uri {
            if let Err(e) = self.store.remove(Path::new(uri)) {
                tracing::warn!(artwork_id = %artwork_id, error = %e, "image cleanup failed");
            }
        }
        // The description audio reference is a local path once the poller
        // has backfilled it; a still-remote URL has no copy to remove.
        if let Some(local) = media.audio_url.as_deref().filter(|u| !is_remote(u)) {
            if let Err(e) = self.store.remove(Path::new(local)) {
                tracing::warn!(artwork_id = %artwork_id, error = %e, "description audio cleanup failed");
            }
        }
        for path in &media.audio_paths {
            if let Err(e) = self.store.remove(Path::new(path)) {
                tracing::warn!(artwork_id = %artwork_id, error = %e, "audio cleanup failed");
            }
        }

        tracing::info!(artwork_id = %artwork_id, "artwork deleted");
        Ok(())
    }

    /// Flip the liked flag, returning the new value.
    pub fn toggle_liked(&self, artwork_id: &str) -> Result<bool> {
        let artwork = self
            .db
            .get_artwork(artwork_id)?
            .with_context(|| format!("artwork not found: {artwork_id}"))?;
        let liked = !artwork.liked;
        self.db.set_artwork_liked(artwork_id, liked)?;
        Ok(liked)
    }

    /// All artworks, newest first (the home grid).
    pub fn artworks(&self) -> Result<Vec<Artwork>> {
        self.db.all_artworks()
    }

    pub fn artworks_by_museum(&self, museum_name: &str) -> Result<Vec<Artwork>> {
        self.db.artworks_by_museum(museum_name)
    }

    pub fn artwork(&self, artwork_id: &str) -> Result<Option<Artwork>> {
        self.db.get_artwork(artwork_id)
    }

    /// Chat history for an artwork, oldest first (the detail view).
    pub fn history(&self, artwork_id: &str) -> Result<Vec<Message>> {
        let artwork = self
            .db
            .get_artwork(artwork_id)?
            .with_context(|| format!("artwork not found: {artwork_id}"))?;
        self.db.messages_for_session(&artwork.session_id)
    }

    /// Start polling for the artwork's description audio. The caller owns
    /// the handle and must cancel it when its context goes away; persist
    /// a success with [`CollectionService::record_audio`].
    pub fn start_audio_poll(
        &self,
        artwork_id: &str,
        options: AudioPollOptions,
    ) -> Result<AudioPollHandle> {
        let artwork = self
            .db
            .get_artwork(artwork_id)?
            .with_context(|| format!("artwork not found: {artwork_id}"))?;
        Ok(poll_audio(
            self.api.clone(),
            self.store.clone(),
            artwork.session_id,
            options,
        ))
    }

    /// Write the downloaded audio reference back onto the artwork row.
    pub fn record_audio(&self, artwork_id: &str, local_path: &Path) -> Result<()> {
        self.db
            .set_artwork_audio_url(artwork_id, &local_path.to_string_lossy())
    }

    /// Poll until the artwork's audio is ready or the timeout passes,
    /// persisting the local copy on success. Blocking; used by callers
    /// without their own update loop.
    pub fn wait_for_audio(
        &self,
        artwork_id: &str,
        options: AudioPollOptions,
    ) -> Result<PollOutcome> {
        let handle = self.start_audio_poll(artwork_id, options)?;
        let outcome = handle.wait();
        if let PollOutcome::Succeeded(path) = &outcome {
            self.record_audio(artwork_id, path)?;
        }
        Ok(outcome)
    }
}
