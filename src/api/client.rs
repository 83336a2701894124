//! HTTP client for the remote recognition service.
//!
//! Three endpoints: `/api/recognize` takes the captured image as multipart
//! form data plus language and audience hints, `/api/followup` continues a
//! conversation, and `/api/audio_url` reports whether server-side speech
//! synthesis for a session has finished (polled).

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::config::ApiConfig;

/// Failure classes when talking to the recognition service.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("server returned {status} for {url}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },
    #[error("malformed response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Recognition result for one uploaded image.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ArtworkInfo {
    pub title: String,
    pub artist: String,
    pub museum_name: String,
    pub description: String,
    #[serde(default)]
    pub audio_url: Option<String>,
    pub session_id: String,
}

/// One prior turn sent back to the server as conversation context.
#[derive(Debug, Clone, Serialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FollowupRequest {
    pub user_input: String,
    pub artwork_name: String,
    pub artwork_artist: String,
    pub artwork_museum: String,
    pub message_history: Vec<ChatTurn>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FollowupReply {
    pub reply: String,
    #[serde(default)]
    pub audio_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AudioStatusResponse {
    #[serde(default)]
    audio_url: Option<String>,
}

/// Seam between the service/poller layer and the network. The production
/// implementation is [`ApiClient`]; tests substitute their own.
pub trait RecognitionApi: Send + Sync {
    /// Upload an image and get the recognition result.
    fn recognize(&self, image: &Path) -> Result<ArtworkInfo>;

    /// Ask a follow-up question within a recognized artwork's context.
    fn followup(&self, request: &FollowupRequest) -> Result<FollowupReply>;

    /// Check whether synthesized audio is ready for a session. `None`
    /// means not ready yet.
    fn audio_status(&self, session_id: &str) -> Result<Option<String>>;

    /// Download an audio URL to bytes.
    fn fetch_audio(&self, url: &str) -> Result<Vec<u8>>;
}

pub struct ApiClient {
    base_url: String,
    language: String,
    role: String,
    http: reqwest::blocking::Client,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            base_url: config.endpoint.trim_end_matches('/').to_string(),
            language: config.language.clone(),
            role: config.role.clone(),
            http,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn decode<T: serde::de::DeserializeOwned>(
        url: &str,
        response: reqwest::blocking::Response,
    ) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ApiError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            }
            .into());
        }
        response.json().map_err(|e| {
            ApiError::Decode {
                url: url.to_string(),
                source: e,
            }
            .into()
        })
    }
}

impl RecognitionApi for ApiClient {
    fn recognize(&self, image: &Path) -> Result<ArtworkInfo> {
        let url = self.url("/api/recognize");

        let filename = image
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "capture.jpg".to_string());
        let bytes = std::fs::read(image)?;
        let part = reqwest::blocking::multipart::Part::bytes(bytes)
            .file_name(filename)
            .mime_str("image/jpeg")?;
        let form = reqwest::blocking::multipart::Form::new()
            .part("file", part)
            .text("language", self.language.clone())
            .text("role", self.role.clone());

        let response = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .map_err(|e| ApiError::Http {
                url: url.clone(),
                source: e,
            })?;
        Self::decode(&url, response)
    }

    fn followup(&self, request: &FollowupRequest) -> Result<FollowupReply> {
        let url = self.url("/api/followup");
        let response = self
            .http
            .post(&url)
            .json(request)
            .send()
            .map_err(|e| ApiError::Http {
                url: url.clone(),
                source: e,
            })?;
        Self::decode(&url, response)
    }

    fn audio_status(&self, session_id: &str) -> Result<Option<String>> {
        let url = self.url("/api/audio_url");
        let response = self
            .http
            .get(&url)
            .query(&[("session_id", session_id)])
            .send()
            .map_err(|e| ApiError::Http {
                url: url.clone(),
                source: e,
            })?;
        let status: AudioStatusResponse = Self::decode(&url, response)?;
        // The server answers with an empty field until synthesis completes.
        Ok(status.audio_url.filter(|u| !u.is_empty()))
    }

    fn fetch_audio(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.http.get(url).send().map_err(|e| ApiError::Http {
            url: url.to_string(),
            source: e,
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body: String::new(),
            }
            .into());
        }
        let bytes = response.bytes().map_err(|e| ApiError::Decode {
            url: url.to_string(),
            source: e,
        })?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recognize_response_decodes_without_audio() {
        let info: ArtworkInfo = serde_json::from_str(
            r#"{
                "title": "The Night Watch",
                "artist": "Rembrandt",
                "museum_name": "Rijksmuseum",
                "description": "A militia company moves out.",
                "session_id": "3f2a"
            }"#,
        )
        .unwrap();
        assert_eq!(info.title, "The Night Watch");
        assert!(info.audio_url.is_none());
    }

    #[test]
    fn test_audio_status_field_is_optional() {
        let empty: AudioStatusResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.audio_url.is_none());

        let ready: AudioStatusResponse =
            serde_json::from_str(r#"{"audio_url": "https://cdn.example/a.mp3"}"#).unwrap();
        assert_eq!(ready.audio_url.as_deref(), Some("https://cdn.example/a.mp3"));
    }

    #[test]
    fn test_followup_request_wire_shape() {
        let request = FollowupRequest {
            user_input: "when was it painted?".to_string(),
            artwork_name: "The Night Watch".to_string(),
            artwork_artist: "Rembrandt".to_string(),
            artwork_museum: "Rijksmuseum".to_string(),
            message_history: vec![ChatTurn {
                role: "assistant".to_string(),
                content: "A militia company moves out.".to_string(),
            }],
        };
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&request).unwrap()).unwrap();
        assert_eq!(json["user_input"], "when was it painted?");
        assert_eq!(json["message_history"][0]["role"], "assistant");
    }
}
