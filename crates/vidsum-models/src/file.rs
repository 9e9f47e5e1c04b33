//! Uploaded file records and type classification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{FileHash, FileId};

/// Logical type of an uploaded file, derived from its extension and MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    Video,
    Audio,
    Subtitle,
}

/// Extensions admitted as video sources.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "webm", "mov", "avi", "flv", "wmv"];

/// Extensions admitted as audio sources.
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "aac", "m4a", "ogg", "wma"];

/// Extensions admitted as subtitle sources.
pub const SUBTITLE_EXTENSIONS: &[&str] = &["srt", "vtt", "ass", "ssa", "sub"];

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Video => "video",
            FileType::Audio => "audio",
            FileType::Subtitle => "subtitle",
        }
    }

    /// Classify a lowercase file extension against the allow-list.
    ///
    /// Unknown extensions return `None` and must be rejected as
    /// unsupported by the caller.
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_ascii_lowercase();
        if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(FileType::Video)
        } else if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
            Some(FileType::Audio)
        } else if SUBTITLE_EXTENSIONS.contains(&ext.as_str()) {
            Some(FileType::Subtitle)
        } else {
            None
        }
    }

    /// Classify a declared MIME type.
    ///
    /// Returns `None` for generic types (`application/octet-stream`, empty)
    /// that carry no classification signal; such declarations defer to the
    /// extension-derived type.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let mime = mime.trim().to_ascii_lowercase();
        let essence = mime.split(';').next().unwrap_or_default().trim();
        match essence {
            "" | "application/octet-stream" => None,
            "application/x-subrip" | "text/vtt" | "text/srt" | "text/plain" => {
                Some(FileType::Subtitle)
            }
            m if m.starts_with("video/") => Some(FileType::Video),
            m if m.starts_with("audio/") => Some(FileType::Audio),
            m if m.starts_with("text/") => Some(FileType::Subtitle),
            _ => None,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "video" => Some(FileType::Video),
            "audio" => Some(FileType::Audio),
            "subtitle" => Some(FileType::Subtitle),
            _ => None,
        }
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A stored upload.
///
/// `file_id` is unique per upload; `file_hash` and `stored_path` may be
/// shared between records when identical content was uploaded twice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadRecord {
    /// Opaque upload handle
    pub file_id: FileId,
    /// Sanitized original file name
    pub original_name: String,
    /// Size in bytes
    pub size: u64,
    /// Declared MIME type
    pub mime_type: String,
    /// Logical file type
    pub file_type: FileType,
    /// SHA-256 of the file content
    pub file_hash: FileHash,
    /// Absolute path of the stored content
    pub stored_path: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Expiry timestamp (TTL)
    pub expires_at: DateTime<Utc>,
}

impl UploadRecord {
    /// Whether the record has passed its TTL.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
