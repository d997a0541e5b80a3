//! Audio capture and file attachments.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use notes_core::{Attachment, AttachmentKind};
use thiserror::Error;
use tokio::time::Instant;

/// Media error.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Could not access microphone. Please check permissions.")]
    PermissionDenied,
    #[error("No audio input available")]
    Unavailable,
    #[error("No recording in progress")]
    NotRecording,
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// A finished audio recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedAudio {
    pub bytes: Vec<u8>,
    pub mime: String,
}

impl RecordedAudio {
    #[must_use]
    pub fn new(bytes: Vec<u8>, mime: impl Into<String>) -> Self {
        Self {
            bytes,
            mime: mime.into(),
        }
    }

    /// Uploads are always labelled WAV, whatever the capture format.
    #[must_use]
    pub fn to_attachment(&self) -> Attachment {
        Attachment::from_bytes(AttachmentKind::Audio, "recording.wav", &self.bytes)
    }
}

/// A file picked for attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePayload {
    pub name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl FilePayload {
    #[must_use]
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            bytes,
        }
    }

    #[must_use]
    pub fn kind(&self) -> AttachmentKind {
        if self.mime.starts_with("image/") {
            AttachmentKind::Image
        } else {
            AttachmentKind::File
        }
    }

    #[must_use]
    pub fn to_attachment(&self) -> Attachment {
        Attachment::from_bytes(self.kind(), self.name.clone(), &self.bytes)
    }
}

/// Guess a MIME type from a file extension.
#[must_use]
pub fn guess_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("wav") => "audio/wav",
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}

/// Read a file from disk as an attachment payload.
///
/// # Errors
/// Returns error if the file cannot be read.
pub async fn read_file(path: &Path) -> Result<FilePayload, MediaError> {
    let bytes = tokio::fs::read(path).await?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(FilePayload::new(name, guess_mime(path), bytes))
}

/// Source of voice recordings.
#[async_trait]
pub trait AudioCapture: Send + Sync {
    /// Begin recording.
    async fn start(&self) -> Result<(), MediaError>;

    /// Stop recording and return what was captured.
    async fn stop(&self) -> Result<RecordedAudio, MediaError>;
}

/// Capture backed by a WAV file, for hosts without a microphone API.
#[derive(Debug)]
pub struct WavFileCapture {
    path: PathBuf,
    recording: tokio::sync::Mutex<bool>,
}

impl WavFileCapture {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            recording: tokio::sync::Mutex::new(false),
        }
    }
}

fn device_error(e: io::Error) -> MediaError {
    match e.kind() {
        io::ErrorKind::PermissionDenied => MediaError::PermissionDenied,
        io::ErrorKind::NotFound => MediaError::Unavailable,
        _ => MediaError::Io(e),
    }
}

#[async_trait]
impl AudioCapture for WavFileCapture {
    async fn start(&self) -> Result<(), MediaError> {
        tokio::fs::metadata(&self.path).await.map_err(device_error)?;
        *self.recording.lock().await = true;
        tracing::debug!(path = %self.path.display(), "recording started");
        Ok(())
    }

    async fn stop(&self) -> Result<RecordedAudio, MediaError> {
        let mut recording = self.recording.lock().await;
        if !*recording {
            return Err(MediaError::NotRecording);
        }
        *recording = false;
        let bytes = tokio::fs::read(&self.path).await.map_err(device_error)?;
        Ok(RecordedAudio::new(bytes, guess_mime(&self.path)))
    }
}

/// Stopwatch for the recording indicator.
#[derive(Debug, Clone, Copy)]
pub struct Recording {
    started: Instant,
}

impl Recording {
    #[must_use]
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    #[must_use]
    pub fn elapsed_label(&self) -> String {
        format_elapsed(self.started.elapsed())
    }
}

/// `MM:SS`, zero padded.
#[must_use]
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use tokio_test::assert_ok;

    use super::*;

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::ZERO), "00:00");
        assert_eq!(format_elapsed(Duration::from_millis(65_900)), "01:05");
        assert_eq!(format_elapsed(Duration::from_secs(600)), "10:00");
    }

    #[tokio::test]
    async fn test_recording_stopwatch() {
        let recording = Recording::start();
        assert_eq!(recording.elapsed_label(), "00:00");
    }

    #[test]
    fn test_file_kind_by_mime() {
        assert_eq!(
            FilePayload::new("a.jpg", "image/jpeg", vec![]).kind(),
            AttachmentKind::Image
        );
        assert_eq!(
            FilePayload::new("a.pdf", "application/pdf", vec![]).kind(),
            AttachmentKind::File
        );
        assert_eq!(guess_mime(Path::new("photo.PNG")), "image/png");
        assert_eq!(guess_mime(Path::new("noext")), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_read_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pic.png");
        tokio::fs::write(&path, [1u8, 2, 3]).await.unwrap();

        let payload = read_file(&path).await.unwrap();
        assert_eq!(payload.name, "pic.png");
        assert_eq!(payload.mime, "image/png");
        assert_eq!(payload.to_attachment().decode().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_wav_capture() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mic.wav");

        let missing = WavFileCapture::new(&path);
        assert!(matches!(missing.start().await, Err(MediaError::Unavailable)));

        tokio::fs::write(&path, b"RIFF").await.unwrap();
        let capture = WavFileCapture::new(&path);
        assert!(matches!(capture.stop().await, Err(MediaError::NotRecording)));
        assert_ok!(capture.start().await);
        let audio = assert_ok!(capture.stop().await);
        assert_eq!(audio.bytes, b"RIFF");
        assert_eq!(audio.mime, "audio/wav");
        assert_eq!(audio.to_attachment().name, "recording.wav");
    }
}
