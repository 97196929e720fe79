//! Audio capture and data-URL encoding.
//!
//! A [`Recorder`] toggles a [`CaptureDevice`] on and off. Stopping yields a
//! [`Payload::Audio`] holding a `data:<mime>;base64,<...>` URL, the opaque
//! form the backend accepts. A refused device leaves the recorder idle.

use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::{debug, error};

use crate::error::SyncError;
use crate::protocol::Payload;

pub const DEFAULT_AUDIO_MIME: &str = "audio/webm";

/// Encode raw audio bytes as a base64 `data:` URL.
pub fn encode_data_url(bytes: &[u8], mime: &str) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

/// Split a `data:` URL back into its MIME type and decoded bytes.
///
/// # Errors
/// [`SyncError::InvalidPayload`] when the header is malformed or the body is
/// not valid base64.
pub fn decode_data_url(url: &str) -> Result<(String, Vec<u8>), SyncError> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| SyncError::InvalidPayload("audio is not a data: URL".into()))?;
    let (header, body) = rest
        .split_once(',')
        .ok_or_else(|| SyncError::InvalidPayload("data URL has no body".into()))?;
    let mime = header
        .strip_suffix(";base64")
        .ok_or_else(|| SyncError::InvalidPayload("data URL is not base64".into()))?;
    let bytes = STANDARD
        .decode(body)
        .map_err(|e| SyncError::InvalidPayload(format!("bad base64 audio: {e}")))?;
    Ok((mime.to_string(), bytes))
}

/// A source of recorded audio (a microphone, a file, a test double).
pub trait CaptureDevice {
    /// Acquire the device and begin capturing.
    ///
    /// # Errors
    /// [`SyncError::PermissionDenied`] when access is refused.
    fn start(&mut self) -> Result<(), SyncError>;

    /// Stop capturing and hand back everything recorded since `start`.
    fn stop(&mut self) -> Result<Vec<u8>, SyncError>;

    fn mime_type(&self) -> &str {
        DEFAULT_AUDIO_MIME
    }
}

/// Toggle state around a capture device.
pub struct Recorder<D: CaptureDevice> {
    device: D,
    listening: bool,
}

impl<D: CaptureDevice> Recorder<D> {
    pub fn new(device: D) -> Self {
        Recorder { device, listening: false }
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    /// Flip between recording and idle.
    ///
    /// Starting returns `Ok(None)`. Stopping returns the encoded payload.
    /// When the device refuses to start, the recorder stays idle and the
    /// error is returned after being logged.
    pub fn toggle(&mut self) -> Result<Option<Payload>, SyncError> {
        if !self.listening {
            self.listening = true;
            if let Err(e) = self.device.start() {
                self.listening = false;
                error!(error = %e, "audio capture could not start");
                return Err(e);
            }
            debug!("audio capture started");
            return Ok(None);
        }

        self.listening = false;
        let bytes = self.device.stop()?;
        debug!(bytes = bytes.len(), "audio capture stopped");
        if bytes.is_empty() {
            return Err(SyncError::InvalidPayload("no audio was recorded".into()));
        }
        Ok(Some(Payload::audio(encode_data_url(&bytes, self.device.mime_type()))))
    }
}

/// Capture device that "records" a pre-existing audio file.
#[derive(Debug, Clone)]
pub struct FileCapture {
    path: PathBuf,
    mime: String,
    started: bool,
}

impl FileCapture {
    /// MIME type is guessed from the extension, defaulting to `audio/webm`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mime = match path.extension().and_then(|e| e.to_str()) {
            Some("mp3") => "audio/mp3",
            Some("wav") => "audio/wav",
            Some("ogg") => "audio/ogg",
            _ => DEFAULT_AUDIO_MIME,
        };
        FileCapture { path, mime: mime.to_string(), started: false }
    }
}

impl CaptureDevice for FileCapture {
    fn start(&mut self) -> Result<(), SyncError> {
        match std::fs::metadata(&self.path) {
            Ok(_) => {
                self.started = true;
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => Err(
                SyncError::PermissionDenied(format!("{}: {e}", self.path.display())),
            ),
            Err(e) => Err(e.into()),
        }
    }

    fn stop(&mut self) -> Result<Vec<u8>, SyncError> {
        if !self.started {
            return Ok(Vec::new());
        }
        self.started = false;
        Ok(std::fs::read(&self.path)?)
    }

    fn mime_type(&self) -> &str {
        &self.mime
    }
}
