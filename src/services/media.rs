// src/services/media.rs
//! Media normalization: turns what a picker (or a local file) reports into an
//! `AnalysisInput`, with best-effort thumbnails for video.

use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

use crate::models::{AnalysisInput, InputKind};

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("failed to read media file: {0}")]
    Io(#[from] std::io::Error),
    #[error("unsupported media type: {0}")]
    Unsupported(String),
}

/// Raw asset as reported by a camera or gallery picker
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MediaAsset {
    pub uri: String,
    pub kind: Option<InputKind>,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    /// Pickers report milliseconds
    pub duration_ms: Option<u64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Maps platform MIME types the model rejects to accepted equivalents
pub fn normalize_mime_type(mime_type: &str) -> String {
    match mime_type.trim().to_lowercase().as_str() {
        "video/quicktime" => "video/mp4".to_string(),
        "image/heic" | "image/heif" => "image/jpeg".to_string(),
        other => other.to_string(),
    }
}

pub fn ms_to_seconds(ms: Option<u64>) -> Option<u32> {
    ms.map(|ms| ((ms as f64) / 1000.0).round() as u32)
}

pub fn mime_from_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    let mime = match ext.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "avi" => "video/avi",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        "3gp" | "3gpp" => "video/3gpp",
        "wmv" => "video/x-ms-wmv",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "heif" => "image/heif",
        _ => return None,
    };
    Some(mime)
}

/// Determine MIME type from a file signature
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        Some("image/png")
    } else if bytes.starts_with(&[0x47, 0x49, 0x46]) {
        Some("image/gif")
    } else if bytes.starts_with(b"RIFF") && bytes.get(8..12) == Some(&b"WEBP"[..]) {
        Some("image/webp")
    } else if bytes.get(4..8) == Some(&b"ftyp"[..]) {
        if bytes.get(8..10) == Some(&b"qt"[..]) {
            Some("video/quicktime")
        } else {
            Some("video/mp4")
        }
    } else {
        None
    }
}

fn kind_from_mime(mime_type: &str) -> Option<InputKind> {
    if mime_type.starts_with("video/") {
        Some(InputKind::Video)
    } else if mime_type.starts_with("image/") {
        Some(InputKind::Image)
    } else {
        None
    }
}

/// Filesystem path behind a picker-style `file://` locator
pub fn local_path(uri: &str) -> &str {
    uri.strip_prefix("file://").unwrap_or(uri)
}

#[async_trait]
pub trait ThumbnailGenerator: Send + Sync {
    /// Returns the locator of a still frame taken from the start of the video.
    async fn thumbnail(&self, video_uri: &str) -> Result<String, MediaError>;
}

/// Extracts the first frame with ffmpeg
pub struct FfmpegThumbnailer {
    output_dir: PathBuf,
}

impl FfmpegThumbnailer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    fn command(&self, video_uri: &str, output: &Path) -> Command {
        let mut command = Command::new("ffmpeg");
        command
            .args(["-y", "-loglevel", "error", "-ss", "0", "-i", local_path(video_uri)])
            .args(["-frames:v", "1", "-q:v", "5"])
            .arg(output);
        command
    }
}

#[async_trait]
impl ThumbnailGenerator for FfmpegThumbnailer {
    async fn thumbnail(&self, video_uri: &str) -> Result<String, MediaError> {
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let output = self
            .output_dir
            .join(format!("thumb_{}.jpg", uuid::Uuid::new_v4().simple()));

        let status = self.command(video_uri, &output).status().await?;

        if !status.success() {
            return Err(MediaError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("ffmpeg exited with {}", status),
            )));
        }
        Ok(output.to_string_lossy().into_owned())
    }
}

/// Video duration in milliseconds via ffprobe; `None` when unavailable
pub async fn probe_duration_ms(path: &Path) -> Option<u64> {
    let output = Command::new("ffprobe")
        .args(["-v", "quiet", "-show_entries", "format=duration", "-of", "csv=p=0"])
        .arg(path)
        .output()
        .await
        .ok()?;

    if !output.status.success() {
        return None;
    }
    let secs: f64 = String::from_utf8_lossy(&output.stdout).trim().parse().ok()?;
    Some((secs * 1000.0).round() as u64)
}

/// Builds a `MediaAsset` for a local file the way a gallery picker would.
pub async fn probe_file(path: &Path) -> Result<MediaAsset, MediaError> {
    let mut header = [0u8; 16];
    let mut file = tokio::fs::File::open(path).await?;
    let read = file.read(&mut header).await?;

    let mime_type = mime_from_extension(path)
        .or_else(|| sniff_mime(&header[..read]))
        .ok_or_else(|| MediaError::Unsupported(path.display().to_string()))?;
    let kind = kind_from_mime(mime_type)
        .ok_or_else(|| MediaError::Unsupported(mime_type.to_string()))?;

    let duration_ms = match kind {
        InputKind::Video => probe_duration_ms(path).await,
        _ => None,
    };

    Ok(MediaAsset {
        uri: path.to_string_lossy().into_owned(),
        kind: Some(kind),
        file_name: path.file_name().map(|n| n.to_string_lossy().into_owned()),
        mime_type: Some(mime_type.to_string()),
        duration_ms,
        width: None,
        height: None,
    })
}

/// Normalizes a picked asset into an analysis input.
///
/// Thumbnail generation is best-effort: a failure is logged and the
/// thumbnail is simply omitted.
pub async fn normalize_asset(
    asset: MediaAsset,
    thumbnailer: &dyn ThumbnailGenerator,
) -> Result<AnalysisInput, MediaError> {
    let kind = asset
        .kind
        .or_else(|| asset.mime_type.as_deref().and_then(kind_from_mime))
        .ok_or_else(|| MediaError::Unsupported(asset.uri.clone()))?;
    if kind == InputKind::Text {
        return Err(MediaError::Unsupported("text".to_string()));
    }

    let is_video = kind == InputKind::Video;
    let stamp = Utc::now().timestamp_millis();
    let file_name = asset.file_name.unwrap_or_else(|| {
        if is_video {
            format!("video_{}.mp4", stamp)
        } else {
            format!("photo_{}.jpg", stamp)
        }
    });
    let mime_type = asset
        .mime_type
        .map(|m| normalize_mime_type(&m))
        .unwrap_or_else(|| if is_video { "video/mp4" } else { "image/jpeg" }.to_string());

    let thumbnail_uri = if is_video {
        match thumbnailer.thumbnail(&asset.uri).await {
            Ok(uri) => Some(uri),
            Err(e) => {
                tracing::warn!(uri = %asset.uri, "Failed to generate thumbnail: {}", e);
                None
            }
        }
    } else {
        None
    };

    Ok(AnalysisInput {
        kind,
        uri: Some(asset.uri),
        text: None,
        mime_type,
        duration_secs: if is_video { ms_to_seconds(asset.duration_ms) } else { None },
        file_name: Some(file_name),
        thumbnail_uri,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedThumbnailer(Option<&'static str>);

    #[async_trait]
    impl ThumbnailGenerator for FixedThumbnailer {
        async fn thumbnail(&self, _video_uri: &str) -> Result<String, MediaError> {
            self.0
                .map(str::to_string)
                .ok_or_else(|| MediaError::Unsupported("no frames".to_string()))
        }
    }

    #[test]
    fn test_local_path_strips_file_scheme() {
        assert_eq!(local_path("file:///tmp/clip.mp4"), "/tmp/clip.mp4");
        assert_eq!(local_path("/tmp/clip.mp4"), "/tmp/clip.mp4");
    }

    #[test]
    fn test_thumbnailer_reads_local_path() {
        let thumbnailer = FfmpegThumbnailer::new("/tmp/thumbs");
        let command = thumbnailer.command("file:///videos/clip.mov", Path::new("/tmp/thumbs/t.jpg"));
        let args: Vec<String> = command
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        let input = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(args[input + 1], "/videos/clip.mov");
        assert_eq!(args.last().unwrap(), "/tmp/thumbs/t.jpg");
    }

    #[test]
    fn test_mime_normalization() {
        assert_eq!(normalize_mime_type("video/quicktime"), "video/mp4");
        assert_eq!(normalize_mime_type("image/HEIC"), "image/jpeg");
        assert_eq!(normalize_mime_type("image/heif"), "image/jpeg");
        assert_eq!(normalize_mime_type("image/png"), "image/png");
    }

    #[test]
    fn test_duration_rounding() {
        assert_eq!(ms_to_seconds(Some(10_499)), Some(10));
        assert_eq!(ms_to_seconds(Some(10_500)), Some(11));
        assert_eq!(ms_to_seconds(Some(0)), Some(0));
        assert_eq!(ms_to_seconds(None), None);
    }

    #[test]
    fn test_mime_detection() {
        assert_eq!(mime_from_extension(Path::new("clip.MOV")), Some("video/quicktime"));
        assert_eq!(mime_from_extension(Path::new("notes.txt")), None);
        assert_eq!(sniff_mime(&[0xFF, 0xD8, 0xFF, 0xE0]), Some("image/jpeg"));
        assert_eq!(sniff_mime(b"\0\0\0\x18ftypmp42"), Some("video/mp4"));
        assert_eq!(sniff_mime(b"hello"), None);
    }

    #[tokio::test]
    async fn test_normalize_video_asset() {
        let asset = MediaAsset {
            uri: "/media/clip.mov".to_string(),
            kind: Some(InputKind::Video),
            mime_type: Some("video/quicktime".to_string()),
            duration_ms: Some(12_600),
            ..Default::default()
        };
        let input = normalize_asset(asset, &FixedThumbnailer(Some("/thumbs/a.jpg")))
            .await
            .unwrap();
        assert_eq!(input.kind, InputKind::Video);
        assert_eq!(input.mime_type, "video/mp4");
        assert_eq!(input.duration_secs, Some(13));
        assert_eq!(input.thumbnail_uri.as_deref(), Some("/thumbs/a.jpg"));
        assert!(input.file_name.unwrap().starts_with("video_"));
    }

    #[tokio::test]
    async fn test_thumbnail_failure_is_not_fatal() {
        let asset = MediaAsset {
            uri: "/media/clip.mp4".to_string(),
            kind: Some(InputKind::Video),
            ..Default::default()
        };
        let input = normalize_asset(asset, &FixedThumbnailer(None)).await.unwrap();
        assert_eq!(input.thumbnail_uri, None);
        assert_eq!(input.mime_type, "video/mp4");
    }

    #[tokio::test]
    async fn test_normalize_image_asset_defaults() {
        let asset = MediaAsset {
            uri: "/media/IMG_0001.HEIC".to_string(),
            mime_type: Some("image/heic".to_string()),
            file_name: Some("IMG_0001.HEIC".to_string()),
            duration_ms: Some(5_000),
            ..Default::default()
        };
        let input = normalize_asset(asset, &FixedThumbnailer(Some("/never.jpg")))
            .await
            .unwrap();
        assert_eq!(input.kind, InputKind::Image);
        assert_eq!(input.mime_type, "image/jpeg");
        assert_eq!(input.duration_secs, None);
        assert_eq!(input.thumbnail_uri, None);
    }

    #[tokio::test]
    async fn test_probe_image_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame");
        tokio::fs::write(&path, [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A]).await.unwrap();

        let asset = probe_file(&path).await.unwrap();
        assert_eq!(asset.kind, Some(InputKind::Image));
        assert_eq!(asset.mime_type.as_deref(), Some("image/png"));
        assert_eq!(asset.file_name.as_deref(), Some("frame"));
    }
}
