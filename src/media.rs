//! Image, video, and audio payload extraction.
//!
//! Images are decoded with the `image` crate and EXIF is read with
//! `kamadak-exif`; both run on the blocking pool. Video and audio metadata
//! come from `ffprobe` when it is installed. A missing `ffprobe` leaves the
//! optional fields empty.

use base64::Engine;
use image::GenericImageView;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Cursor};
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

use crate::error::{CatalogError, Result};
use file_catalog_core::record::{AudioPayload, ImagePayload, VideoPayload};

/// Formats in the image table that the decoder cannot rasterize. These are
/// cataloged without dimensions or thumbnail.
const UNDECODABLE: &[&str] = &[".svg", ".heic", ".nef"];

pub async fn read_image(path: &Path, thumbnail_size: u32) -> Result<ImagePayload> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || read_image_blocking(&path, thumbnail_size))
        .await
        .map_err(|e| CatalogError::media(format!("image task failed: {}", e)))?
}

fn read_image_blocking(path: &Path, thumbnail_size: u32) -> Result<ImagePayload> {
    let bytes = std::fs::read(path)?;
    let engine = base64::engine::general_purpose::STANDARD;
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default();

    let metadata = read_exif(path);

    if UNDECODABLE.contains(&ext.as_str()) {
        return Ok(ImagePayload {
            data: engine.encode(&bytes),
            thumbnail: String::new(),
            metadata,
            format: ext.trim_start_matches('.').to_string(),
            width: 0,
            height: 0,
            nsfw: false,
        });
    }

    let reader = image::io::Reader::new(Cursor::new(&bytes))
        .with_guessed_format()
        .map_err(|e| CatalogError::media(format!("{}: {}", path.display(), e)))?;
    let format = reader
        .format()
        .map(|f| format!("{:?}", f).to_lowercase())
        .unwrap_or_else(|| ext.trim_start_matches('.').to_string());
    let img = reader
        .decode()
        .map_err(|e| CatalogError::media(format!("{}: {}", path.display(), e)))?;
    let (width, height) = img.dimensions();

    let mut thumb = Vec::new();
    img.thumbnail(thumbnail_size, thumbnail_size)
        .write_to(&mut Cursor::new(&mut thumb), image::ImageOutputFormat::Png)
        .map_err(|e| CatalogError::media(format!("{}: thumbnail: {}", path.display(), e)))?;

    Ok(ImagePayload {
        data: engine.encode(&bytes),
        thumbnail: engine.encode(&thumb),
        metadata,
        format,
        width,
        height,
        nsfw: false,
    })
}

/// Primary-IFD EXIF fields as display strings. Empty when the file has none.
fn read_exif(path: &Path) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    let Ok(file) = File::open(path) else {
        return out;
    };
    let exif = match exif::Reader::new().read_from_container(&mut BufReader::new(file)) {
        Ok(exif) => exif,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "no EXIF data");
            return out;
        }
    };
    for field in exif.fields() {
        if field.ifd_num != exif::In::PRIMARY {
            continue;
        }
        out.insert(
            field.tag.to_string(),
            field.display_value().with_unit(&exif).to_string(),
        );
    }
    out
}

#[derive(Debug, Deserialize, Default)]
struct ProbeOutput {
    #[serde(default)]
    format: ProbeFormat,
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize, Default)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

/// Run `ffprobe` and parse its JSON. `None` when it is missing or fails.
async fn probe(ffprobe: &str, path: &Path) -> Option<ProbeOutput> {
    let output = Command::new(ffprobe)
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .kill_on_drop(true)
        .output()
        .await;

    match output {
        Ok(out) if out.status.success() => match serde_json::from_slice(&out.stdout) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "unparseable ffprobe output");
                None
            }
        },
        Ok(out) => {
            debug!(path = %path.display(), status = %out.status, "ffprobe failed");
            None
        }
        Err(e) => {
            debug!(ffprobe, error = %e, "ffprobe unavailable");
            None
        }
    }
}

fn parse_video(probe: &ProbeOutput) -> VideoPayload {
    let stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"));
    VideoPayload {
        duration: probe.format.duration.as_deref().and_then(|d| d.parse().ok()),
        width: stream.and_then(|s| s.width),
        height: stream.and_then(|s| s.height),
        codec: stream.and_then(|s| s.codec_name.clone()),
    }
}

pub async fn read_video(ffprobe: &str, path: &Path) -> VideoPayload {
    probe(ffprobe, path)
        .await
        .map(|p| parse_video(&p))
        .unwrap_or_default()
}

pub async fn read_audio(ffprobe: &str, path: &Path) -> AudioPayload {
    let duration = probe(ffprobe, path)
        .await
        .and_then(|p| p.format.duration)
        .and_then(|d| d.parse().ok());
    AudioPayload {
        duration,
        transcript: None,
        video_id: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_video_probe() {
        let probe: ProbeOutput = serde_json::from_str(
            r#"{
                "streams": [
                    {"codec_type": "audio", "codec_name": "aac"},
                    {"codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080}
                ],
                "format": {"duration": "12.480000"}
            }"#,
        )
        .unwrap();
        let video = parse_video(&probe);
        assert_eq!(video.codec.as_deref(), Some("h264"));
        assert_eq!(video.resolution().as_deref(), Some("1920x1080"));
        assert!((video.duration.unwrap() - 12.48).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_missing_ffprobe_degrades() {
        let video = read_video("ffprobe-definitely-not-installed", Path::new("/tmp/x.mp4")).await;
        assert_eq!(video, VideoPayload::default());
        let audio = read_audio("ffprobe-definitely-not-installed", Path::new("/tmp/x.mp3")).await;
        assert!(audio.duration.is_none());
    }

    #[tokio::test]
    async fn test_read_png_with_thumbnail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("red.png");
        image::RgbImage::from_pixel(40, 20, image::Rgb([255, 0, 0]))
            .save(&path)
            .unwrap();

        let payload = read_image(&path, 16).await.unwrap();
        assert_eq!(payload.format, "png");
        assert_eq!((payload.width, payload.height), (40, 20));
        assert!(!payload.thumbnail.is_empty());
        assert!(!payload.nsfw);

        let thumb = base64::engine::general_purpose::STANDARD
            .decode(&payload.thumbnail)
            .unwrap();
        let decoded = image::load_from_memory(&thumb).unwrap();
        assert_eq!(decoded.dimensions(), (16, 8));
    }

    #[tokio::test]
    async fn test_corrupt_png_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not really a png").unwrap();
        assert!(matches!(
            read_image(&path, 16).await,
            Err(CatalogError::Media(_))
        ));
    }
}
