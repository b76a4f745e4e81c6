use std::path::Path;

use anyhow::Context;
use base64ct::{Base64, Encoding};
use bytes::Bytes;
use lazy_static::lazy_static;
use regex::Regex;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use super::dto::{DecodedImage, UploadFile, UploadSource};
use crate::error::MealError;

/// `image/jpeg; charset=x` -> `image/jpeg`.
pub fn mime_essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

pub fn is_image_type(content_type: &str) -> bool {
    mime_essence(content_type)
        .strip_prefix("image/")
        .is_some_and(|sub| !sub.is_empty())
}

/// Checks that need no I/O. Runs before any state transition.
pub fn validate_upload(file: &UploadFile, max_bytes: u64) -> Result<(), MealError> {
    if !is_image_type(&file.content_type) {
        return Err(MealError::Validation(format!(
            "`{}` is not an image ({}); please choose an image file",
            file.name, file.content_type
        )));
    }
    if let Some(len) = file.known_len() {
        check_size(&file.name, len, max_bytes)?;
    }
    Ok(())
}

fn check_size(name: &str, len: u64, max_bytes: u64) -> Result<(), MealError> {
    if len > max_bytes {
        return Err(MealError::Validation(format!(
            "`{}` is too large ({} bytes, limit {})",
            name, len, max_bytes
        )));
    }
    Ok(())
}

/// Reads at most `max_bytes + 1` bytes, enough to tell an oversize stream apart.
async fn read_capped<R>(reader: R, max_bytes: u64) -> std::io::Result<Bytes>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    reader
        .take(max_bytes.saturating_add(1))
        .read_to_end(&mut buf)
        .await?;
    Ok(Bytes::from(buf))
}

/// Reads the payload and turns it into a self-contained data URL.
pub async fn read_image(file: UploadFile, max_bytes: u64) -> Result<DecodedImage, MealError> {
    let UploadFile {
        name,
        content_type,
        source,
    } = file;

    let bytes = match source {
        UploadSource::Bytes(b) => b,
        UploadSource::Path(path) => {
            let decode_err =
                |e: std::io::Error| MealError::Decode(format!("{}: {}", path.display(), e));
            let meta = tokio::fs::metadata(&path).await.map_err(decode_err)?;
            // device files and pipes report 0 here; the capped read still stops them
            check_size(&name, meta.len(), max_bytes)?;
            let f = tokio::fs::File::open(&path).await.map_err(decode_err)?;
            read_capped(f, max_bytes).await.map_err(decode_err)?
        }
        UploadSource::Reader(r) => read_capped(r, max_bytes)
            .await
            .map_err(|e| MealError::Decode(format!("`{}`: {}", name, e)))?,
    };
    if bytes.is_empty() {
        return Err(MealError::Decode(format!("`{}` is empty", name)));
    }
    check_size(&name, bytes.len() as u64, max_bytes)?;

    let content_type = mime_essence(&content_type);
    let data_url = encode_data_url(&content_type, &bytes);
    debug!(%name, %content_type, size = bytes.len(), "image read");
    Ok(DecodedImage {
        content_type,
        bytes,
        data_url,
    })
}

pub fn encode_data_url(content_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", content_type, Base64::encode_string(bytes))
}

/// Splits a `data:<mime>;base64,<payload>` URL into its type and bytes.
pub fn parse_data_url(url: &str) -> anyhow::Result<(String, Vec<u8>)> {
    lazy_static! {
        static ref DATA_URL_RE: Regex =
            Regex::new(r"^data:([A-Za-z0-9.+-]+/[A-Za-z0-9.+-]+);base64,([A-Za-z0-9+/=]*)$")
                .unwrap();
    }
    let caps = DATA_URL_RE
        .captures(url)
        .context("not a base64 data url")?;
    let bytes = Base64::decode_vec(&caps[2]).map_err(|e| anyhow::anyhow!("bad base64: {}", e))?;
    Ok((caps[1].to_ascii_lowercase(), bytes))
}

pub fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}

pub fn mime_from_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("heic") => "image/heic",
        Some("gif") => "image/gif",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod image_tests {
    use super::*;

    const JPEG_HEAD: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];

    #[test]
    fn test_ext_from_mime() {
        assert_eq!(ext_from_mime("image/jpeg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/jpg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/png"), Some("png"));
        assert_eq!(ext_from_mime("image/webp"), Some("webp"));
        assert_eq!(ext_from_mime("image/heic"), Some("heic"));
        assert_eq!(ext_from_mime("application/octet-stream"), None);
        assert_eq!(ext_from_mime("whatever/else"), None);
    }

    #[test]
    fn test_mime_from_path() {
        assert_eq!(mime_from_path(Path::new("lunch.JPG")), "image/jpeg");
        assert_eq!(mime_from_path(Path::new("a/b/dinner.webp")), "image/webp");
        assert_eq!(mime_from_path(Path::new("notes.txt")), "application/octet-stream");
        assert_eq!(mime_from_path(Path::new("noext")), "application/octet-stream");
    }

    #[test]
    fn image_family_only() {
        assert!(is_image_type("image/png"));
        assert!(is_image_type("IMAGE/JPEG"));
        assert!(!is_image_type("image/"));
        assert!(!is_image_type("text/plain"));
        assert!(!is_image_type("application/pdf"));
        assert!(is_image_type("image/jpeg; charset=x"));
        assert!(!is_image_type(" ; image/png"));
    }

    #[test]
    fn validate_rejects_non_image() {
        let file = UploadFile::from_bytes("menu.pdf", "application/pdf", b"%PDF".to_vec());
        let err = validate_upload(&file, 1024).unwrap_err();
        assert!(matches!(err, MealError::Validation(_)));
        assert!(err.to_string().contains("please choose an image"));
    }

    #[test]
    fn validate_rejects_oversize_bytes() {
        let file = UploadFile::from_bytes("big.png", "image/png", vec![0u8; 11]);
        assert!(matches!(
            validate_upload(&file, 10),
            Err(MealError::Validation(_))
        ));
        assert!(validate_upload(&file, 11).is_ok());
    }

    #[tokio::test]
    async fn read_bytes_into_data_url() {
        let file = UploadFile::from_bytes("a.jpg", "image/jpeg", JPEG_HEAD.to_vec());
        let img = read_image(file, 1024).await.unwrap();
        assert_eq!(img.content_type, "image/jpeg");
        assert_eq!(img.bytes.as_ref(), JPEG_HEAD);
        assert_eq!(img.data_url, "data:image/jpeg;base64,/9j/4AAQ");
    }

    #[tokio::test]
    async fn read_from_path() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("breakfast.jpeg");
        std::fs::write(&path, JPEG_HEAD).unwrap();

        let file = UploadFile::from_path(&path);
        assert_eq!(file.name, "breakfast.jpeg");
        assert_eq!(file.content_type, "image/jpeg");
        let img = read_image(file, 1024).await.unwrap();
        assert_eq!(img.bytes.as_ref(), JPEG_HEAD);
    }

    #[tokio::test]
    async fn read_missing_path_is_decode_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let file = UploadFile::from_path(tmp.path().join("gone.png"));
        let err = read_image(file, 1024).await.unwrap_err();
        assert!(matches!(err, MealError::Decode(_)));
    }

    #[tokio::test]
    async fn oversize_path_is_rejected_before_reading() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("huge.png");
        std::fs::write(&path, vec![7u8; 4096]).unwrap();

        let err = read_image(UploadFile::from_path(&path), 64).await.unwrap_err();
        match err {
            MealError::Validation(msg) => assert!(msg.contains("4096 bytes")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn endless_device_stops_at_limit() {
        let file = UploadFile {
            name: "zero".into(),
            content_type: "image/jpeg".into(),
            source: UploadSource::Path("/dev/zero".into()),
        };
        let res = tokio::time::timeout(std::time::Duration::from_secs(3), read_image(file, 64))
            .await
            .expect("capped read finishes");
        match res.unwrap_err() {
            MealError::Validation(msg) => assert!(msg.contains("65 bytes")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn oversize_stream_is_rejected() {
        let (mut tx, rx) = tokio::io::duplex(16);
        let writer = tokio::spawn(async move {
            use tokio::io::AsyncWriteExt;
            // the reader stops early, so later writes may fail
            for _ in 0..64 {
                if tx.write_all(&[1u8; 16]).await.is_err() {
                    break;
                }
            }
        });
        let file = UploadFile::from_reader("pipe.png", "image/png", rx);
        let err = read_image(file, 100).await.unwrap_err();
        assert!(matches!(err, MealError::Validation(_)));
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn read_from_stream() {
        let file = UploadFile::from_reader("pipe.jpg", "image/jpeg", JPEG_HEAD);
        let img = read_image(file, 1024).await.unwrap();
        assert_eq!(img.bytes.as_ref(), JPEG_HEAD);
    }

    #[tokio::test]
    async fn content_type_parameters_are_dropped() {
        let file = UploadFile::from_bytes("a.jpg", "Image/JPEG; charset=x", JPEG_HEAD.to_vec());
        let img = read_image(file, 1024).await.unwrap();
        assert_eq!(img.content_type, "image/jpeg");
        let (ct, bytes) = parse_data_url(&img.data_url).unwrap();
        assert_eq!(ct, "image/jpeg");
        assert_eq!(bytes, JPEG_HEAD);
    }

    #[tokio::test]
    async fn read_empty_is_decode_error() {
        let file = UploadFile::from_bytes("empty.png", "image/png", Vec::new());
        let err = read_image(file, 1024).await.unwrap_err();
        assert!(matches!(err, MealError::Decode(_)));
    }

    #[test]
    fn parse_data_url_reverses_encoding() {
        let url = encode_data_url("image/png", b"\x89PNG\r\n");
        let (ct, bytes) = parse_data_url(&url).unwrap();
        assert_eq!(ct, "image/png");
        assert_eq!(bytes, b"\x89PNG\r\n");
    }

    #[test]
    fn parse_data_url_rejects_other_urls() {
        assert!(parse_data_url("https://example.com/a.jpg").is_err());
        assert!(parse_data_url("data:image/png,plain").is_err());
        assert!(parse_data_url("data:image/png;base64,%%%").is_err());
    }
}
