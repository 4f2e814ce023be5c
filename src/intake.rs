//! Turns dropped screenshot files into the inline `data:` URIs stored on screens.

use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::{DynamicImage, ImageFormat};
use thiserror::Error;
use tokio::fs as async_fs;

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("not a supported image: {0}")]
    UnsupportedFormat(String),
    #[error("malformed data URI: {0}")]
    MalformedDataUri(&'static str),
    #[error(transparent)]
    Image(#[from] image::ImageError),
}

/// Reads an image file and encodes it as a `data:<mime>;base64,...` URI.
pub async fn image_data_uri<P: AsRef<Path>>(path: P) -> Result<String, IntakeError> {
    let path = path.as_ref();
    let bytes = async_fs::read(path).await.map_err(|source| IntakeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    encode_data_uri(&bytes)
}

/// Encodes raw image bytes as a data URI. The content must decode as an image.
pub fn encode_data_uri(bytes: &[u8]) -> Result<String, IntakeError> {
    let format = image::guess_format(bytes)
        .map_err(|_| IntakeError::UnsupportedFormat("unrecognised file signature".to_string()))?;
    image::load_from_memory_with_format(bytes, format)?;
    Ok(format!(
        "data:{};base64,{}",
        format.to_mime_type(),
        STANDARD.encode(bytes)
    ))
}

/// Splits a base64 data URI into its media type and payload bytes.
pub fn decode_data_uri_bytes(uri: &str) -> Result<(String, Vec<u8>), IntakeError> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or(IntakeError::MalformedDataUri("missing data: scheme"))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or(IntakeError::MalformedDataUri("missing payload separator"))?;
    let mime = meta
        .strip_suffix(";base64")
        .ok_or(IntakeError::MalformedDataUri("payload is not base64"))?;
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|_| IntakeError::MalformedDataUri("invalid base64 payload"))?;
    Ok((mime.to_string(), bytes))
}

pub fn decode_data_uri(uri: &str) -> Result<DynamicImage, IntakeError> {
    let (mime, bytes) = decode_data_uri_bytes(uri)?;
    let image = match ImageFormat::from_mime_type(&mime) {
        Some(format) => image::load_from_memory_with_format(&bytes, format)?,
        None => image::load_from_memory(&bytes)?,
    };
    Ok(image)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{ImageBuffer, Rgb};

    use super::*;

    fn png_bytes() -> Vec<u8> {
        let img = ImageBuffer::from_fn(4, 3, |_, _| Rgb([10u8, 20u8, 30u8]));
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn png_becomes_data_uri_and_back() {
        let uri = encode_data_uri(&png_bytes()).unwrap();
        assert!(uri.starts_with("data:image/png;base64,"));
        let image = decode_data_uri(&uri).unwrap();
        assert_eq!((image.width(), image.height()), (4, 3));
    }

    #[test]
    fn text_is_rejected() {
        let err = encode_data_uri(b"query { me { id } }").unwrap_err();
        assert!(matches!(err, IntakeError::UnsupportedFormat(_)));
    }

    #[test]
    fn non_base64_uri_is_rejected() {
        assert!(matches!(
            decode_data_uri("data:text/plain,hello"),
            Err(IntakeError::MalformedDataUri(_))
        ));
        assert!(matches!(
            decode_data_uri("https://example.com/a.png"),
            Err(IntakeError::MalformedDataUri(_))
        ));
    }
}
