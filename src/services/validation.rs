use garde::Validate;
use image::ImageFormat;

use crate::config::Limits;
use crate::models::api::ImageUpload;

/// Image formats the detection pipeline accepts.
const ALLOWED_FORMATS: &[ImageFormat] = &[ImageFormat::Jpeg, ImageFormat::Png, ImageFormat::WebP];

/// Validate a whole submission. The first offending entry fails the batch;
/// partial acceptance is not supported.
pub fn validate_batch(images: &[ImageUpload], limits: &Limits) -> Result<(), ValidationError> {
    if images.is_empty() {
        return Err(ValidationError::EmptyBatch);
    }

    if images.len() > limits.max_batch_size {
        return Err(ValidationError::BatchTooLarge {
            count: images.len(),
            max: limits.max_batch_size,
        });
    }

    for upload in images {
        validate_entry(upload, limits)?;
    }

    Ok(())
}

fn validate_entry(upload: &ImageUpload, limits: &Limits) -> Result<(), ValidationError> {
    if let Err(report) = upload.validate() {
        return Err(ValidationError::InvalidEntry {
            filename: upload.filename.clone(),
            reason: report.to_string(),
        });
    }

    if upload.bytes.is_empty() {
        return Err(ValidationError::EmptyImage {
            filename: upload.filename.clone(),
        });
    }

    if upload.bytes.len() > limits.max_image_bytes {
        return Err(ValidationError::ImageTooLarge {
            filename: upload.filename.clone(),
            size: upload.bytes.len(),
            max: limits.max_image_bytes,
        });
    }

    let format = image::guess_format(&upload.bytes).map_err(|_| ValidationError::UnsupportedFormat {
        filename: upload.filename.clone(),
    })?;

    if !ALLOWED_FORMATS.contains(&format) {
        return Err(ValidationError::UnsupportedFormat {
            filename: upload.filename.clone(),
        });
    }

    Ok(())
}

/// Sniff the content type of an already-validated image.
pub fn content_type(bytes: &[u8]) -> &'static str {
    image::guess_format(bytes)
        .map(|f| f.to_mime_type())
        .unwrap_or("application/octet-stream")
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("submission contains no images")]
    EmptyBatch,

    #[error("batch of {count} images exceeds the maximum of {max}")]
    BatchTooLarge { count: usize, max: usize },

    #[error("image `{filename}` is empty")]
    EmptyImage { filename: String },

    #[error("image `{filename}` is {size} bytes, over the {max}-byte limit")]
    ImageTooLarge {
        filename: String,
        size: usize,
        max: usize,
    },

    #[error("image `{filename}` is not a supported format (jpeg, png, webp)")]
    UnsupportedFormat { filename: String },

    #[error("image `{filename}` is invalid: {reason}")]
    InvalidEntry { filename: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0];

    fn limits() -> Limits {
        Limits {
            max_batch_size: 4,
            max_image_bytes: 64,
            provisioning_timeout_secs: 600,
            lease_ttl_secs: 300,
        }
    }

    fn png(filename: &str) -> ImageUpload {
        ImageUpload {
            filename: filename.to_string(),
            bytes: PNG_MAGIC.to_vec(),
        }
    }

    #[test]
    fn accepts_a_valid_batch() {
        let batch = vec![png("a.png"), png("b.png")];
        assert!(validate_batch(&batch, &limits()).is_ok());
    }

    #[test]
    fn rejects_an_empty_batch() {
        assert!(matches!(
            validate_batch(&[], &limits()),
            Err(ValidationError::EmptyBatch)
        ));
    }

    #[test]
    fn rejects_an_oversized_batch() {
        let batch: Vec<_> = (0..5).map(|i| png(&format!("{i}.png"))).collect();
        assert!(matches!(
            validate_batch(&batch, &limits()),
            Err(ValidationError::BatchTooLarge { count: 5, max: 4 })
        ));
    }

    #[test]
    fn rejects_an_oversized_image_and_names_it() {
        let mut big = png("big.png");
        big.bytes = [PNG_MAGIC, &[0u8; 100][..]].concat();
        let batch = vec![png("ok.png"), big];
        match validate_batch(&batch, &limits()) {
            Err(ValidationError::ImageTooLarge { filename, .. }) => {
                assert_eq!(filename, "big.png")
            }
            other => panic!("expected ImageTooLarge, got {other:?}"),
        }
    }

    #[test]
    fn rejects_an_unrecognized_format_and_names_it() {
        let bogus = ImageUpload {
            filename: "notes.txt".to_string(),
            bytes: b"plain text".to_vec(),
        };
        let batch = vec![png("ok.png"), bogus];
        match validate_batch(&batch, &limits()) {
            Err(ValidationError::UnsupportedFormat { filename }) => {
                assert_eq!(filename, "notes.txt")
            }
            other => panic!("expected UnsupportedFormat, got {other:?}"),
        }
    }

    #[test]
    fn rejects_a_missing_filename() {
        let unnamed = ImageUpload {
            filename: String::new(),
            bytes: PNG_MAGIC.to_vec(),
        };
        assert!(matches!(
            validate_batch(&[unnamed], &limits()),
            Err(ValidationError::InvalidEntry { .. })
        ));
    }

    #[test]
    fn one_bad_entry_fails_the_whole_batch() {
        let batch = vec![
            png("a.png"),
            ImageUpload {
                filename: "empty.jpg".to_string(),
                bytes: Vec::new(),
            },
            png("c.png"),
        ];
        assert!(matches!(
            validate_batch(&batch, &limits()),
            Err(ValidationError::EmptyImage { .. })
        ));
    }

    #[test]
    fn jpeg_content_type_is_sniffed() {
        assert_eq!(content_type(JPEG_MAGIC), "image/jpeg");
        assert_eq!(content_type(PNG_MAGIC), "image/png");
    }
}
