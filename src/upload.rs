use axum::http::HeaderMap;
use bytes::Bytes;

use crate::error::AppError;

const ALLOWED: &[(&str, &str)] = &[
    ("jpeg", "image/jpeg"),
    ("jpg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("svg", "image/svg+xml"),
];

#[derive(Debug)]
pub struct ImageUpload {
    pub extension: &'static str,
    pub bytes: Bytes,
}

/// Match a file name and declared content type against the accepted image
/// formats. The extension decides; a declared non-image type is rejected.
pub fn image_extension(file_name: Option<&str>, content_type: Option<&str>) -> Option<&'static str> {
    let requested = file_name?.rsplit_once('.')?.1.to_ascii_lowercase();
    let &(ext, mime) = ALLOWED.iter().find(|(e, _)| *e == requested)?;
    match content_type {
        Some(ct) if ct != "application/octet-stream" && ct != mime => None,
        _ => Some(ext),
    }
}

/// Pull the image part named `field` out of a multipart body.
pub async fn read_image(headers: &HeaderMap, body: Bytes, field: &str) -> Result<ImageUpload, AppError> {
    let boundary = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .and_then(|ct| multer::parse_boundary(ct).ok())
        .ok_or_else(|| AppError::invalid_field(field, format!("The {field} field is required.")))?;

    let stream = futures_util::stream::once(async { Ok::<_, std::io::Error>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    while let Some(part) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::validation(format!("Malformed multipart body: {e}")))?
    {
        if part.name() != Some(field) {
            continue;
        }

        let extension = image_extension(
            part.file_name(),
            part.content_type().map(|m| m.essence_str()),
        )
        .ok_or_else(|| {
            AppError::invalid_field(
                field,
                format!("The {field} must be a file of type: jpeg, png, jpg, gif, svg."),
            )
        })?;

        let bytes = part
            .bytes()
            .await
            .map_err(|e| AppError::validation(format!("Failed to read upload: {e}")))?;
        if bytes.is_empty() {
            return Err(AppError::invalid_field(field, format!("The {field} must not be empty.")));
        }

        return Ok(ImageUpload { extension, bytes });
    }

    Err(AppError::invalid_field(field, format!("The {field} field is required.")))
}
