//! In-memory file payloads for multipart requests.

use reqwest::multipart::Part;

use crate::error::{ApiError, Result};

/// A file to attach to a multipart request.
///
/// The caller is responsible for having read the file; this crate never
/// touches the filesystem.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl FileUpload {
    pub fn new(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    pub(crate) fn into_part(self) -> Result<Part> {
        Part::bytes(self.bytes)
            .file_name(self.filename)
            .mime_str(&self.content_type)
            .map_err(|e| ApiError::Validation(format!("invalid content type: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_mime_builds_part() {
        let upload = FileUpload::new("avatar.png", "image/png", vec![1, 2, 3]);
        assert!(upload.into_part().is_ok());
    }

    #[test]
    fn invalid_mime_is_a_validation_error() {
        let upload = FileUpload::new("avatar.png", "not a mime", vec![]);
        let err = upload.into_part().unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }
}
