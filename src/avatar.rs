// Avatar payload checks
// Images are stored as uploaded; resizing is left to an image pipeline outside this service

use crate::auth::error::AuthError;

/// Largest accepted upload in bytes
pub const MAX_AVATAR_BYTES: usize = 1_000_000;

const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvatarFormat {
    Png,
    Jpeg,
}

impl AvatarFormat {
    /// Detect the format from the leading bytes
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(PNG_MAGIC) {
            Some(AvatarFormat::Png)
        } else if bytes.starts_with(JPEG_MAGIC) {
            Some(AvatarFormat::Jpeg)
        } else {
            None
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            AvatarFormat::Png => "image/png",
            AvatarFormat::Jpeg => "image/jpeg",
        }
    }
}

/// Check an upload and return its detected format
pub fn validate_upload(bytes: &[u8]) -> Result<AvatarFormat, AuthError> {
    if bytes.is_empty() {
        return Err(AuthError::ValidationError("Please upload an image".to_string()));
    }
    if bytes.len() > MAX_AVATAR_BYTES {
        return Err(AuthError::ValidationError(format!(
            "Avatar must be at most {} bytes",
            MAX_AVATAR_BYTES
        )));
    }

    AvatarFormat::sniff(bytes).ok_or_else(|| {
        AuthError::ValidationError("Please upload either a .jpg image or a .png image".to_string())
    })
}
