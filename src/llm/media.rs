use base64::{ engine::general_purpose::STANDARD, Engine as _ };
use std::fmt;

use super::ChatError;

/// A `data:<mime>;base64,<payload>` URI, the form in which images and audio
/// travel between callers and the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    pub mime_type: String,
    /// Base64 payload, kept encoded since that is what the upstream wants.
    pub data: String,
}

impl DataUri {
    pub fn parse(uri: &str) -> Result<Self, ChatError> {
        let rest = uri
            .trim()
            .strip_prefix("data:")
            .ok_or_else(|| ChatError::InvalidDataUri("missing 'data:' scheme".to_string()))?;
        let (header, data) = rest
            .split_once(',')
            .ok_or_else(|| ChatError::InvalidDataUri("missing ',' separator".to_string()))?;
        let mime_type = header
            .strip_suffix(";base64")
            .ok_or_else(|| ChatError::InvalidDataUri("payload is not base64 encoded".to_string()))?;
        if mime_type.is_empty() || !mime_type.contains('/') {
            return Err(ChatError::InvalidDataUri(format!("bad mime type '{}'", mime_type)));
        }
        STANDARD.decode(data).map_err(|e| ChatError::InvalidDataUri(e.to_string()))?;

        Ok(Self { mime_type: mime_type.to_string(), data: data.to_string() })
    }

    pub fn from_bytes(mime_type: &str, bytes: &[u8]) -> Self {
        Self { mime_type: mime_type.to_string(), data: STANDARD.encode(bytes) }
    }

    pub fn decode(&self) -> Result<Vec<u8>, ChatError> {
        STANDARD.decode(&self.data).map_err(|e| ChatError::InvalidDataUri(e.to_string()))
    }
}

impl fmt::Display for DataUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data:{};base64,{}", self.mime_type, self.data)
    }
}

/// Image mime type for a file extension, if it is one the model accepts.
pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "heic" => Some("image/heic"),
        _ => None,
    }
}
