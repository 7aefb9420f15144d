use std::fmt;
use std::str::FromStr;

use stowage_store::{BlobId, StoreError, StoreResult};

/// Textual content identifier as produced by the pinning cluster.
///
/// The store hands out the UTF-8 bytes of this text as the [`BlobId`], which
/// the cluster's read API accepts as-is. Only the shape is checked: it must
/// be non-empty and use the characters of the multibase encodings (base58,
/// base32/36, base64 and base64url). The cluster is the authority on whether
/// the identifier names real content.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentId(String);

impl ContentId {
    pub fn parse(text: &str) -> StoreResult<Self> {
        if text.is_empty() {
            return Err(StoreError::invalid_identifier("empty content identifier"));
        }
        if let Some(bad) = text.chars().find(|c| !is_multibase_char(*c)) {
            return Err(StoreError::invalid_identifier(format!(
                "content identifier {text:?} contains {bad:?}"
            )));
        }
        Ok(Self(text.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_blob_id(&self) -> BlobId {
        BlobId::new(self.0.as_bytes().to_vec())
    }

    pub fn from_blob_id(id: &BlobId) -> StoreResult<Self> {
        let text = std::str::from_utf8(id.as_bytes()).map_err(|e| {
            StoreError::invalid_identifier(format!("content identifier is not UTF-8: {e}"))
        })?;
        Self::parse(text)
    }
}

fn is_multibase_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+' | '/' | '=')
}

impl FromStr for ContentId {
    type Err = StoreError;

    fn from_str(s: &str) -> StoreResult<Self> {
        Self::parse(s)
    }
}

impl fmt::Debug for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentId({})", self.0)
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
