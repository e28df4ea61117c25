//! Object identifiers
//!
//! Hex object names as they appear in the stream, either 40 (SHA-1) or
//! 64 (SHA-256) characters. They are produced by the object hasher
//! collaborator or referenced directly by `from`, `merge` and `M` lines.

use crate::artifacts::objects::{SHA1_HEX_LENGTH, SHA256_HEX_LENGTH};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct ObjectId(String);

impl ObjectId {
    /// Parse and validate an object ID
    ///
    /// # Arguments
    ///
    /// * `id` - 40 or 64 hexadecimal characters
    ///
    /// # Returns
    ///
    /// Validated ObjectId or error if invalid length/characters
    pub fn try_parse(id: &[u8]) -> anyhow::Result<Self> {
        if !Self::is_object_id(id) {
            anyhow::bail!("invalid object ID: {}", bstr::BStr::new(id));
        }
        Ok(Self(id.iter().map(|&b| char::from(b)).collect()))
    }

    /// Whether `id` has the shape of a full hex object name
    pub fn is_object_id(id: &[u8]) -> bool {
        (id.len() == SHA1_HEX_LENGTH || id.len() == SHA256_HEX_LENGTH)
            && id.iter().all(u8::is_ascii_hexdigit)
    }

    /// Get abbreviated form of the object ID
    ///
    /// # Returns
    ///
    /// First 7 characters of the hash
    pub fn to_short_oid(&self) -> String {
        self.0.split_at(7).0.to_string()
    }
}

impl AsRef<str> for ObjectId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
