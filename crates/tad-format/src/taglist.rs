//! Tag lists (ordered key/value metadata attached to arrays, components and
//! dimensions) and their length-prefixed binary encoding.
//!
//! # Binary Layout
//!
//! - 1 `u64` (host byte order): length `N` of the following body in bytes
//! - `N` bytes: `key\0value\0` pairs in insertion order
//!
//! An empty tag list is encoded as a zero length prefix with no body.
//! Keys and values are UTF-8 text without ASCII control characters
//! (bytes below 32 and 127), so the NUL terminator is unambiguous.

use std::fmt;
use std::io::{self, Read, Write};
use std::str::FromStr;

use byteorder::{NativeEndian, ReadBytesExt, WriteBytesExt};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Result, TadError};

/// Size of the length prefix in front of every encoded tag list.
pub const TAG_LIST_PREFIX_SIZE: usize = 8;

/// An ordered list of unique string keys mapped to string values.
///
/// Unlike a map, the insertion order is part of the value: it is preserved
/// by the encoding and compared by `==`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagList {
    entries: Vec<(String, String)>,
}

impl TagList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of key/value pairs.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Set `key` to `value`.
    ///
    /// An existing key keeps its position and gets the new value; a new key
    /// is appended.
    ///
    /// # Errors
    ///
    /// Returns [`TadError::InvalidTagText`] if the key is empty or either
    /// string contains an ASCII control character.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<&mut Self> {
        let key = key.into();
        let value = value.into();
        validate_key(&key)?;
        validate_text(&value)?;
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
        Ok(self)
    }

    /// Remove `key`, returning its value if it was present.
    pub fn unset(&mut self, key: &str) -> Option<String> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Value of `key`, or `default` if the key is not set.
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Parse the value of `key` as `T`.
    ///
    /// Returns `None` if the key is missing or the value does not parse.
    pub fn get_parsed<T: FromStr>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|v| v.trim().parse().ok())
    }

    /// Iterate over `(key, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    // ---------------------------------------------------------------
    // Binary encoding
    // ---------------------------------------------------------------

    /// Length of the encoded body, excluding the 8-byte prefix.
    pub fn encoded_body_len(&self) -> u64 {
        self.entries
            .iter()
            .map(|(k, v)| (k.len() + 1 + v.len() + 1) as u64)
            .sum()
    }

    /// Write the length prefix and body to `writer`.
    pub fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u64::<NativeEndian>(self.encoded_body_len())?;
        for (key, value) in &self.entries {
            writer.write_all(key.as_bytes())?;
            writer.write_u8(0)?;
            writer.write_all(value.as_bytes())?;
            writer.write_u8(0)?;
        }
        Ok(())
    }

    /// Encode into a fresh byte vector (prefix included).
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(TAG_LIST_PREFIX_SIZE + self.encoded_body_len() as usize);
        self.encode(&mut buf).expect("write to Vec cannot fail");
        buf
    }

    /// Read one length-prefixed tag list from `reader`.
    ///
    /// A body longer than `allocation_limit` is rejected before anything is
    /// allocated for it.
    ///
    /// # Errors
    ///
    /// - [`TadError::Io`] if the length prefix itself cannot be read.
    /// - [`TadError::AllocationTooLarge`] if the declared length exceeds the
    ///   limit and that many bytes are actually present.
    /// - [`TadError::InvalidTagList`] / [`TadError::InvalidTagText`] if the body is
    ///   shorter than declared or malformed.
    pub fn decode<R: Read>(reader: &mut R, allocation_limit: u64) -> Result<Self> {
        let declared = reader.read_u64::<NativeEndian>()?;
        if declared > allocation_limit {
            // Only a body that is really there counts as too large; a
            // length running past the end of the input is corrupt data.
            let available = io::copy(&mut reader.by_ref().take(declared), &mut io::sink())?;
            if available != declared {
                return Err(short_body(declared, available));
            }
            return Err(TadError::AllocationTooLarge {
                requested: declared,
                limit: allocation_limit,
            });
        }

        let mut body = Vec::new();
        let available = reader.by_ref().take(declared).read_to_end(&mut body)? as u64;
        if available != declared {
            return Err(short_body(declared, available));
        }

        Self::decode_body(&body)
    }

    /// Decode a complete block (prefix and body), rejecting trailing bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut cursor = bytes;
        let list = Self::decode(&mut cursor, u64::MAX)?;
        if !cursor.is_empty() {
            return Err(TadError::InvalidTagList(format!(
                "{} trailing bytes after the declared body",
                cursor.len()
            )));
        }
        Ok(list)
    }

    /// Decode the key/value pairs of a body without its length prefix.
    pub fn decode_body(body: &[u8]) -> Result<Self> {
        let mut list = TagList::new();
        let mut rest = body;

        while !rest.is_empty() {
            let (key_bytes, after_key) = split_terminated(rest, "key")?;
            if after_key.is_empty() {
                return Err(TadError::InvalidTagList(format!(
                    "key {:?} has no value",
                    String::from_utf8_lossy(key_bytes)
                )));
            }
            let (value_bytes, after_value) = split_terminated(after_key, "value")?;

            let key = text_from_bytes(key_bytes)?;
            validate_key(&key)?;
            let value = text_from_bytes(value_bytes)?;
            if list.contains(&key) {
                return Err(TadError::InvalidTagList(format!("duplicate key {key:?}")));
            }
            list.entries.push((key, value));
            rest = after_value;
        }

        Ok(list)
    }
}

/// Split `bytes` at the first NUL, returning the text before it and the
/// remainder after it.
fn short_body(declared: u64, available: u64) -> TadError {
    TadError::InvalidTagList(format!(
        "declared {declared} bytes but only {available} are available"
    ))
}

fn split_terminated<'a>(bytes: &'a [u8], what: &str) -> Result<(&'a [u8], &'a [u8])> {
    let nul = bytes
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| TadError::InvalidTagList(format!("unterminated {what}")))?;
    Ok((&bytes[..nul], &bytes[nul + 1..]))
}

fn is_disallowed(b: u8) -> bool {
    b < 32 || b == 127
}

fn text_from_bytes(bytes: &[u8]) -> Result<String> {
    if bytes.iter().copied().any(is_disallowed) {
        return Err(TadError::InvalidTagText {
            text: String::from_utf8_lossy(bytes).into_owned(),
            reason: "contains an ASCII control character",
        });
    }
    String::from_utf8(bytes.to_vec()).map_err(|e| TadError::InvalidTagText {
        text: String::from_utf8_lossy(e.as_bytes()).into_owned(),
        reason: "is not valid UTF-8",
    })
}

fn validate_text(text: &str) -> Result<()> {
    if text.bytes().any(is_disallowed) {
        return Err(TadError::InvalidTagText {
            text: text.to_string(),
            reason: "contains an ASCII control character",
        });
    }
    Ok(())
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(TadError::InvalidTagText {
            text: String::new(),
            reason: "keys must not be empty",
        });
    }
    validate_text(key)
}

impl TryFrom<Vec<(String, String)>> for TagList {
    type Error = TadError;

    fn try_from(pairs: Vec<(String, String)>) -> Result<Self> {
        let mut list = TagList::new();
        for (k, v) in pairs {
            list.set(k, v)?;
        }
        Ok(list)
    }
}

// Serialized as a map so JSON output reads naturally; the serializer
// receives entries in insertion order.
impl Serialize for TagList {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for TagList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct TagListVisitor;

        impl<'de> Visitor<'de> for TagListVisitor {
            type Value = TagList;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of string tags")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<TagList, A::Error> {
                let mut list = TagList::new();
                while let Some((k, v)) = access.next_entry::<String, String>()? {
                    list.set(k, v).map_err(serde::de::Error::custom)?;
                }
                Ok(list)
            }
        }

        deserializer.deserialize_map(TagListVisitor)
    }
}
