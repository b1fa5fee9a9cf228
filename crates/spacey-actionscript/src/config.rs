//! Compile options.
//!
//! The target VM version and the string encoding are fixed for a whole
//! compilation: both feed the byte-length arithmetic behind every branch
//! offset.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CompileError, Result};

/// Oldest VM version the lowering rules support.
pub const MIN_VERSION: u8 = 5;

/// Options for a single compilation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Target VM version
    pub version: u8,

    /// Encoding used for string literals
    pub encoding: StringEncoding,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            version: 6,
            encoding: StringEncoding::Utf8,
        }
    }
}

impl CompileOptions {
    /// Options for the given version with the default encoding.
    pub fn for_version(version: u8) -> Self {
        Self {
            version,
            ..Self::default()
        }
    }

    /// Builder-style encoding override.
    pub fn with_encoding(mut self, encoding: StringEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Reject configurations the engine cannot lower for.
    pub fn validate(&self) -> Result<()> {
        if self.version < MIN_VERSION {
            return Err(CompileError::UnsupportedVersion(self.version));
        }
        Ok(())
    }

    /// Encoded length of a NUL-terminated string.
    pub fn c_string_len(&self, text: &str) -> Result<usize> {
        Ok(self.encoding.encode(text)?.len() + 1)
    }
}

/// String encodings the encoder can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StringEncoding {
    /// UTF-8 (version 6 and later players)
    #[serde(rename = "UTF-8", alias = "utf8", alias = "utf-8")]
    Utf8,
    /// ISO-8859-1
    #[serde(rename = "ISO-8859-1", alias = "latin1", alias = "iso-8859-1")]
    Latin1,
}

impl StringEncoding {
    /// Canonical name
    pub fn name(self) -> &'static str {
        match self {
            StringEncoding::Utf8 => "UTF-8",
            StringEncoding::Latin1 => "ISO-8859-1",
        }
    }

    /// Encode `text`, failing on characters the encoding cannot represent.
    pub fn encode<'a>(self, text: &'a str) -> Result<Cow<'a, [u8]>> {
        match self {
            StringEncoding::Utf8 => Ok(Cow::Borrowed(text.as_bytes())),
            StringEncoding::Latin1 => {
                if text.is_ascii() {
                    return Ok(Cow::Borrowed(text.as_bytes()));
                }
                text.chars()
                    .map(|c| u8::try_from(u32::from(c)).ok())
                    .collect::<Option<Vec<u8>>>()
                    .map(Cow::Owned)
                    .ok_or_else(|| CompileError::Encoding {
                        text: text.to_string(),
                        encoding: self.name(),
                    })
            }
        }
    }
}

impl fmt::Display for StringEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StringEncoding {
    type Err = CompileError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(StringEncoding::Utf8),
            "iso-8859-1" | "latin1" | "latin-1" => Ok(StringEncoding::Latin1),
            _ => Err(CompileError::UnknownEncoding(s.to_string())),
        }
    }
}
