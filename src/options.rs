//! File-format configuration.
//!
//! [`FormatOptions`] carries the values written into a new file's header.
//! It can be built in code or loaded from TOML:
//!
//! ```toml
//! block_size = 4096
//! key_tree_min = 64
//! value_rev_tree_min = 32
//! compression = "lzw"
//! lzw_code_bits = 12
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::compression::{lzw, CompressionCodec};
use crate::format::FileHeader;
use crate::primitives::block::MIN_BLOCK_SIZE;
use crate::types::RecordPtr;

/// Default block size in bytes.
pub const DEFAULT_BLOCK_SIZE: u32 = 4096;
/// Default key-tree minimum fan-out.
pub const DEFAULT_KEY_TREE_MIN: u32 = 64;
/// Default value-revision-tree minimum fan-out.
pub const DEFAULT_VALUE_REV_TREE_MIN: u32 = 32;

/// Format parameters for a store file.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FormatOptions {
    /// Physical block size, checksum trailer included.
    pub block_size: u32,
    /// Minimum fan-out of the key tree.
    pub key_tree_min: u32,
    /// Minimum fan-out of value-revision trees.
    pub value_rev_tree_min: u32,
    /// Codec applied to value records.
    pub compression: CompressionCodec,
    /// LZW code width; ignored unless `compression` is LZW.
    pub lzw_code_bits: u8,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            key_tree_min: DEFAULT_KEY_TREE_MIN,
            value_rev_tree_min: DEFAULT_VALUE_REV_TREE_MIN,
            compression: CompressionCodec::None,
            lzw_code_bits: lzw::DEFAULT_CODE_BITS,
        }
    }
}

impl FormatOptions {
    /// Sets the block size.
    pub fn block_size(mut self, block_size: u32) -> Self {
        self.block_size = block_size;
        self
    }

    /// Sets the key-tree minimum fan-out.
    pub fn key_tree_min(mut self, min: u32) -> Self {
        self.key_tree_min = min;
        self
    }

    /// Sets the value-revision-tree minimum fan-out.
    pub fn value_rev_tree_min(mut self, min: u32) -> Self {
        self.value_rev_tree_min = min;
        self
    }

    /// Sets the value codec.
    pub fn compression(mut self, codec: CompressionCodec) -> Self {
        self.compression = codec;
        self
    }

    /// Sets the LZW code width.
    pub fn lzw_code_bits(mut self, bits: u8) -> Self {
        self.lzw_code_bits = bits;
        self
    }

    /// Checks every field against what the format can represent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.block_size < MIN_BLOCK_SIZE {
            return Err(ConfigError::Invalid {
                field: "block_size",
                reason: format!("must be at least {MIN_BLOCK_SIZE}"),
            });
        }
        if self.key_tree_min < 2 {
            return Err(ConfigError::Invalid {
                field: "key_tree_min",
                reason: "must be at least 2".to_string(),
            });
        }
        if self.value_rev_tree_min < 2 {
            return Err(ConfigError::Invalid {
                field: "value_rev_tree_min",
                reason: "must be at least 2".to_string(),
            });
        }
        if self.compression == CompressionCodec::Lzw
            && lzw::check_code_bits(self.lzw_code_bits).is_err()
        {
            return Err(ConfigError::Invalid {
                field: "lzw_code_bits",
                reason: format!(
                    "must be within {}..={}",
                    lzw::MIN_CODE_BITS,
                    lzw::MAX_CODE_BITS
                ),
            });
        }
        Ok(())
    }

    /// Parses and validates options from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let opts: Self = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: None,
            source,
        })?;
        opts.validate()?;
        Ok(opts)
    }

    /// Reads options from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let opts: Self = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: Some(path.to_path_buf()),
            source,
        })?;
        opts.validate()?;
        Ok(opts)
    }

    /// Renders these options as TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|source| ConfigError::Serialize { source })
    }
}

impl FileHeader {
    /// Header for a file created with `opts`, pointing at `tail`.
    pub fn from_options(opts: &FormatOptions, tail: RecordPtr) -> Self {
        let compressed = opts.compression != CompressionCodec::None;
        Self {
            tail,
            key_tree_min: opts.key_tree_min,
            value_rev_tree_min: opts.value_rev_tree_min,
            value_compressed: u8::from(compressed),
            compression_codec: opts.compression.as_u8(),
            block_size: opts.block_size,
        }
    }
}

/// Errors raised while loading [`FormatOptions`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read format config {path}: {source}")]
    Read {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// The TOML did not parse.
    #[error("failed to parse format config{}: {source}", display_path(.path))]
    Parse {
        /// File that failed, when the text came from one.
        path: Option<PathBuf>,
        /// Underlying error.
        source: toml::de::Error,
    },
    /// Options could not be rendered.
    #[error("failed to serialize format config: {source}")]
    Serialize {
        /// Underlying error.
        source: toml::ser::Error,
    },
    /// A field is out of range.
    #[error("format option '{field}' {reason}")]
    Invalid {
        /// Offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

fn display_path(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => format!(" {}", path.display()),
        None => String::new(),
    }
}
