use std::fmt;

use clap::ValueEnum;
use thiserror::Error;

// Embedding parameters
pub const BLOCK_SIZE: usize = 8;
pub const DEFAULT_BLOCK_BUDGET: usize = 10;

// Largest sample value of an 8-bit luminance plane.
pub const MAX_SAMPLE_VALUE: f64 = 255.0;

// Bits reserved per ciphertext value. Must cover the curve's field size and the
// longest record's big-endian encoding.
pub const DEFAULT_BIT_WIDTH: usize = 512;

// Values per ciphertext tuple: C1.x, C1.y, C2
pub const VALUES_PER_TUPLE: usize = 3;

// Video parameters
pub const DEFAULT_VIDEO_EXTENSION: &str = "mp4";
pub const DEFAULT_OUTPUT_PREFIX: &str = "stego_";
pub const DEFAULT_OUTPUT_CODEC: &str = "ffv1";
pub const DEFAULT_OUTPUT_CONTAINER: &str = "mkv";

// Ciphertext export header
pub const CIPHERTEXT_HEADER: [&str; VALUES_PER_TUPLE] = ["C1_x", "C1_y", "C2"];

/// Named curves the encryptor can run over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CurveId {
    #[value(name = "secp256r1")]
    Secp256r1,
}

impl CurveId {
    /// Bit length of the curve's base field modulus.
    pub fn field_bits(self) -> usize {
        match self {
            CurveId::Secp256r1 => 256,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CurveId::Secp256r1 => "secp256r1",
        }
    }
}

impl fmt::Display for CurveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Order in which source videos drain the shared bit cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum VideoOrder {
    /// Sort by file name, byte-wise.
    Lexical,
    /// Keep the order the caller supplied.
    AsListed,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("bit width {width} is narrower than the {curve} field ({field_bits} bits)")]
    BitWidthTooNarrow {
        width: usize,
        curve: CurveId,
        field_bits: usize,
    },
    #[error("block size must be non-zero")]
    ZeroBlockSize,
    #[error("per-frame block budget must be non-zero")]
    ZeroBlockBudget,
}

/// Number of whole `block_size` blocks in a frame. Edge remainders are dropped.
pub fn blocks_per_frame(width: usize, height: usize, block_size: usize) -> usize {
    (width / block_size) * (height / block_size)
}

/// Length in bits of the packed payload for `records` ciphertext tuples.
pub fn bitstream_len(records: usize, bit_width: usize) -> usize {
    records * VALUES_PER_TUPLE * bit_width
}

/// Runtime configuration for an encryption/embedding run.
#[derive(Debug, Clone)]
pub struct StegoConfig {
    pub curve: CurveId,
    pub block_size: usize,
    pub block_budget: usize,
    pub bit_width: usize,
    pub video_order: VideoOrder,
    pub video_extension: String,
    pub output_prefix: String,
    pub output_codec: String,
    pub output_container: String,
}

impl Default for StegoConfig {
    fn default() -> Self {
        Self {
            curve: CurveId::Secp256r1,
            block_size: BLOCK_SIZE,
            block_budget: DEFAULT_BLOCK_BUDGET,
            bit_width: DEFAULT_BIT_WIDTH,
            video_order: VideoOrder::Lexical,
            video_extension: DEFAULT_VIDEO_EXTENSION.to_string(),
            output_prefix: DEFAULT_OUTPUT_PREFIX.to_string(),
            output_codec: DEFAULT_OUTPUT_CODEC.to_string(),
            output_container: DEFAULT_OUTPUT_CONTAINER.to_string(),
        }
    }
}

impl StegoConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let field_bits = self.curve.field_bits();
        if self.bit_width < field_bits {
            return Err(ConfigError::BitWidthTooNarrow {
                width: self.bit_width,
                curve: self.curve,
                field_bits,
            });
        }
        if self.block_size == 0 {
            return Err(ConfigError::ZeroBlockSize);
        }
        if self.block_budget == 0 {
            return Err(ConfigError::ZeroBlockBudget);
        }
        Ok(())
    }
}
