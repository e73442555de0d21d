pub mod bitstream;
pub mod config;
pub mod crypto;
pub mod pipeline;
pub mod quality;
pub mod records;
pub mod video;

pub use bitstream::{pack, BitCursor, BitLocation, Bitstream, PackError};
pub use config::{CurveId, StegoConfig, VideoOrder};
pub use crypto::{CipherTuple, CryptoError, KeyPair, RecordEncryptor};
pub use pipeline::backend::{FfmpegBackend, FrameSink, FrameSource, VideoBackend};
pub use pipeline::embed::{embed_videos, FrameChannel, FrameStats, VideoReport, VideoStatus};
pub use pipeline::{embed_file, embed_tuples, encrypt_file, RunReport};
pub use quality::{psnr, ShapeError};
pub use video::{Block, Frame, VideoInfo};
