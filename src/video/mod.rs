pub mod decoder;
pub mod encoder;
pub mod frame;
pub mod lsb;
mod process;
pub mod select;

pub use decoder::{stream_info, VideoInfo, VideoReader};
pub use encoder::VideoWriter;
pub use frame::{Block, Frame};
