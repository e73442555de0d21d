use std::path::Path;

use anyhow::Result;

use crate::video::{stream_info, Frame, VideoInfo, VideoReader, VideoWriter};

/// A source of decoded luminance frames, in presentation order.
pub trait FrameSource {
    /// Next frame, or `None` once the stream has ended.
    fn read_frame(&mut self) -> Result<Option<Frame>>;
}

/// A destination for frames of one output video.
pub trait FrameSink {
    fn write_frame(&mut self, frame: &Frame) -> Result<()>;

    /// Finalize the output. Called once, including after early termination.
    fn finish(&mut self) -> Result<()>;
}

/// Opens the source and destination streams of one video.
///
/// Implement this to run the embedding channel against something other than
/// ffmpeg, e.g. in-memory frames in tests.
pub trait VideoBackend {
    type Source: FrameSource;
    type Sink: FrameSink;

    fn open_source(&self, path: &Path) -> Result<(Self::Source, VideoInfo)>;

    fn open_sink(&self, path: &Path, info: &VideoInfo) -> Result<Self::Sink>;
}

impl FrameSource for VideoReader {
    fn read_frame(&mut self) -> Result<Option<Frame>> {
        VideoReader::read_frame(self)
    }
}

impl FrameSink for VideoWriter {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        VideoWriter::write_frame(self, frame)
    }

    fn finish(&mut self) -> Result<()> {
        VideoWriter::finish(self)
    }
}

/// Reads and writes real video files through the ffmpeg CLI.
#[derive(Debug, Clone)]
pub struct FfmpegBackend {
    codec: String,
}

impl FfmpegBackend {
    pub fn new(codec: impl Into<String>) -> Self {
        Self {
            codec: codec.into(),
        }
    }
}

impl VideoBackend for FfmpegBackend {
    type Source = VideoReader;
    type Sink = VideoWriter;

    fn open_source(&self, path: &Path) -> Result<(VideoReader, VideoInfo)> {
        let info = stream_info(path)?;
        let reader = VideoReader::open(path, &info)?;
        Ok((reader, info))
    }

    fn open_sink(&self, path: &Path, info: &VideoInfo) -> Result<VideoWriter> {
        VideoWriter::create(path, info, &self.codec)
    }
}
