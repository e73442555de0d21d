use std::collections::HashMap;
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};

use crate::bitstream::{BitCursor, BitLocation, Bitstream};
use crate::config;
use crate::pipeline::backend::{FrameSink, FrameSource, VideoBackend};
use crate::video::frame::Frame;
use crate::video::lsb;
use crate::video::select::select_blocks;

/// Counters for one embedded frame.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FrameStats {
    pub blocks_selected: usize,
    pub bits_written: usize,
    pub samples_changed: usize,
}

/// How processing of one video ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoStatus {
    /// Every frame was read, embedded and written.
    Embedded,
    /// Reading or writing stopped mid-stream; the frames before the failure
    /// were finalized.
    Partial(String),
    /// The source or destination could not be opened. No bits were consumed.
    Skipped(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoReport {
    pub source: PathBuf,
    pub output: PathBuf,
    pub status: VideoStatus,
    pub frames_written: u64,
    pub bits_written: usize,
    pub samples_changed: usize,
}

/// Drains one bitstream into frames, in order, across every video of a run.
///
/// Owns the run's only [`BitCursor`]: bits are assigned to blocks in the
/// order frames and videos are fed in, so that order is part of the output.
pub struct FrameChannel<'a> {
    stream: &'a Bitstream,
    cursor: BitCursor,
    block_size: usize,
    block_budget: usize,
}

impl<'a> FrameChannel<'a> {
    pub fn new(stream: &'a Bitstream, block_size: usize, block_budget: usize) -> Self {
        Self {
            stream,
            cursor: BitCursor::new(),
            block_size,
            block_budget,
        }
    }

    pub fn cursor(&self) -> BitCursor {
        self.cursor
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor.is_exhausted(self.stream)
    }

    /// Tuple, value and offset of the next bit to be written.
    pub fn next_location(&self) -> Option<BitLocation> {
        self.stream.locate(self.cursor.position())
    }

    /// Select this frame's `block_budget` darkest blocks and write one bit
    /// into each while the bitstream lasts. Once it is drained the blocks are
    /// still selected but the frame is left untouched.
    pub fn embed_frame(&mut self, frame: &mut Frame) -> FrameStats {
        let blocks = select_blocks(frame, self.block_size, self.block_budget);
        let mut stats = FrameStats {
            blocks_selected: blocks.len(),
            ..Default::default()
        };

        for mut block in blocks {
            let Some(bit) = self.cursor.next_bit(self.stream) else {
                break;
            };
            if lsb::embed_bit(&mut block, bit) {
                frame.put_block(&block);
                stats.samples_changed += 1;
            }
            stats.bits_written += 1;
        }

        stats
    }

    /// Stream every frame of `source` through [`embed_frame`](Self::embed_frame)
    /// into `sink`. The sink is finalized whether or not the stream ended
    /// cleanly, and both ends are dropped before returning.
    pub fn embed_video<S: FrameSource, K: FrameSink>(
        &mut self,
        mut source: S,
        mut sink: K,
        progress: &ProgressBar,
    ) -> (VideoStatus, u64, FrameStats) {
        let mut frames_written = 0u64;
        let mut totals = FrameStats::default();
        let mut status = VideoStatus::Embedded;

        loop {
            let mut frame = match source.read_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => {
                    warn!("failed to read frame {}: {:#}", frames_written, e);
                    status = VideoStatus::Partial(format!(
                        "read failed at frame {}: {:#}",
                        frames_written, e
                    ));
                    break;
                }
            };

            let stats = self.embed_frame(&mut frame);
            debug!(
                "frame {}: {} blocks, {} bits, {} samples changed",
                frames_written, stats.blocks_selected, stats.bits_written, stats.samples_changed
            );
            totals.blocks_selected += stats.blocks_selected;
            totals.bits_written += stats.bits_written;
            totals.samples_changed += stats.samples_changed;

            if let Err(e) = sink.write_frame(&frame) {
                warn!("failed to write frame {}: {:#}", frames_written, e);
                status = VideoStatus::Partial(format!(
                    "write failed at frame {}: {:#}",
                    frames_written, e
                ));
                break;
            }
            frames_written += 1;
            progress.inc(1);
        }

        if let Err(e) = sink.finish() {
            warn!("failed to finalize output: {:#}", e);
            if status == VideoStatus::Embedded {
                status = VideoStatus::Partial(format!("finalize failed: {:#}", e));
            }
        }

        (status, frames_written, totals)
    }
}

/// Embed `stream` across `jobs` in the given order, writing each source to
/// its paired output. A video whose source or destination cannot be opened
/// is skipped and the run moves on to the next, as is one whose output was
/// already claimed earlier in the run.
pub fn embed_videos<B: VideoBackend>(
    backend: &B,
    stream: &Bitstream,
    jobs: &[(PathBuf, PathBuf)],
    block_size: usize,
    block_budget: usize,
) -> (Vec<VideoReport>, BitCursor) {
    let mut channel = FrameChannel::new(stream, block_size, block_budget);
    let mut reports = Vec::with_capacity(jobs.len());
    let mut claimed: HashMap<&Path, &Path> = HashMap::new();

    for (source_path, output) in jobs {
        let report = match claimed.get(output.as_path()) {
            Some(first) => VideoReport {
                source: source_path.clone(),
                output: output.clone(),
                status: VideoStatus::Skipped(format!(
                    "output already written for {}",
                    first.display()
                )),
                frames_written: 0,
                bits_written: 0,
                samples_changed: 0,
            },
            None => {
                claimed.insert(output.as_path(), source_path.as_path());
                embed_one(backend, &mut channel, source_path, output.clone())
            }
        };
        match &report.status {
            VideoStatus::Embedded => info!(
                "PASS {}: {} frames, {} bits -> {}",
                report.source.display(),
                report.frames_written,
                report.bits_written,
                report.output.display()
            ),
            VideoStatus::Partial(reason) => warn!(
                "PARTIAL {}: {} frames, {} bits -> {} ({})",
                report.source.display(),
                report.frames_written,
                report.bits_written,
                report.output.display(),
                reason
            ),
            VideoStatus::Skipped(reason) => {
                warn!("SKIP {}: {}", report.source.display(), reason)
            }
        }
        reports.push(report);
    }

    (reports, channel.cursor())
}

fn embed_one<B: VideoBackend>(
    backend: &B,
    channel: &mut FrameChannel<'_>,
    source_path: &Path,
    output: PathBuf,
) -> VideoReport {
    let skipped = |reason: String| VideoReport {
        source: source_path.to_path_buf(),
        output: output.clone(),
        status: VideoStatus::Skipped(reason),
        frames_written: 0,
        bits_written: 0,
        samples_changed: 0,
    };

    let (source, info) = match backend.open_source(source_path) {
        Ok(opened) => opened,
        Err(e) => return skipped(format!("could not open source: {:#}", e)),
    };
    let sink = match backend.open_sink(&output, &info) {
        Ok(sink) => sink,
        Err(e) => return skipped(format!("could not open output: {:#}", e)),
    };

    info!(
        "embedding into {} ({}x{} @ {}, {} candidate blocks/frame), cursor at bit {}",
        source_path.display(),
        info.width,
        info.height,
        info.frame_rate,
        config::blocks_per_frame(info.width, info.height, channel.block_size),
        channel.cursor().position()
    );
    if let Some(loc) = channel.next_location() {
        debug!(
            "next bit: tuple {} value {} offset {}",
            loc.tuple, loc.field, loc.offset
        );
    }

    let progress = match info.frame_count {
        Some(n) => {
            let pb = ProgressBar::new(n);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} frames ({eta})")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("##-"),
            );
            pb
        }
        None => ProgressBar::new_spinner(),
    };

    let (status, frames_written, totals) = channel.embed_video(source, sink, &progress);
    progress.finish_and_clear();

    VideoReport {
        source: source_path.to_path_buf(),
        output,
        status,
        frames_written,
        bits_written: totals.bits_written,
        samples_changed: totals.samples_changed,
    }
}
