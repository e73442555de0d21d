use std::io::Read;
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};

use anyhow::{Context, Result};
use log::{debug, warn};

use crate::video::frame::Frame;
use crate::video::process::{stderr_tail, with_tail, StderrTail};

/// Stream properties needed to read a video and write a matching one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoInfo {
    pub width: usize,
    pub height: usize,
    /// Frame rate as ffprobe reports it (e.g. `30/1`), passed back to ffmpeg as is.
    pub frame_rate: String,
    /// Container-reported frame count, when known.
    pub frame_count: Option<u64>,
}

/// Read the first video stream's geometry and timing with ffprobe.
pub fn stream_info(path: &Path) -> Result<VideoInfo> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height,r_frame_rate,nb_frames",
            "-of",
            "default=noprint_wrappers=1",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .context("failed to spawn ffprobe — is ffmpeg installed?")?;

    if !output.status.success() {
        anyhow::bail!(with_tail(
            format!("ffprobe exited with status: {}", output.status),
            &stderr_tail(&output.stderr),
        ));
    }

    let text = String::from_utf8_lossy(&output.stdout);
    parse_stream_info(&text).with_context(|| format!("unreadable stream info for {}", path.display()))
}

fn parse_stream_info(text: &str) -> Result<VideoInfo> {
    let mut width = None;
    let mut height = None;
    let mut frame_rate = None;
    let mut frame_count = None;

    for line in text.lines() {
        let Some((key, value)) = line.trim().split_once('=') else {
            continue;
        };
        match key {
            "width" => width = value.parse::<usize>().ok(),
            "height" => height = value.parse::<usize>().ok(),
            "r_frame_rate" => frame_rate = Some(value.to_string()),
            "nb_frames" => frame_count = value.parse::<u64>().ok(),
            _ => {}
        }
    }

    let width = width.context("no video stream width")?;
    let height = height.context("no video stream height")?;
    if width == 0 || height == 0 {
        anyhow::bail!("video stream has empty dimensions {}x{}", width, height);
    }

    Ok(VideoInfo {
        width,
        height,
        frame_rate: frame_rate.unwrap_or_else(|| "30/1".to_string()),
        frame_count,
    })
}

/// Streams 8-bit luminance frames out of a video through an ffmpeg child.
///
/// End of stream is only clean if ffmpeg also exits successfully; a decoder
/// that dies between frames surfaces as an error on the final read. The
/// child is killed and reaped on drop, so early termination still releases
/// it.
pub struct VideoReader {
    child: Child,
    stdout: ChildStdout,
    stderr: StderrTail,
    width: usize,
    height: usize,
    expected_frames: Option<u64>,
    frames_read: u64,
    finished: bool,
}

impl VideoReader {
    pub fn open(path: &Path, info: &VideoInfo) -> Result<Self> {
        let mut command = Command::new("ffmpeg");
        command
            .args(["-v", "error", "-i"])
            .arg(path)
            .args(["-f", "rawvideo", "-pix_fmt", "gray", "pipe:1"]);

        let reader = Self::spawn(command, info).context("failed to spawn ffmpeg for decoding")?;
        debug!("opened decoder for {} ({}x{})", path.display(), info.width, info.height);
        Ok(reader)
    }

    /// Run `command` as the decoder. It must write raw gray frames of
    /// `info`'s size to stdout.
    fn spawn(mut command: Command, info: &VideoInfo) -> Result<Self> {
        let mut child = command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdout = match child.stdout.take() {
            Some(stdout) => stdout,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                anyhow::bail!("ffmpeg decoder has no stdout pipe");
            }
        };
        let stderr = StderrTail::capture(&mut child);

        Ok(Self {
            child,
            stdout,
            stderr,
            width: info.width,
            height: info.height,
            expected_frames: info.frame_count,
            frames_read: 0,
            finished: false,
        })
    }

    /// Next frame, or `None` at a clean end of stream.
    pub fn read_frame(&mut self) -> Result<Option<Frame>> {
        if self.finished {
            return Ok(None);
        }
        let mut buf = vec![0u8; self.width * self.height];
        if !read_exact_or_eof(&mut self.stdout, &mut buf)
            .with_context(|| format!("failed to read frame {}", self.frames_read))?
        {
            self.finished = true;
            self.check_exit()?;
            return Ok(None);
        }
        self.frames_read += 1;
        // buffer length is width * height by construction
        Ok(Frame::from_pixels(self.width, self.height, buf))
    }

    /// Reap ffmpeg after its output closed and fail unless it exited cleanly.
    fn check_exit(&mut self) -> Result<()> {
        let status = self.child.wait().context("ffmpeg decoder failed")?;
        let tail = self.stderr.collect();
        if !status.success() {
            anyhow::bail!(with_tail(
                format!(
                    "ffmpeg decoder failed after {} frames ({})",
                    self.frames_read, status
                ),
                &tail,
            ));
        }
        if let Some(expected) = self.expected_frames {
            if self.frames_read < expected {
                warn!(
                    "decoder ended after {} of {} reported frames",
                    self.frames_read, expected
                );
            }
        }
        Ok(())
    }
}

impl Drop for VideoReader {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// Read exactly `buf.len()` bytes, returning Ok(false) on clean EOF.
fn read_exact_or_eof(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => {
                if filled == 0 {
                    return Ok(false);
                } else {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "partial frame read",
                    ));
                }
            }
            Ok(n) => filled += n,
            Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(true)
}
