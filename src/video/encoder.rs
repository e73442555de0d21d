use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use anyhow::{Context, Result};
use log::{debug, info};

use crate::video::decoder::VideoInfo;
use crate::video::frame::Frame;
use crate::video::process::{with_tail, StderrTail};

/// Pipes 8-bit luminance frames into an ffmpeg child that writes `path`.
///
/// Resolution and frame rate are taken from the source's [`VideoInfo`].
/// Call [`finish`](Self::finish) to flush and check ffmpeg's exit status; a
/// writer dropped without finishing kills its child.
pub struct VideoWriter {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr: StderrTail,
    path: PathBuf,
    width: usize,
    height: usize,
    frames_written: u64,
}

impl VideoWriter {
    pub fn create(path: &Path, info: &VideoInfo, codec: &str) -> Result<Self> {
        // Fail before spawning if the destination cannot be created.
        File::create(path)
            .with_context(|| format!("output {} is not writable", path.display()))?;

        let mut child = Command::new("ffmpeg")
            .args([
                "-y",
                "-v",
                "error",
                "-f",
                "rawvideo",
                "-pix_fmt",
                "gray",
                "-video_size",
                &format!("{}x{}", info.width, info.height),
                "-framerate",
                &info.frame_rate,
                "-i",
                "pipe:0",
                "-c:v",
                codec,
            ])
            .arg(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .context("failed to spawn ffmpeg process — is ffmpeg installed?")?;

        let stdin = match child.stdin.take() {
            Some(stdin) => stdin,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                anyhow::bail!("ffmpeg encoder has no stdin pipe");
            }
        };
        let stderr = StderrTail::capture(&mut child);

        debug!(
            "opened encoder for {} ({}x{} @ {}, {})",
            path.display(),
            info.width,
            info.height,
            info.frame_rate,
            codec
        );
        Ok(Self {
            child: Some(child),
            stdin: Some(stdin),
            stderr,
            path: path.to_path_buf(),
            width: info.width,
            height: info.height,
            frames_written: 0,
        })
    }

    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        if frame.width() != self.width || frame.height() != self.height {
            anyhow::bail!(
                "frame is {}x{}, stream is {}x{}",
                frame.width(),
                frame.height(),
                self.width,
                self.height
            );
        }
        let stdin = self
            .stdin
            .as_mut()
            .context("encoder input already closed")?;
        stdin
            .write_all(frame.pixels())
            .context("failed to write frame data to ffmpeg")?;
        self.frames_written += 1;
        Ok(())
    }

    /// Close ffmpeg's input and wait for it to finalize the file.
    pub fn finish(&mut self) -> Result<()> {
        drop(self.stdin.take());
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let status = child.wait().context("ffmpeg process failed")?;
        let tail = self.stderr.collect();
        if !status.success() {
            anyhow::bail!(with_tail(
                format!("ffmpeg exited with status: {}", status),
                &tail
            ));
        }
        info!(
            "video encoding complete: {} ({} frames)",
            self.path.display(),
            self.frames_written
        );
        Ok(())
    }
}

impl Drop for VideoWriter {
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}
