use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::Result;

use vidcloak::config::{bitstream_len, CurveId, VideoOrder};
use vidcloak::pipeline::{embed_tuples, encrypt_records};
use vidcloak::quality::psnr;
use vidcloak::video::lsb::extract_bit;
use vidcloak::video::select::select_blocks;
use vidcloak::{
    embed_videos, Frame, FrameSink, FrameSource, StegoConfig, VideoBackend, VideoInfo, VideoStatus,
};

type Outputs = Rc<RefCell<HashMap<PathBuf, Vec<Frame>>>>;

/// Frames held in memory, with optional failures injected per video.
#[derive(Default)]
struct MemoryBackend {
    videos: HashMap<PathBuf, Vec<Frame>>,
    unreadable: HashSet<PathBuf>,
    fail_read_at: HashMap<PathBuf, usize>,
    outputs: Outputs,
}

struct MemorySource {
    frames: std::vec::IntoIter<Frame>,
    index: usize,
    fail_at: Option<usize>,
}

impl FrameSource for MemorySource {
    fn read_frame(&mut self) -> Result<Option<Frame>> {
        if Some(self.index) == self.fail_at {
            anyhow::bail!("corrupt frame");
        }
        self.index += 1;
        Ok(self.frames.next())
    }
}

struct MemorySink {
    path: PathBuf,
    frames: Vec<Frame>,
    outputs: Outputs,
}

impl FrameSink for MemorySink {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.frames.push(frame.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.outputs
            .borrow_mut()
            .insert(self.path.clone(), std::mem::take(&mut self.frames));
        Ok(())
    }
}

impl VideoBackend for MemoryBackend {
    type Source = MemorySource;
    type Sink = MemorySink;

    fn open_source(&self, path: &Path) -> Result<(MemorySource, VideoInfo)> {
        if self.unreadable.contains(path) {
            anyhow::bail!("cannot open {}", path.display());
        }
        let frames = self
            .videos
            .get(path)
            .ok_or_else(|| anyhow::anyhow!("no such video"))?
            .clone();
        let info = VideoInfo {
            width: frames[0].width(),
            height: frames[0].height(),
            frame_rate: "30/1".into(),
            frame_count: Some(frames.len() as u64),
        };
        Ok((
            MemorySource {
                frames: frames.into_iter(),
                index: 0,
                fail_at: self.fail_read_at.get(path).copied(),
            },
            info,
        ))
    }

    fn open_sink(&self, path: &Path, _info: &VideoInfo) -> Result<MemorySink> {
        Ok(MemorySink {
            path: path.to_path_buf(),
            frames: Vec::new(),
            outputs: Rc::clone(&self.outputs),
        })
    }
}

/// Deterministic textured frame so block ranking is not all ties.
fn textured_frame(width: usize, height: usize, seed: usize) -> Frame {
    let pixels = (0..width * height)
        .map(|i| ((i * 31 + seed * 17 + (i / width) * 7) % 256) as u8)
        .collect();
    Frame::from_pixels(width, height, pixels).unwrap()
}

fn video(frames: usize, seed: usize) -> Vec<Frame> {
    (0..frames).map(|f| textured_frame(64, 64, seed + f)).collect()
}

fn config(bit_width: usize) -> StegoConfig {
    StegoConfig {
        curve: CurveId::Secp256r1,
        block_budget: 10,
        bit_width,
        video_order: VideoOrder::Lexical,
        ..Default::default()
    }
}

fn changed_samples(a: &Frame, b: &Frame) -> usize {
    a.pixels()
        .iter()
        .zip(b.pixels())
        .filter(|(x, y)| x != y)
        .count()
}

#[test]
fn two_records_in_a_ten_frame_video_are_truncated_at_100_bits() {
    let cfg = config(256);
    let tuples = encrypt_records(&["r1", "r2"], &cfg).unwrap();

    let source = PathBuf::from("/videos/video1.mp4");
    let mut backend = MemoryBackend::default();
    backend.videos.insert(source.clone(), video(10, 0));

    let out_dir = Path::new("/out");
    let report = embed_tuples(&backend, &tuples, &[source.clone()], out_dir, &cfg).unwrap();

    assert_eq!(report.bitstream_len, bitstream_len(2, 256));
    assert_eq!(report.bitstream_len, 1536);
    assert_eq!(report.bits_written, 100);
    assert!(report.truncated());
    assert_eq!(report.videos.len(), 1);
    assert_eq!(report.videos[0].status, VideoStatus::Embedded);
    assert_eq!(report.videos[0].frames_written, 10);
    assert_eq!(report.videos[0].bits_written, 100);

    let outputs = backend.outputs.borrow();
    let written = &outputs[&PathBuf::from("/out/stego_video1.mkv")];
    assert_eq!(written.len(), 10);
    for (orig, stego) in backend.videos[&source].iter().zip(written) {
        assert_eq!((stego.width(), stego.height()), (64, 64));
        assert!(changed_samples(orig, stego) <= 10);
        assert!(psnr(orig, stego).unwrap() > 40.0);
    }
}

#[test]
fn embedded_bits_follow_the_packed_stream() {
    let cfg = config(256);
    let tuples = encrypt_records(&["hello"], &cfg).unwrap();
    let stream = vidcloak::pack(&tuples, 256).unwrap();

    let source = PathBuf::from("/v/a.mp4");
    let mut backend = MemoryBackend::default();
    backend.videos.insert(source.clone(), video(3, 5));

    embed_tuples(&backend, &tuples, &[source.clone()], Path::new("/o"), &cfg).unwrap();

    let outputs = backend.outputs.borrow();
    let written = &outputs[&PathBuf::from("/o/stego_a.mkv")];
    let mut index = 0;
    for (orig, stego) in backend.videos[&source].iter().zip(written) {
        // blocks are ranked on the frame as decoded, before any bit lands
        for block in select_blocks(orig, 8, 10) {
            let carried = extract_bit(&stego.block(block.x, block.y, 8));
            assert_eq!(Some(carried), stream.bit(index));
            index += 1;
        }
    }
    assert_eq!(index, 30);
}

#[test]
fn cursor_is_global_across_videos_and_stops_when_drained() {
    let cfg = config(256);
    // 768 bits: 500 go to video1, 268 to video2
    let tuples = encrypt_records(&["x"], &cfg).unwrap();

    let first = PathBuf::from("/v/video1.mp4");
    let second = PathBuf::from("/v/video2.mp4");
    let mut backend = MemoryBackend::default();
    backend.videos.insert(first.clone(), video(50, 0));
    backend.videos.insert(second.clone(), video(50, 100));

    // Listed out of order; lexical policy puts video1 first.
    let report = embed_tuples(
        &backend,
        &tuples,
        &[second.clone(), first.clone()],
        Path::new("/o"),
        &cfg,
    )
    .unwrap();

    assert_eq!(report.bits_written, 768);
    assert!(!report.truncated());
    assert_eq!(report.videos[0].source, first);
    assert_eq!(report.videos[0].bits_written, 500);
    assert_eq!(report.videos[1].bits_written, 268);

    let outputs = backend.outputs.borrow();
    let written = &outputs[&PathBuf::from("/o/stego_video2.mkv")];
    // frame 26 of video2 takes the last 8 bits; nothing after it changes
    for (i, (orig, stego)) in backend.videos[&second].iter().zip(written).enumerate() {
        if i >= 27 {
            assert_eq!(orig, stego, "frame {} modified after drain", i);
        }
    }
}

#[test]
fn unreadable_video_is_skipped_and_run_continues() {
    let cfg = config(256);
    let tuples = encrypt_records(&["a", "b"], &cfg).unwrap();

    let broken = PathBuf::from("/v/video1.mp4");
    let good = PathBuf::from("/v/video2.mp4");
    let mut backend = MemoryBackend::default();
    backend.videos.insert(broken.clone(), video(4, 0));
    backend.videos.insert(good.clone(), video(4, 9));
    backend.unreadable.insert(broken.clone());

    let report = embed_tuples(
        &backend,
        &tuples,
        &[broken.clone(), good.clone()],
        Path::new("/o"),
        &cfg,
    )
    .unwrap();

    assert!(matches!(report.videos[0].status, VideoStatus::Skipped(_)));
    assert_eq!(report.videos[0].bits_written, 0);
    assert_eq!(report.videos[1].status, VideoStatus::Embedded);
    // the skipped video consumed nothing, so the good one starts at bit 0
    assert_eq!(report.bits_written, 40);
}

#[test]
fn read_failure_mid_stream_keeps_partial_output() {
    let cfg = config(256);
    let tuples = encrypt_records(&["a"], &cfg).unwrap();

    let flaky = PathBuf::from("/v/video1.mp4");
    let next = PathBuf::from("/v/video2.mp4");
    let mut backend = MemoryBackend::default();
    backend.videos.insert(flaky.clone(), video(6, 0));
    backend.videos.insert(next.clone(), video(2, 3));
    backend.fail_read_at.insert(flaky.clone(), 3);

    let report =
        embed_tuples(&backend, &tuples, &[flaky, next], Path::new("/o"), &cfg).unwrap();

    assert!(matches!(report.videos[0].status, VideoStatus::Partial(_)));
    assert_eq!(report.videos[0].frames_written, 3);
    assert_eq!(report.videos[0].bits_written, 30);
    assert_eq!(report.videos[1].bits_written, 20);
    assert_eq!(report.bits_written, 50);

    let outputs = backend.outputs.borrow();
    assert_eq!(outputs[&PathBuf::from("/o/stego_video1.mkv")].len(), 3);
}

#[test]
fn oversized_record_aborts_before_embedding() {
    let cfg = config(256);
    let long = "0123456789".repeat(4);
    assert!(encrypt_records(&[long.as_str()], &cfg).is_err());
}

#[test]
fn same_named_videos_get_their_own_outputs() {
    let cfg = config(256);
    let tuples = encrypt_records(&["a", "b"], &cfg).unwrap();

    let upper = PathBuf::from("/v/video1.MP4");
    let lower = PathBuf::from("/v/video1.mp4");
    let elsewhere = PathBuf::from("/w/video1.mp4");
    let mut backend = MemoryBackend::default();
    backend.videos.insert(upper.clone(), video(2, 0));
    backend.videos.insert(lower.clone(), video(2, 4));
    backend.videos.insert(elsewhere.clone(), video(2, 8));

    let report = embed_tuples(
        &backend,
        &tuples,
        &[upper.clone(), lower.clone(), elsewhere.clone()],
        Path::new("/o"),
        &cfg,
    )
    .unwrap();

    let outputs: HashSet<_> = report.videos.iter().map(|v| v.output.clone()).collect();
    assert_eq!(outputs.len(), 3);
    assert!(report
        .videos
        .iter()
        .all(|v| v.status == VideoStatus::Embedded));

    // every counted bit landed in a file that still exists
    let written = backend.outputs.borrow();
    assert_eq!(written.len(), 3);
    for v in &report.videos {
        assert_eq!(written[&v.output].len(), 2);
    }
    assert_eq!(report.bits_written, 60);
}

#[test]
fn repeated_output_is_skipped_without_consuming_bits() {
    let cfg = config(256);
    let tuples = encrypt_records(&["a"], &cfg).unwrap();
    let stream = vidcloak::pack(&tuples, 256).unwrap();

    let first = PathBuf::from("/v/a.mp4");
    let second = PathBuf::from("/v/b.mp4");
    let mut backend = MemoryBackend::default();
    backend.videos.insert(first.clone(), video(3, 0));
    backend.videos.insert(second.clone(), video(3, 1));

    let out = PathBuf::from("/o/same.mkv");
    let jobs = [(first.clone(), out.clone()), (second, out.clone())];
    let (reports, cursor) = embed_videos(&backend, &stream, &jobs, 8, 10);

    assert_eq!(reports[0].status, VideoStatus::Embedded);
    assert!(matches!(reports[1].status, VideoStatus::Skipped(_)));
    assert_eq!(reports[1].bits_written, 0);
    assert_eq!(cursor.position(), 30);
    // the first video's frames were not overwritten
    let outputs = backend.outputs.borrow();
    for (orig, stego) in backend.videos[&first].iter().zip(&outputs[&out]) {
        assert!(changed_samples(orig, stego) <= 10);
    }
}
