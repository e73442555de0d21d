pub mod backend;
pub mod embed;

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{info, warn};

use crate::bitstream::{self, Bitstream};
use crate::config::{StegoConfig, VideoOrder};
use crate::crypto::{CipherTuple, KeyPair, RecordEncryptor};
use crate::records;
use backend::{FfmpegBackend, VideoBackend};
use embed::{VideoReport, VideoStatus};

/// Outcome of one embedding run over all videos.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub videos: Vec<VideoReport>,
    /// Length of the packed payload in bits.
    pub bitstream_len: usize,
    /// Bits actually written into frames (the final cursor position).
    pub bits_written: usize,
    /// SHA-256 of the packed payload.
    pub fingerprint: String,
}

impl RunReport {
    /// True when the videos ran out of selected blocks before the payload did.
    pub fn truncated(&self) -> bool {
        self.bits_written < self.bitstream_len
    }

    pub fn count(&self, pred: impl Fn(&VideoStatus) -> bool) -> usize {
        self.videos.iter().filter(|v| pred(&v.status)).count()
    }
}

/// Generate an ephemeral key pair and encrypt `records` in order.
pub fn encrypt_records<S: AsRef<str> + Sync>(
    records: &[S],
    cfg: &StegoConfig,
) -> Result<Vec<CipherTuple>> {
    cfg.validate()?;
    let keys = KeyPair::generate(cfg.curve)?;
    info!("generated ephemeral {} key pair", cfg.curve);

    let encryptor = RecordEncryptor::new(&keys, cfg.bit_width);
    let tuples = encryptor
        .encrypt_all(records)
        .context("encryption aborted")?;
    info!("encrypted {} records", tuples.len());
    Ok(tuples)
}

/// Encrypt the record table at `input` and export `C1_x,C1_y,C2` to `output`.
pub fn encrypt_file(input: &Path, output: &Path, cfg: &StegoConfig) -> Result<Vec<CipherTuple>> {
    info!("reading records: {}", input.display());
    let rows = records::read_records(input)?;
    let tuples = encrypt_records(&rows, cfg)?;
    records::write_ciphertexts(output, &tuples)?;
    info!("encrypted data saved to {}", output.display());
    Ok(tuples)
}

/// Pack `tuples` and drain the payload across `videos` in the configured
/// order, one output per video under `output_dir`.
pub fn embed_tuples<B: VideoBackend>(
    backend: &B,
    tuples: &[CipherTuple],
    videos: &[PathBuf],
    output_dir: &Path,
    cfg: &StegoConfig,
) -> Result<RunReport> {
    cfg.validate()?;
    let stream = bitstream::pack(tuples, cfg.bit_width).context("packing aborted")?;
    let fingerprint = stream.fingerprint();
    info!(
        "packed {} tuples into {} bits ({} per value), sha256 {}",
        tuples.len(),
        stream.len(),
        stream.width(),
        fingerprint
    );

    let ordered = order_videos(videos.to_vec(), cfg.video_order);
    let jobs: Vec<_> = ordered
        .iter()
        .cloned()
        .zip(output_paths(output_dir, &ordered, cfg))
        .collect();
    Ok(embed_stream(backend, &stream, fingerprint, &jobs, cfg))
}

fn embed_stream<B: VideoBackend>(
    backend: &B,
    stream: &Bitstream,
    fingerprint: String,
    jobs: &[(PathBuf, PathBuf)],
    cfg: &StegoConfig,
) -> RunReport {
    let (videos, cursor) =
        embed::embed_videos(backend, stream, jobs, cfg.block_size, cfg.block_budget);

    let report = RunReport {
        videos,
        bitstream_len: stream.len(),
        bits_written: cursor.position(),
        fingerprint,
    };

    if report.truncated() {
        warn!(
            "payload truncated: {} of {} bits embedded",
            report.bits_written,
            report.bitstream_len
        );
    } else {
        info!("payload fully embedded ({} bits)", report.bits_written);
    }
    report
}

/// Full run over real files: read records, encrypt, optionally export the
/// ciphertext table, then embed into every matching video in `video_dir`.
pub fn embed_file(
    records_path: &Path,
    video_dir: &Path,
    output_dir: &Path,
    ciphertext_out: Option<&Path>,
    cfg: &StegoConfig,
) -> Result<RunReport> {
    cfg.validate()?;
    let rows = records::read_records(records_path)?;
    let tuples = encrypt_records(&rows, cfg)?;
    if let Some(path) = ciphertext_out {
        records::write_ciphertexts(path, &tuples)?;
        info!("encrypted data saved to {}", path.display());
    }

    let videos = collect_videos(video_dir, &cfg.video_extension)?;
    info!("found {} videos in {}", videos.len(), video_dir.display());

    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;

    let backend = FfmpegBackend::new(cfg.output_codec.clone());
    embed_tuples(&backend, &tuples, &videos, output_dir, cfg)
}

/// Files in `dir` with the given extension, sorted by file name.
pub fn collect_videos(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut videos = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("failed to list {}", dir.display()))? {
        let path = entry?.path();
        let matches = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case(extension))
            .unwrap_or(false);
        if matches && path.is_file() {
            videos.push(path);
        }
    }
    Ok(order_videos(videos, VideoOrder::Lexical))
}

/// Apply the ordering policy that decides which video drains the payload first.
pub fn order_videos(mut videos: Vec<PathBuf>, order: VideoOrder) -> Vec<PathBuf> {
    match order {
        VideoOrder::Lexical => {
            videos.sort_by(|a, b| a.file_name().cmp(&b.file_name()).then_with(|| a.cmp(b)))
        }
        VideoOrder::AsListed => {}
    }
    videos
}

/// `<output_dir>/<prefix><stem>.<container>`
pub fn output_path(output_dir: &Path, source: &Path, cfg: &StegoConfig) -> PathBuf {
    output_dir.join(output_name(&source_stem(source), cfg))
}

/// One output per video, in run order. Names follow [`output_path`]; a video
/// whose name is already taken (ignoring case, so `v.mp4` and `v.MP4` or
/// `/a/v.mp4` and `/b/v.mp4` never share a file) gets `_2`, `_3`, ...
/// appended to its stem.
pub fn output_paths(output_dir: &Path, videos: &[PathBuf], cfg: &StegoConfig) -> Vec<PathBuf> {
    let mut taken = HashSet::new();
    videos
        .iter()
        .map(|source| {
            let stem = source_stem(source);
            let mut name = output_name(&stem, cfg);
            let mut n = 2;
            while !taken.insert(name.to_lowercase()) {
                let renamed = output_name(&format!("{}_{}", stem, n), cfg);
                warn!(
                    "{} would overwrite another output, writing {} instead",
                    source.display(),
                    renamed
                );
                name = renamed;
                n += 1;
            }
            output_dir.join(name)
        })
        .collect()
}

fn source_stem(source: &Path) -> String {
    source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "video".to_string())
}

fn output_name(stem: &str, cfg: &StegoConfig) -> String {
    format!("{}{}.{}", cfg.output_prefix, stem, cfg.output_container)
}
