use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::{info, warn};

use vidcloak::config::{
    CurveId, VideoOrder, DEFAULT_BIT_WIDTH, DEFAULT_BLOCK_BUDGET, DEFAULT_OUTPUT_CODEC,
    DEFAULT_OUTPUT_CONTAINER, DEFAULT_OUTPUT_PREFIX, DEFAULT_VIDEO_EXTENSION,
};
use vidcloak::pipeline;
use vidcloak::quality;
use vidcloak::{StegoConfig, VideoStatus};

/// vidcloak — encrypt tabular records and hide the ciphertext in video frames.
#[derive(Parser)]
#[command(name = "vidcloak", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt a CSV record table into a C1_x,C1_y,C2 ciphertext table
    Encrypt {
        /// Input CSV (first row is a header)
        #[arg(short, long)]
        input: PathBuf,

        /// Output ciphertext CSV
        #[arg(short, long)]
        output: PathBuf,

        /// Elliptic curve
        #[arg(long, value_enum, default_value_t = CurveId::Secp256r1)]
        curve: CurveId,

        /// Bits reserved per ciphertext value
        #[arg(long, default_value_t = DEFAULT_BIT_WIDTH)]
        bit_width: usize,
    },

    /// Encrypt records and embed the ciphertext into every video in a directory
    Embed {
        /// Input CSV (first row is a header)
        #[arg(short, long)]
        records: PathBuf,

        /// Directory of source videos
        #[arg(short, long)]
        videos: PathBuf,

        /// Directory for embedded videos
        #[arg(short, long)]
        output: PathBuf,

        /// Also export the ciphertext table here
        #[arg(long)]
        ciphertext_out: Option<PathBuf>,

        /// Elliptic curve
        #[arg(long, value_enum, default_value_t = CurveId::Secp256r1)]
        curve: CurveId,

        /// Blocks embedded per frame
        #[arg(long, default_value_t = DEFAULT_BLOCK_BUDGET)]
        block_budget: usize,

        /// Bits reserved per ciphertext value
        #[arg(long, default_value_t = DEFAULT_BIT_WIDTH)]
        bit_width: usize,

        /// Order in which videos consume the payload
        #[arg(long, value_enum, default_value_t = VideoOrder::Lexical)]
        order: VideoOrder,

        /// Source video file extension
        #[arg(long, default_value = DEFAULT_VIDEO_EXTENSION)]
        extension: String,

        /// Output file name prefix
        #[arg(long, default_value = DEFAULT_OUTPUT_PREFIX)]
        prefix: String,

        /// ffmpeg video codec for outputs (must be lossless to keep the LSBs)
        #[arg(long, default_value = DEFAULT_OUTPUT_CODEC)]
        codec: String,

        /// Output container extension
        #[arg(long, default_value = DEFAULT_OUTPUT_CONTAINER)]
        container: String,
    },

    /// PSNR between the first frames of two videos
    Psnr {
        /// Original video
        #[arg(long)]
        original: PathBuf,

        /// Embedded video
        #[arg(long)]
        modified: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Encrypt {
            input,
            output,
            curve,
            bit_width,
        } => {
            let cfg = StegoConfig {
                curve,
                bit_width,
                ..Default::default()
            };
            pipeline::encrypt_file(&input, &output, &cfg)?;
        }

        Commands::Embed {
            records,
            videos,
            output,
            ciphertext_out,
            curve,
            block_budget,
            bit_width,
            order,
            extension,
            prefix,
            codec,
            container,
        } => {
            let cfg = StegoConfig {
                curve,
                block_budget,
                bit_width,
                video_order: order,
                video_extension: extension,
                output_prefix: prefix,
                output_codec: codec,
                output_container: container,
                ..Default::default()
            };

            let report = pipeline::embed_file(
                &records,
                &videos,
                &output,
                ciphertext_out.as_deref(),
                &cfg,
            )?;

            let embedded = report.count(|s| *s == VideoStatus::Embedded);
            let partial = report.count(|s| matches!(s, VideoStatus::Partial(_)));
            let skipped = report.count(|s| matches!(s, VideoStatus::Skipped(_)));
            info!(
                "{} embedded, {} partial, {} skipped; {}/{} payload bits written",
                embedded, partial, skipped, report.bits_written, report.bitstream_len
            );
            if report.truncated() {
                warn!(
                    "{} payload bits did not fit in the selected blocks",
                    report.bitstream_len - report.bits_written
                );
            }
        }

        Commands::Psnr { original, modified } => {
            let value = quality::first_frame_psnr(&original, &modified)?;
            info!("PSNR for {}: {:.2} dB", original.display(), value);
        }
    }

    Ok(())
}
