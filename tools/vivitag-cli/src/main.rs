//! Vivitag CLI: watermark photos and record tagged video clips.
//!
//! Usage:
//!   vivitag photo <IMAGE>        Tag a photo and export it as JPEG
//!   vivitag video <CLIP>         Record a clip with floating tags
//!   vivitag batch <CLIP>...      Record several clips one after another
//!   vivitag preview <MEDIA>      Render a single tagged frame to PNG
//!   vivitag check                Check ffmpeg, encoders and fonts

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use vivitag_common::config::{AppConfig, LoggingConfig};

mod commands;

use commands::{TagArgs, VideoArgs};

#[derive(Parser)]
#[command(
    name = "vivitag",
    about = "Watermark photos and videos with scattered and floating tags",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Tag a photo and export it as JPEG
    Photo {
        /// Image to tag
        image: PathBuf,

        /// Output directory (defaults to the configured export directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Scatter this many extra tags across the image
        #[arg(long)]
        scatter: Option<usize>,

        /// Index used in the exported file name
        #[arg(long, default_value = "0")]
        index: usize,

        /// JPEG quality (1-100)
        #[arg(long)]
        quality: Option<u8>,

        /// Seed for reproducible scatter jitter
        #[arg(long)]
        seed: Option<u64>,

        #[command(flatten)]
        tag: TagArgs,
    },

    /// Record a clip with floating tags
    Video {
        /// Video clip to record
        clip: PathBuf,

        /// Output directory (defaults to the configured export directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the recording report as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        video: VideoArgs,
    },

    /// Record several clips one after another with the same settings
    Batch {
        /// Video clips, processed in order
        #[arg(required = true)]
        clips: Vec<PathBuf>,

        /// Output directory (defaults to the configured export directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        video: VideoArgs,
    },

    /// Render one tagged frame to PNG
    Preview {
        /// Image or video to preview
        input: PathBuf,

        /// Output PNG path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Video position to grab (seconds)
        #[arg(long, default_value = "0.0")]
        at: f64,

        /// Scatter this many tags (photo) or floating copies (video)
        #[arg(long)]
        scatter: Option<usize>,

        #[command(flatten)]
        tag: TagArgs,
    },

    /// Check ffmpeg, encoders and fonts
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load();

    // Initialize logging
    let log_level = if cli.verbose {
        "debug".to_string()
    } else {
        config.logging.level.clone()
    };
    vivitag_common::logging::init_logging(&LoggingConfig {
        level: log_level,
        ..config.logging.clone()
    });

    match cli.command {
        Commands::Photo {
            image,
            output,
            scatter,
            index,
            quality,
            seed,
            tag,
        } => commands::photo::run(&config, image, output, scatter, index, quality, seed, tag),
        Commands::Video {
            clip,
            output,
            json,
            video,
        } => commands::video::run(&config, clip, output, json, video).await,
        Commands::Batch {
            clips,
            output,
            video,
        } => commands::batch::run(&config, clips, output, video).await,
        Commands::Preview {
            input,
            output,
            at,
            scatter,
            tag,
        } => commands::preview::run(&config, input, output, at, scatter, tag),
        Commands::Check => commands::check::run(&config),
    }
}
