//! Check ffmpeg, encoders and fonts.

use vivitag_capture_engine::ffmpeg::{command_exists, FfmpegSink};
use vivitag_capture_engine::{negotiate, EncodingSink, Negotiated, FORMAT_PRIORITY};
use vivitag_common::config::AppConfig;
use vivitag_render_engine::FontBook;

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("Vivitag System Check");
    println!("{}", "=".repeat(50));

    let mut ready = true;
    for binary in ["ffmpeg", "ffprobe"] {
        if command_exists(binary) {
            println!("[OK] {binary} found");
        } else {
            println!("[FAIL] {binary} not found (install ffmpeg to record video)");
            ready = false;
        }
    }

    // Encoders
    let sink = FfmpegSink::detect();
    println!();
    println!("Recording formats:");
    for mime in FORMAT_PRIORITY {
        let status = if sink.is_type_supported(mime) {
            "OK"
        } else {
            "--"
        };
        println!("  [{status}] {mime}");
    }
    match negotiate(&sink) {
        Negotiated::Supported(format) => {
            println!("[OK] Recording as {} (.{})", format.mime, format.extension());
        }
        Negotiated::Unsupported => {
            println!("[WARN] No preferred format available, using the encoder default (.webm)");
        }
    }

    // Fonts
    let fonts = FontBook::discover(&config.render.font_dirs);
    println!();
    if fonts.is_empty() {
        println!("[WARN] No fonts found, tags will be drawn with block glyphs");
    } else {
        let families: Vec<&str> = fonts.families().collect();
        println!("[OK] Fonts: {}", families.join(", "));
    }
    for dir in &config.render.font_dirs {
        println!("     {}", dir.display());
    }

    println!();
    println!("Export directory: {}", config.output_dir.display());

    println!();
    if ready {
        println!("All required tools are available. Vivitag is ready.");
    } else {
        println!("Photo tagging works; video recording needs the missing tools above.");
    }
    Ok(())
}
