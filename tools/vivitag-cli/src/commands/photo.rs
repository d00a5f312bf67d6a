//! Tag a photo and export it as JPEG.

use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::SeedableRng;

use vivitag_capture_engine::{DirectoryDownload, DownloadTarget};
use vivitag_common::config::AppConfig;
use vivitag_processing_core::{scatter_into_project, ScatterTemplate};
use vivitag_project_model::{MediaMode, Project};
use vivitag_render_engine::{export_photo, load_image, Compositor};

use super::{output_dir, TagArgs};

#[allow(clippy::too_many_arguments)]
pub fn run(
    config: &AppConfig,
    image: PathBuf,
    output: Option<PathBuf>,
    scatter: Option<usize>,
    index: usize,
    quality: Option<u8>,
    seed: Option<u64>,
    tag: TagArgs,
) -> anyhow::Result<()> {
    println!("Tagging photo: {}", image.display());

    let project = tag_photo(&image, scatter, seed, &tag)?;
    let base = load_image(&image)?;
    let layers = project.layers()?.len();

    let compositor = Compositor::from_config(&config.render);
    let quality = quality.unwrap_or(config.render.jpeg_quality).clamp(1, 100);
    let file = export_photo(&compositor, &project, &base, index, quality)?;

    let download = DirectoryDownload::new(output_dir(config, output));
    let path = download.download(&file)?;

    println!("  Size: {}x{}", base.width(), base.height());
    println!("  Layers: {layers}");
    println!("  Text: {}", compositor.text_backend());
    println!("Saved: {} ({} bytes)", path.display(), file.len());
    Ok(())
}

/// Build the photo project: default layer, styled by `tag`, plus any
/// scattered copies.
pub fn tag_photo(
    path: &Path,
    scatter: Option<usize>,
    seed: Option<u64>,
    tag: &TagArgs,
) -> anyhow::Result<Project> {
    let mut project = Project::import(path);
    if project.mode() != MediaMode::Photo {
        anyhow::bail!("Not a photo: {}", path.display());
    }
    let (width, height) = image::image_dimensions(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {e}", path.display()))?;
    project.ensure_default_layer(width, height)?;

    let first = project.layers()?.first().map(|l| l.id.clone());
    if let Some(id) = &first {
        if tag.is_set() {
            project.update_layer(id, &tag.layer_patch())?;
        }
    }

    if let Some(count) = scatter.filter(|&c| c > 0) {
        let template = if tag.is_set() {
            project.layers()?.first().map(ScatterTemplate::from_tag)
        } else {
            None
        };
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        project =
            scatter_into_project(&project, count, width, height, template.as_ref(), &mut rng)?;
        tracing::debug!(count, "Scattered tags");
    }
    Ok(project)
}
