//! Bake the atlas for a piece of text and write it out as a PNG
//!
//! Usage: fos-glyphs-bake <font file> <text> [output.png] [--config pipeline.json]

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use fos_glyphs::{FontDescriptor, FontHandle, FontPipeline, PipelineConfig, TextShaper};
use tracing_subscriber::EnvFilter;

const MAX_PASSES: usize = 8;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut positional = Vec::new();
    let mut config_path = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            config_path = Some(PathBuf::from(args.next().context("--config needs a path")?));
        } else {
            positional.push(arg);
        }
    }
    let [font_path, text, rest @ ..] = positional.as_slice() else {
        bail!("usage: fos-glyphs-bake <font file> <text> [output.png] [--config pipeline.json]");
    };
    let output = rest.first().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("atlas.png"));

    let font_path = Path::new(font_path);
    let content_root = font_path.parent().unwrap_or(Path::new(".")).to_path_buf();
    let file_name = font_path.file_name().context("font path has no file name")?;

    let mut config = match &config_path {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };
    config.content_root = content_root.clone();

    let descriptor = FontDescriptor::from_font_file(&content_root, file_name)
        .with_context(|| format!("reading {}", font_path.display()))?;
    tracing::info!("{} {} (weight {})", descriptor.family, descriptor.subfamily, descriptor.weight.value());

    let handle = FontHandle::from_bytes(std::fs::read(font_path)?, 0)?;
    let run = handle.shape(&TextShaper::new(), text, descriptor.sdf_sampling() as f32)?;
    tracing::info!("Shaped {} glyphs, {:.1}px wide", run.len(), run.width());

    let mut pipeline = FontPipeline::new(config)?;
    let id = pipeline.renderables_mut().spawn(vec![descriptor.clone()]);
    pipeline.renderables_mut().set_run(id, 0, &run);
    let passes = pipeline.run_until_idle(MAX_PASSES);

    let key = pipeline
        .registry()
        .key_of(&descriptor.identity())
        .context("font was not loaded")?;
    let resource = pipeline.registry().get(key).context("font was not loaded")?;
    let texture = resource.texture().context("font has no atlas")?;
    texture.save_png(&output)?;

    println!("passes:       {}", passes);
    println!("atlas:        {:?} {}x{}", texture.kind(), texture.width(), texture.height());
    println!("padding:      {}", resource.padding());
    println!("glyphs:       {} resident, {} missing", resource.used_glyphs().len(), resource.missing_glyphs().len());
    println!("free rects:   {}", resource.free_rects().len());
    println!("uploads:      {}", pipeline.materials().total_uploads());
    println!("visible:      {}", pipeline.renderables().is_visible(id));
    println!("written:      {}", output.display());
    Ok(())
}
