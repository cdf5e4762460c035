use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use retrograde::config::{load_preset, to_yaml};
use retrograde::export::{self, write_png};
use retrograde::glyph_atlas::{GlyphAtlas, GlyphAtlasCache};
use retrograde::params::{
    AsciiRamp, Effect, EffectKind, ParameterBlock, FONT_CHOICES, SYSTEM_FONT,
};
use retrograde::uniforms::UNIFORM_LAYOUT_VERSION;
use retrograde::{EffectSession, GpuContext};

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("RETROGRADE_GIT_HASH"),
    ")"
);

#[derive(Debug, Parser)]
#[command(name = "retrograde")]
#[command(about = "Retro image effects on the GPU")]
#[command(version = VERSION)]
struct Cli {
    /// Log at debug level (RUST_LOG overrides).
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Apply an effect to an image and write a PNG.
    Render {
        input: PathBuf,
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,
        #[arg(long)]
        preset: Option<PathBuf>,
        /// Effect mode, e.g. ascii, bayer, crt, halftone.
        #[arg(long)]
        mode: Option<String>,
        /// Named ASCII ramp (classic, ansi_filled, braille, ...).
        #[arg(long, conflicts_with = "chars")]
        ramp: Option<String>,
        #[arg(long)]
        chars: Option<String>,
        #[arg(long, help = font_help())]
        font: Option<String>,
        /// Export scale: 0.5, 1, 2, 4 or 8.
        #[arg(long, default_value_t = 1.0, value_parser = parse_scale)]
        scale: f32,
    },
    /// Validate a preset and print the resolved parameters.
    Check { preset: PathBuf },
    /// Dump the glyph atlas for a character ramp.
    Atlas {
        #[arg(long, default_value = retrograde::params::DEFAULT_ASCII_CHARS)]
        chars: String,
        #[arg(long, default_value = SYSTEM_FONT)]
        font: String,
        #[arg(short = 'o', long = "output")]
        output: PathBuf,
    },
    /// Print the GPU adapter the pipeline would use.
    Adapter,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Render {
            input,
            output,
            preset,
            mode,
            ramp,
            chars,
            font,
            scale,
        } => {
            let params = resolve_params(preset.as_deref(), mode, ramp, chars, font)?;
            let output = output
                .unwrap_or_else(|| input.with_file_name(export::default_file_name(&input, scale)));
            run_render(&input, &output, &params, scale)
        }
        Commands::Check { preset } => run_check(&preset),
        Commands::Atlas {
            chars,
            font,
            output,
        } => run_atlas(&chars, &font, &output),
        Commands::Adapter => run_adapter(),
    }
}

fn parse_scale(raw: &str) -> std::result::Result<f32, String> {
    let scale: f32 = raw.parse().map_err(|_| format!("'{raw}' is not a number"))?;
    export::preset_scale(scale).map_err(|error| error.to_string())
}

fn font_help() -> String {
    format!(
        "Glyph font family for ASCII mode (known: {})",
        FONT_CHOICES.join(", ")
    )
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "retrograde=debug"
    } else {
        "retrograde=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_params(
    preset: Option<&Path>,
    mode: Option<String>,
    ramp: Option<String>,
    chars: Option<String>,
    font: Option<String>,
) -> Result<ParameterBlock> {
    let mut params = match preset {
        Some(path) => load_preset(path)?,
        None => ParameterBlock::default(),
    };

    if let Some(mode) = mode {
        let kind: EffectKind = mode.parse()?;
        if kind != params.kind() {
            params.effect = Effect::default_for(kind);
        }
    }

    let chars = match ramp {
        Some(ramp) => Some(ramp.parse::<AsciiRamp>()?.chars().to_owned()),
        None => chars,
    };
    if chars.is_some() || font.is_some() {
        let ascii = params
            .effect
            .ascii_mut()
            .ok_or_else(|| anyhow!("--ramp/--chars/--font only apply to ASCII mode"))?;
        if let Some(chars) = chars {
            ascii.chars = chars;
        }
        if let Some(font) = font {
            ascii.font = font;
        }
    }

    params.validate()?;
    Ok(params.clamped())
}

fn run_render(input: &Path, output: &Path, params: &ParameterBlock, scale: f32) -> Result<()> {
    let gpu = GpuContext::create().context("failed to initialize GPU")?;
    let session = EffectSession::with_system_fonts(gpu).context("failed to build pipeline")?;

    let (width, height) = session
        .load_source(input)
        .with_context(|| format!("failed to load {}", input.display()))?;
    let bitmap = session
        .render(params)
        .with_context(|| format!("failed to apply {}", params.kind()))?
        .ok_or_else(|| anyhow!("render was superseded before delivery"))?;

    let (out_width, out_height) = write_png(&bitmap, scale, output)
        .with_context(|| format!("failed to export {}", output.display()))?;
    println!(
        "Wrote {} ({}x{} -> {}x{}, {})",
        output.display(),
        width,
        height,
        out_width,
        out_height,
        params.kind()
    );
    Ok(())
}

fn run_check(preset: &Path) -> Result<()> {
    let params = load_preset(preset)?;
    println!("OK: {} ({})", preset.display(), params.kind());
    print!("{}", to_yaml(&params)?);
    Ok(())
}

#[derive(Debug, Serialize)]
struct AtlasMeta<'a> {
    chars: &'a str,
    font: &'a str,
    glyph_count: u32,
    cell_size: u32,
    width: u32,
    height: u32,
}

fn run_atlas(chars: &str, font: &str, output: &Path) -> Result<()> {
    let cache = GlyphAtlasCache::with_system_fonts();
    let atlas = cache
        .get_or_build(chars, font)
        .with_context(|| format!("failed to build atlas for font '{font}'"))?;
    write_atlas(&atlas, output)?;
    println!(
        "Wrote {} ({} glyphs, {}x{})",
        output.display(),
        atlas.glyph_count(),
        atlas.width(),
        atlas.height()
    );
    Ok(())
}

fn write_atlas(atlas: &GlyphAtlas, output: &Path) -> Result<()> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    atlas
        .to_luma_image()
        .save_with_format(output, image::ImageFormat::Png)
        .with_context(|| format!("failed to write {}", output.display()))?;

    let meta = AtlasMeta {
        chars: &atlas.key().chars,
        font: &atlas.key().font,
        glyph_count: atlas.glyph_count(),
        cell_size: atlas.cell_size(),
        width: atlas.width(),
        height: atlas.height(),
    };
    let meta_path = output.with_extension("meta.json");
    let json = serde_json::to_string_pretty(&meta).context("failed to encode atlas metadata")?;
    fs::write(&meta_path, json)
        .with_context(|| format!("failed to write {}", meta_path.display()))?;
    Ok(())
}

fn run_adapter() -> Result<()> {
    let gpu = GpuContext::create().context("failed to initialize GPU")?;
    let info = gpu.adapter_info();
    let limits = gpu.limits();
    println!("Adapter: {} ({:?}, {:?})", info.name, info.backend, info.device_type);
    println!("Driver: {} {}", info.driver, info.driver_info);
    println!(
        "Limits: max texture {}px, {} invocations per workgroup",
        limits.max_texture_dimension_2d, limits.max_compute_invocations_per_workgroup
    );
    println!("Uniform layout: v{UNIFORM_LAYOUT_VERSION}");
    Ok(())
}
