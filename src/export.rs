//! Batch export of the list's final images.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::Context;
use image::DynamicImage;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{
    CompressionType as PngCompressionType, FilterType as PngFilterType, PngEncoder,
};
use image::codecs::webp::WebPEncoder;
use rayon::prelude::*;

use crate::decode;
use crate::processing::render;
use crate::session::Session;
use crate::state::EditState;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportFormat {
    #[default]
    Jpg,
    Png,
    Webp,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 3] = [ExportFormat::Jpg, ExportFormat::Png, ExportFormat::Webp];

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Jpg => "jpg",
            ExportFormat::Png => "png",
            ExportFormat::Webp => "webp",
        }
    }

    pub fn from_name(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(ExportFormat::Jpg),
            "png" => Some(ExportFormat::Png),
            "webp" => Some(ExportFormat::Webp),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOptions {
    pub format: ExportFormat,
    pub jpg_quality: u8,
    pub png_compression: u8,
    /// Bounds on the rendered output; `None` keeps the cropped size.
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            format: ExportFormat::Jpg,
            jpg_quality: 90,
            png_compression: 6,
            max_width: None,
            max_height: None,
        }
    }
}

/// One image to export: where it comes from, what to call it and how it
/// was edited.
#[derive(Debug, Clone)]
pub struct ExportJob {
    pub source_path: PathBuf,
    pub name: String,
    pub edit: EditState,
}

#[derive(Debug, Default)]
pub struct ExportReport {
    pub written: Vec<PathBuf>,
    /// Source path and error text for each image that could not be written.
    pub failed: Vec<(PathBuf, String)>,
}

impl ExportReport {
    pub fn total(&self) -> usize {
        self.written.len() + self.failed.len()
    }
}

pub fn jobs_from_session(session: &Session) -> Vec<ExportJob> {
    session
        .records()
        .iter()
        .map(|r| ExportJob {
            source_path: r.source_path().to_path_buf(),
            name: r.display_name().to_string(),
            edit: r.edit().clone(),
        })
        .collect()
}

/// File-name-safe version of a display name.
pub fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed = cleaned.trim_matches(|c: char| c.is_whitespace() || c == '.');
    if trimmed.is_empty() {
        "image".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Output path per job, unique among the batch and not clobbering files
/// already in `output_dir`.
fn output_paths(jobs: &[ExportJob], output_dir: &Path, format: ExportFormat) -> Vec<PathBuf> {
    let ext = format.extension();
    let mut taken = HashSet::new();
    jobs.iter()
        .map(|job| {
            let stem = sanitize_name(&job.name);
            let mut n = 1;
            loop {
                let file = if n == 1 {
                    format!("{stem}.{ext}")
                } else {
                    format!("{stem}-{n}.{ext}")
                };
                let candidate = output_dir.join(&file);
                if !candidate.exists() && taken.insert(file.to_lowercase()) {
                    return candidate;
                }
                n += 1;
            }
        })
        .collect()
}

fn export_one(job: &ExportJob, output_path: &Path, options: ExportOptions) -> anyhow::Result<()> {
    let input = decode::open_image(&job.source_path)?.into_rgba8();
    let rendered = render::render(
        &input,
        job.edit.crop,
        job.edit.rotation,
        job.edit.grayscale,
        options.max_width.unwrap_or(0),
        options.max_height.unwrap_or(0),
    )?;
    write_image(&DynamicImage::ImageRgba8(rendered), output_path, options)
        .with_context(|| format!("encode failed for {}", output_path.display()))
}

fn write_image(
    rendered: &DynamicImage,
    output_path: &Path,
    options: ExportOptions,
) -> anyhow::Result<()> {
    let file = std::fs::File::create(output_path)?;
    let writer = std::io::BufWriter::new(file);
    match options.format {
        ExportFormat::Jpg => {
            let encoder = JpegEncoder::new_with_quality(writer, options.jpg_quality.clamp(1, 100));
            DynamicImage::ImageRgb8(rendered.to_rgb8()).write_with_encoder(encoder)?;
        }
        ExportFormat::Png => {
            let compression = PngCompressionType::Level(options.png_compression.min(9));
            let encoder =
                PngEncoder::new_with_quality(writer, compression, PngFilterType::Adaptive);
            rendered.write_with_encoder(encoder)?;
        }
        ExportFormat::Webp => {
            let encoder = WebPEncoder::new_lossless(writer);
            rendered.write_with_encoder(encoder)?;
        }
    }
    Ok(())
}

/// Renders every job at full resolution into `output_dir`, in parallel.
/// Individual failures are collected in the report; only an unusable
/// output directory fails the whole batch.
pub fn export_all(
    jobs: &[ExportJob],
    output_dir: &Path,
    options: ExportOptions,
) -> anyhow::Result<ExportReport> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("create_dir_all {}", output_dir.display()))?;

    let targets = output_paths(jobs, output_dir, options.format);
    let results: Vec<anyhow::Result<()>> = jobs
        .par_iter()
        .zip(targets.par_iter())
        .map(|(job, target)| export_one(job, target, options))
        .collect();

    let mut report = ExportReport::default();
    for ((job, target), result) in jobs.iter().zip(targets).zip(results) {
        match result {
            Ok(()) => report.written.push(target),
            Err(err) => {
                tracing::warn!(path = %job.source_path.display(), "export failed: {err:#}");
                report.failed.push((job.source_path.clone(), format!("{err:#}")));
            }
        }
    }
    tracing::info!(
        dir = %output_dir.display(),
        written = report.written.len(),
        failed = report.failed.len(),
        "export finished"
    );
    Ok(report)
}
