use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use snapease::config::AppConfig;
use snapease::decode;
use snapease::export::{self, ExportFormat, ExportOptions};
use snapease::record::ImageRecord;
use snapease::session::Session;
use snapease::state::LoadState;

const USAGE: &str = "usage: snapease <image-list> [--add <image>]... [--save] [--export <dir>] \
                     [--format jpg|png|webp] [--quality N] [--max WxH]";
const DECODE_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Default, PartialEq)]
struct Args {
    project: PathBuf,
    add: Vec<PathBuf>,
    save: bool,
    export_dir: Option<PathBuf>,
    format: Option<ExportFormat>,
    quality: Option<u8>,
    max: Option<(Option<u32>, Option<u32>)>,
}

/// `WxH`, `Wx` or `xH`; a zero or missing side is unbounded.
fn parse_max(value: &str) -> Option<(Option<u32>, Option<u32>)> {
    let (w, h) = value.trim().split_once(['x', 'X'])?;
    let side = |s: &str| -> Option<Option<u32>> {
        if s.is_empty() {
            return Some(None);
        }
        s.parse::<u32>().ok().map(|v| Some(v).filter(|&v| v > 0))
    };
    Some((side(w)?, side(h)?))
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args> {
    let mut out = Args::default();
    let mut project = None;
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        let mut value = |name: &str| args.next().with_context(|| format!("{name} needs a value\n{USAGE}"));
        match arg.as_str() {
            "--add" => out.add.push(PathBuf::from(value("--add")?)),
            "--save" => out.save = true,
            "--export" => out.export_dir = Some(PathBuf::from(value("--export")?)),
            "--format" => {
                let raw = value("--format")?;
                out.format = Some(
                    ExportFormat::from_name(&raw).with_context(|| format!("unknown format {raw}"))?,
                );
            }
            "--quality" => {
                let raw = value("--quality")?;
                let q = raw
                    .parse::<u8>()
                    .with_context(|| format!("bad quality {raw}"))?;
                out.quality = Some(q.clamp(1, 100));
            }
            "--max" => {
                let raw = value("--max")?;
                out.max = Some(parse_max(&raw).with_context(|| format!("bad size {raw}, expected WxH"))?);
            }
            flag if flag.starts_with("--") => anyhow::bail!("unknown option {flag}\n{USAGE}"),
            _ if project.is_none() => project = Some(PathBuf::from(&arg)),
            _ => anyhow::bail!("unexpected argument {arg}\n{USAGE}"),
        }
    }
    out.project = project.context(USAGE)?;
    Ok(out)
}

/// Command line first, then the config file, then defaults.
fn export_options(args: &Args, config: &AppConfig) -> ExportOptions {
    let defaults = ExportOptions::default();
    let format = args
        .format
        .or_else(|| config.export_format.as_deref().and_then(ExportFormat::from_name))
        .unwrap_or(defaults.format);
    let (max_width, max_height) = args
        .max
        .unwrap_or((config.export_max_width, config.export_max_height));
    ExportOptions {
        format,
        jpg_quality: args
            .quality
            .or(config.export_quality)
            .unwrap_or(defaults.jpg_quality)
            .clamp(1, 100),
        max_width,
        max_height,
        ..defaults
    }
}

fn load_state_label(record: &ImageRecord) -> &'static str {
    match record.load_state() {
        LoadState::NotLoaded | LoadState::Decoding => "pending",
        LoadState::Loaded => "ok",
        LoadState::Failed => "unreadable",
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = parse_args(std::env::args().skip(1))?;
    let mut config = AppConfig::load();
    let mut session = Session::new(config.preview_max_resolved());

    if args.project.exists() {
        if let Err(err) = session.load_project(&args.project, false) {
            eprintln!("snapease: warning: error reading some or all of image list: {err:#}");
        }
    } else if args.add.is_empty() {
        anyhow::bail!("{} does not exist", args.project.display());
    }

    for path in &args.add {
        if !decode::is_supported_image(path) {
            eprintln!("snapease: skipping {} (not a supported image)", path.display());
            continue;
        }
        session.import_path(path);
    }

    session.wait_for_decodes(DECODE_TIMEOUT);
    if session.pending_decodes() > 0 {
        eprintln!(
            "snapease: {} image(s) still decoding after {}s",
            session.pending_decodes(),
            DECODE_TIMEOUT.as_secs()
        );
    }

    eprintln!("{}", session.caption());
    for (i, record) in session.records().iter().enumerate() {
        let edit = record.edit();
        println!(
            "{:>3}. {} [{}] rot={} bw={} {} {}",
            i + 1,
            record.display_name(),
            record.size_info(),
            edit.rotation.degrees(),
            u8::from(edit.grayscale),
            load_state_label(record),
            record.source_path().display()
        );
    }

    if args.save {
        session.save_project(Some(&args.project))?;
        eprintln!("snapease: saved {}", args.project.display());
    } else if session.needs_save() {
        eprintln!("snapease: image list has unsaved changes (pass --save to write them)");
    }

    let mut failed = 0;
    if let Some(dir) = &args.export_dir {
        let options = export_options(&args, &config);
        let jobs = export::jobs_from_session(&session);
        let report = export::export_all(&jobs, dir, options)?;
        for (path, err) in &report.failed {
            eprintln!("snapease: {}: {}", path.display(), err);
        }
        eprintln!(
            "snapease: exported {} of {} image(s) to {}",
            report.written.len(),
            report.total(),
            dir.display()
        );
        failed = report.failed.len();

        config.export_dir = Some(dir.clone());
        config.export_format = Some(options.format.extension().to_string());
        config.export_quality = Some(options.jpg_quality);
        config.export_max_width = options.max_width;
        config.export_max_height = options.max_height;
    }

    if let Some(path) = session.project_path() {
        config.list_dir = path.parent().map(|p| p.to_path_buf());
        config.last_project = Some(path.to_path_buf());
    }
    config.save();

    if failed > 0 {
        anyhow::bail!("{failed} image(s) failed to export");
    }
    Ok(())
}
