use crate::{
    analysis::AnalysisResult,
    config::Config,
    detection::{Predictor, http::HttpPredictor},
    intake, overlay,
    report::{self, AnalysisReport},
    session::Session,
    util::{ensure_dir, now_rfc3339},
};
use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "leaf-check")]
#[command(about = "Plant leaf disease detection client (image intake + remote inference + report)")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./leaf-check.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check that the prediction service is up.
    Doctor {},
    /// Load an image and show what would be submitted.
    Preview {
        /// Only the first file is used.
        #[arg(long, num_args = 1.., required = true)]
        input: Vec<PathBuf>,
        /// Print the full preview data URL.
        #[arg(long)]
        data_url: bool,
    },
    /// Submit an image for disease detection.
    Analyze {
        /// Only the first file is used.
        #[arg(long, num_args = 1.., required = true)]
        input: Vec<PathBuf>,
        #[arg(long)]
        out_dir: Option<PathBuf>,
        /// Print the result as JSON instead of a summary.
        #[arg(long)]
        json: bool,
    },
}

pub fn dispatch(args: Args) -> Result<()> {
    let cfg = match resolve_config_path(args.config.as_deref()) {
        Some(path) => Config::load(&path)?,
        None => Config::default(),
    };

    let log_path = resolve_log_path(&cfg);
    let _guard = init_logging(&args, &cfg, log_path.as_deref())?;

    match &args.cmd {
        Command::Doctor {} => doctor(&cfg),
        Command::Preview { input, data_url } => preview(input, *data_url),
        Command::Analyze {
            input,
            out_dir,
            json,
        } => analyze(&cfg, input, out_dir.as_deref(), *json),
    }
}

fn resolve_config_path(user: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = user {
        return Some(p.to_path_buf());
    }
    ["leaf-check.toml", "leaf-check.example.toml"]
        .into_iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
}

fn init_logging(
    args: &Args,
    cfg: &Config,
    file_path: Option<&Path>,
) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stderr keeps stdout clean for --json output.
    let stderr_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    };

    let (file_layer, guard) = if let Some(path) = file_path {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::File::create(path)
            .with_context(|| format!("create log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn doctor(cfg: &Config) -> Result<()> {
    let predictor = HttpPredictor::new(cfg)?;
    let health = predictor.health()?;
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "endpoint": cfg.service.health_url(),
            "status": health.status,
            "ok": health.is_ok(),
        }))?
    );
    if !health.is_ok() {
        return Err(anyhow!("service reported status {:?}", health.status));
    }
    Ok(())
}

fn preview(input: &[PathBuf], data_url: bool) -> Result<()> {
    let Some(image) = intake::select_first(input)? else {
        return Ok(());
    };
    let preview = image.preview_data_url();
    let mut out = serde_json::to_value(image.summary())?;
    out["data_url_len"] = serde_json::json!(preview.len());
    if data_url {
        out["data_url"] = serde_json::json!(preview);
    }
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn analyze(cfg: &Config, input: &[PathBuf], out_override: Option<&Path>, json: bool) -> Result<()> {
    let Some(image) = intake::select_first(input)? else {
        return Ok(());
    };

    let out_root = out_override
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(&cfg.paths.out_dir));
    let run_dir = out_root.join(&image.sha256[..16]);
    ensure_dir(&run_dir)?;

    info!("image={} out={}", image.file_name, run_dir.display());

    if cfg.debug.dump_effective_config {
        let raw = toml::to_string(cfg).unwrap_or_default();
        std::fs::write(run_dir.join("effective-config.toml"), raw)?;
    }

    let predictor = HttpPredictor::new(cfg)?;
    let mut session = Session::new();
    let summary = image.summary();
    session.select(image);

    let started = now_rfc3339();
    let Some(result) = session.analyze(&predictor).cloned() else {
        return Ok(());
    };
    let finished = now_rfc3339();

    let annotated_file = match session.image() {
        Some(image) if cfg.output.save_annotated_image => {
            write_annotated(cfg, &result, &image.bytes, &run_dir)
        }
        _ => None,
    };

    let report_path = run_dir.join(&cfg.output.report_filename);
    if cfg.output.write_report_json {
        let report = AnalysisReport {
            image: summary.clone(),
            service_url: predictor.endpoint(),
            started,
            finished,
            result: result.clone(),
            annotated_image_file: annotated_file.clone(),
        };
        report::write_report(&report, &report_path)?;
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print!("{}", report::render_summary(&summary, &result));
    }

    if cfg.output.print_summary {
        eprintln!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "phase": session.phase(),
                "run_dir": run_dir,
                "report": cfg.output.write_report_json.then(|| report_path.display().to_string()),
                "annotated_image": annotated_file,
            }))?
        );
    }

    Ok(())
}

/// Saves the service's annotated image, or draws the boxes locally when the
/// service sent none. Failures are logged and skipped.
fn write_annotated(
    cfg: &Config,
    result: &AnalysisResult,
    image_bytes: &[u8],
    run_dir: &Path,
) -> Option<String> {
    let basename = &cfg.output.annotated_basename;
    let saved = match result.annotated_image.as_deref() {
        Some(annotated) => match report::save_annotated_image(annotated, run_dir, basename) {
            Ok(None) => {
                info!("annotated image is remote: {annotated}");
                return None;
            }
            other => other,
        },
        None if cfg.output.render_overlay => {
            overlay::save_overlay(image_bytes, &result.detections, run_dir, basename)
        }
        None => Ok(None),
    };
    match saved {
        Ok(Some(path)) => {
            info!("annotated image: {}", path.display());
            Some(path.display().to_string())
        }
        Ok(None) => None,
        Err(err) => {
            warn!("could not save annotated image: {:#}", err);
            None
        }
    }
}

fn resolve_log_path(cfg: &Config) -> Option<PathBuf> {
    if !cfg.logging.write_to_file {
        return None;
    }

    if !cfg.logging.file_path.is_empty() {
        return Some(PathBuf::from(&cfg.logging.file_path));
    }

    Some(PathBuf::from(&cfg.paths.out_dir).join("leaf-check.log"))
}
