// src/main.rs
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use posture_monitor::classifier::RuleOutcome;
use posture_monitor::data::DataExporter;
use posture_monitor::source::parse_frame_record;
use posture_monitor::{
    compare, BodySide, FrameAssessment, JsonLinesSource, Measurement, PostureClassifier,
    PostureConfig, PostureLabel, PostureLandmarks, PostureTracker, Rule, Verdict, WindowOutcome,
};

#[derive(Parser, Debug)]
#[command(name = "posture_monitor", about = "Ergonomic posture feedback from body keypoints")]
struct Cli {
    /// Config file (JSON). Falls back to the user config dir, then defaults.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a keypoint recording (JSON lines) and print live feedback
    Watch {
        frames: PathBuf,
        /// Feedback window in seconds
        #[arg(long)]
        interval: Option<f64>,
        /// Body side used for the angles: left or right
        #[arg(long)]
        side: Option<BodySide>,
        /// Write frames.csv, windows.csv and summary.json under DIR
        /// (defaults to ~/Documents/PostureMonitor)
        #[arg(long, value_name = "DIR", num_args = 0..=1)]
        export: Option<Option<PathBuf>>,
        /// Session folder name for --export
        #[arg(long)]
        session: Option<String>,
    },
    /// Assess a single frame (one JSON object)
    Assess { frame: PathBuf },
    /// Compare a before and an after frame
    Compare { before: PathBuf, after: PathBuf },
    /// Write the default configuration
    InitConfig { path: Option<PathBuf> },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config_path = cli.config.as_deref();

    match cli.command {
        Command::Watch {
            frames,
            interval,
            side,
            export,
            session,
        } => {
            let mut config = load_config(config_path)?;
            if let Some(interval) = interval {
                config.window_interval_seconds = interval;
            }
            if let Some(side) = side {
                config.body_side = side;
            }
            watch(&frames, config, export, session)
        }
        Command::Assess { frame } => assess(&frame, &load_config(config_path)?),
        Command::Compare { before, after } => {
            compare_frames(&before, &after, &load_config(config_path)?)
        }
        Command::InitConfig { path } => init_config(path),
    }
}

fn load_config(explicit: Option<&Path>) -> Result<PostureConfig> {
    if let Some(path) = explicit {
        return PostureConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()));
    }

    match PostureConfig::default_path() {
        Some(path) if path.exists() => {
            info!(path = %path.display(), "using config");
            PostureConfig::load(&path)
                .with_context(|| format!("Failed to load config {}", path.display()))
        }
        _ => Ok(PostureConfig::default()),
    }
}

fn init_config(path: Option<PathBuf>) -> Result<()> {
    let path = path
        .or_else(PostureConfig::default_path)
        .context("No config directory available; pass a path")?;
    PostureConfig::default()
        .save(&path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}

fn watch(
    frames: &Path,
    config: PostureConfig,
    export: Option<Option<PathBuf>>,
    session: Option<String>,
) -> Result<()> {
    let mut source = JsonLinesSource::open(frames)
        .with_context(|| format!("Failed to open {}", frames.display()))?;
    let mut tracker = PostureTracker::new(config)?;
    let mut exporter = export.map(|dir| {
        DataExporter::new(dir.unwrap_or_else(DataExporter::default_output_dir), session)
    });

    println!(
        "Analysing posture from {} (feedback every {}s)",
        frames.display(),
        config.window_interval_seconds
    );

    let mut last_label: Option<PostureLabel> = None;
    tracker.drive(&mut source, |result| {
        let label = result.instantaneous.label();
        if last_label != Some(label) {
            match &result.instantaneous {
                FrameAssessment::Verdict(verdict) => {
                    println!("[{:>8.2}s] {}", result.timestamp, describe(verdict));
                }
                FrameAssessment::Undetermined(cause) => {
                    println!("[{:>8.2}s] Posture undetermined: {:?}", result.timestamp, cause);
                }
            }
            last_label = Some(label);
        }

        if let Some(outcome) = &result.aggregated {
            print_window(
                &format!("Automatic feedback (last {}s)", config.window_interval_seconds),
                outcome,
            );
        }

        if let Some(exporter) = exporter.as_mut() {
            exporter.add_frame(result);
        }
    })?;

    let final_window = tracker.flush();
    print_window("Final feedback", &final_window);

    let stats = tracker.stats();
    println!(
        "\nFrames: {} | good: {} | bad: {} | no person: {} | missing keypoints: {} | windows: {}",
        stats.frames,
        stats.good_frames,
        stats.bad_frames,
        stats.frames_without_person,
        stats.frames_missing_keypoints,
        stats.windows
    );

    if let Some(mut exporter) = exporter {
        exporter.add_window(&final_window);
        let dir = exporter.export_all(tracker.config(), stats)?;
        println!("Exported session to {}", dir.display());
    }

    Ok(())
}

fn measure_file(path: &Path, config: &PostureConfig) -> Result<Option<Measurement>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let timed = parse_frame_record(&contents)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    if timed.frame.is_empty() {
        println!("No person detected in {}.", path.display());
        return Ok(None);
    }

    match PostureLandmarks::extract(
        &timed.frame,
        config.body_side,
        config.head_reference,
        config.min_confidence,
    ) {
        Ok(landmarks) => Ok(Some(landmarks.measure())),
        Err(missing) => {
            let names: Vec<_> = missing.iter().map(|role| role.name()).collect();
            warn!(path = %path.display(), missing = ?names, "required keypoints missing");
            println!("Missing keypoints in {}: {}", path.display(), names.join(", "));
            Ok(None)
        }
    }
}

fn assess(path: &Path, config: &PostureConfig) -> Result<()> {
    let Some(measurement) = measure_file(path, config)? else {
        return Ok(());
    };

    print_measurement(&measurement);

    let verdict = PostureClassifier::new(config.thresholds).classify(&measurement);
    println!("\nPosture assessment:");
    for rule in Rule::ALL {
        let line = match verdict.outcome(rule) {
            RuleOutcome::Pass => format!("  ok   {}", rule.pass_message()),
            RuleOutcome::Violated => format!("  BAD  {}", rule.violation_message()),
            RuleOutcome::Undetermined => format!("  ??   {} could not be measured", rule.id()),
        };
        println!("{}", line);
    }
    println!("\n{}", verdict.headline());
    Ok(())
}

fn compare_frames(before: &Path, after: &Path, config: &PostureConfig) -> Result<()> {
    let (Some(m_before), Some(m_after)) = (measure_file(before, config)?, measure_file(after, config)?)
    else {
        println!("Could not detect the posture in one of the images.");
        return Ok(());
    };

    println!("Before -> {}", format_measurement(&m_before));
    println!("After  -> {}", format_measurement(&m_after));

    println!("\nImprovement feedback:");
    for item in compare(&m_before, &m_after).items {
        println!("  {:<20} {}", item.metric.label(), item.message());
    }
    Ok(())
}

fn describe(verdict: &Verdict) -> String {
    let [r, g, b] = verdict.severity.color();
    let badge = format!("\x1b[38;2;{};{};{}m\u{25cf}\x1b[0m", r, g, b);

    if verdict.reasons.is_empty() {
        format!("{} {}", badge, verdict.headline())
    } else {
        let reasons: Vec<_> = verdict.reasons.iter().map(Rule::violation_message).collect();
        format!("{} {}: {}", badge, verdict.headline(), reasons.join(", "))
    }
}

fn print_window(title: &str, outcome: &WindowOutcome) {
    match outcome {
        WindowOutcome::Verdict(summary) => {
            println!(
                "\n>> {}: {} ({} samples; {})",
                title,
                describe(&summary.verdict),
                summary.samples,
                format_measurement(&summary.mean)
            );
        }
        WindowOutcome::InsufficientData { .. } => {
            println!("\n>> {}: not enough data", title);
        }
    }
}

fn print_measurement(m: &Measurement) {
    println!("Trunk angle: {}", format_value(m.trunk_angle, "°"));
    println!("Head tilt angle: {}", format_value(m.head_tilt_angle, "°"));
    println!("Shoulder height difference: {}", format_value(m.shoulder_height_diff, ""));
}

fn format_measurement(m: &Measurement) -> String {
    format!(
        "trunk {} | head {} | shoulders {}",
        format_value(m.trunk_angle, "°"),
        format_value(m.head_tilt_angle, "°"),
        format_value(m.shoulder_height_diff, "")
    )
}

fn format_value(value: Option<f64>, unit: &str) -> String {
    match value {
        Some(v) => format!("{:.1}{}", v, unit),
        None => "n/a".to_string(),
    }
}
