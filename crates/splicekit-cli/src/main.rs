//! SpliceKit CLI
//!
//! Headless driver for the editing core: build and ripple a track, run the
//! background task queue, apply task results to a timeline, inspect settings.

mod logging;

use std::path::PathBuf;
use std::str::FromStr;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tracing::info;

use splicekit_core::commands::{AddClipCommand, History, RemoveClipCommand};
use splicekit_core::jobs::{QueueManager, TaskType};
use splicekit_core::session::EditSession;
use splicekit_core::settings::{SessionSettings, SettingsManager};
use splicekit_core::timeline::{Clip, ClipTrack, Timeline};
use splicekit_core::TimeSec;

#[derive(Parser)]
#[command(name = "splicekit", version, about = "Headless driver for the SpliceKit editing core")]
struct Cli {
    /// Also write logs to a daily rolling file in this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Directory holding settings.json
    #[arg(long, global = true, default_value = ".")]
    settings_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build a track from clip specs and print it as JSON
    Ripple(RippleArgs),
    /// Run simulated background tasks and stream queue events as JSON lines
    Queue(QueueArgs),
    /// Remove subtitles from every clip, apply the results, undo the last one
    Subtitles(SubtitlesArgs),
    /// Print, save or reset settings
    Settings(SettingsArgs),
}

#[derive(Args)]
struct RippleArgs {
    /// Clip to append, as NAME:DURATION (repeatable)
    #[arg(long = "clip", value_name = "NAME:DURATION")]
    clips: Vec<ClipSpec>,

    /// Clip to insert, as NAME:DURATION@POSITION (repeatable, applied after --clip)
    #[arg(long = "insert", value_name = "NAME:DURATION@POS")]
    inserts: Vec<ClipSpec>,

    /// Remove the clip with this name (repeatable, applied last)
    #[arg(long = "remove", value_name = "NAME")]
    removes: Vec<String>,

    /// Number of edits to undo at the end
    #[arg(long, default_value_t = 0)]
    undo: usize,

    /// Use a free-placement track instead of a magnetic one
    #[arg(long)]
    free: bool,
}

#[derive(Args)]
struct QueueArgs {
    /// Number of tasks to submit
    #[arg(long, default_value_t = 6)]
    tasks: usize,

    /// Worker threads (overrides settings)
    #[arg(long)]
    workers: Option<usize>,

    /// Make every Nth task fail (0 = never)
    #[arg(long, default_value_t = 0)]
    fail_every: usize,

    /// Simulated work per task, in milliseconds
    #[arg(long, default_value_t = 80)]
    work_ms: u64,

    /// Give up waiting after this many seconds
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
}

#[derive(Args)]
struct SubtitlesArgs {
    /// Clip durations in seconds
    #[arg(long = "clip", value_name = "SECONDS", default_values_t = [4.0, 6.0, 3.0])]
    clips: Vec<TimeSec>,

    /// Give up waiting after this many seconds
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
}

#[derive(Args)]
struct SettingsArgs {
    /// Write the effective (normalized) settings back to disk
    #[arg(long, conflicts_with = "reset")]
    save: bool,

    /// Delete the settings file and show defaults
    #[arg(long)]
    reset: bool,
}

/// `NAME:DURATION` with an optional `@POSITION`
#[derive(Clone, Debug)]
struct ClipSpec {
    name: String,
    duration: TimeSec,
    position: Option<TimeSec>,
}

impl FromStr for ClipSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (body, position) = match s.split_once('@') {
            Some((body, pos)) => {
                let pos = pos
                    .parse::<TimeSec>()
                    .map_err(|e| format!("bad position '{pos}': {e}"))?;
                (body, Some(pos))
            }
            None => (s, None),
        };
        let (name, duration) = body
            .split_once(':')
            .ok_or_else(|| format!("expected NAME:DURATION, got '{body}'"))?;
        let duration = duration
            .parse::<TimeSec>()
            .map_err(|e| format!("bad duration '{duration}': {e}"))?;
        if name.is_empty() {
            return Err("clip name must not be empty".to_string());
        }

        Ok(Self {
            name: name.to_string(),
            duration,
            position,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.log_dir.as_deref());

    let manager = SettingsManager::new(&cli.settings_dir);
    match cli.command {
        Command::Ripple(args) => run_ripple(args),
        Command::Queue(args) => run_queue(args, manager.load()).await,
        Command::Subtitles(args) => run_subtitles(args, manager.load()).await,
        Command::Settings(args) => run_settings(args, &manager),
    }
}

// =============================================================================
// Ripple
// =============================================================================

fn run_ripple(args: RippleArgs) -> Result<()> {
    let mut timeline = Timeline::new("ripple");
    let track = if args.free {
        ClipTrack::new_free("V1")
    } else {
        ClipTrack::new_magnetic("V1")
    };
    let track_id = timeline.add_track(track);
    let mut history = History::new();

    let appends = args.clips.iter().map(|spec| (spec, None));
    let inserts = args.inserts.iter().map(|spec| (spec, spec.position));
    for (spec, position) in appends.chain(inserts) {
        let clip = Clip::new(&format!("asset_{}", spec.name), &spec.name, spec.duration);
        let mut command = AddClipCommand::new(&track_id, clip);
        command.position = position;
        history
            .execute(Box::new(command), &mut timeline)
            .with_context(|| format!("adding clip '{}'", spec.name))?;
    }

    for name in &args.removes {
        let clip_id = timeline
            .track(&track_id)
            .and_then(|t| t.clips().iter().find(|c| &c.name == name))
            .map(|c| c.id.clone())
            .with_context(|| format!("no clip named '{name}'"))?;
        history.execute(Box::new(RemoveClipCommand::new(&track_id, &clip_id)), &mut timeline)?;
    }

    for _ in 0..args.undo {
        if !history.undo(&mut timeline)? {
            break;
        }
    }

    let track = timeline
        .track(&track_id)
        .context("track disappeared")?;
    let clips: Vec<_> = track
        .clips()
        .iter()
        .map(|c| json!({"name": c.name, "start": c.start_time, "end": c.end_time()}))
        .collect();
    let output = json!({
        "policy": track.policy,
        "contiguous": track.is_contiguous(),
        "undoable": history.undo_count(),
        "redoable": history.redo_count(),
        "clips": clips,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

// =============================================================================
// Queue
// =============================================================================

async fn run_queue(args: QueueArgs, mut settings: SessionSettings) -> Result<()> {
    if let Some(workers) = args.workers {
        settings.queue.num_workers = workers;
    }
    settings.normalize();

    let mut queue = QueueManager::new(settings.queue.clone())?;
    let mut events = queue
        .take_event_receiver()
        .context("event receiver already taken")?;

    let work = Duration::from_millis(args.work_ms);
    let fail_every = args.fail_every;
    for task_type in TaskType::ALL {
        queue.register_handler(task_type, move |ctx| {
            for step in 1..=4 {
                ctx.checkpoint()?;
                thread::sleep(work / 4);
                ctx.report_progress(step * 25);
            }
            let index = ctx.data()["index"].as_u64().unwrap_or(0) as usize;
            if fail_every > 0 && index % fail_every == 0 {
                return Err(format!("simulated failure on task #{index}").into());
            }
            Ok(json!({"task": ctx.task_id(), "type": ctx.task_type()}))
        });
    }

    for index in 1..=args.tasks {
        let task_type = TaskType::ALL[index % TaskType::ALL.len()];
        queue.add_task(
            task_type,
            &format!("{task_type} #{index}"),
            json!({ "index": index }),
        )?;
    }

    // Drop the queue inside the blocking task so the channel closes once
    // every worker has exited.
    let timeout = Duration::from_secs(args.timeout_secs);
    let waiter = tokio::task::spawn_blocking(move || {
        let drained = queue.wait_for_idle(timeout);
        let stats = queue.get_stats();
        queue.shutdown();
        (drained, stats)
    });

    while let Some(event) = events.recv().await {
        println!("{}", serde_json::to_string(&event)?);
    }

    let (drained, stats) = waiter.await?;
    info!(?stats, "Queue finished");
    println!("{}", serde_json::to_string(&stats)?);
    if !drained {
        bail!("queue did not drain within {}s", args.timeout_secs);
    }
    Ok(())
}

// =============================================================================
// Subtitles
// =============================================================================

async fn run_subtitles(args: SubtitlesArgs, settings: SessionSettings) -> Result<()> {
    let mut session = EditSession::new("subtitles", &settings)?;
    let track_id = session
        .timeline_mut()
        .add_track(ClipTrack::new_magnetic("V1"));

    for (i, duration) in args.clips.iter().enumerate() {
        let clip = Clip::new(&format!("source_{i}"), &format!("Clip {i}"), *duration);
        session.execute(Box::new(AddClipCommand::new(&track_id, clip)))?;
    }

    session.register_handler(TaskType::RemoveSub, |ctx| {
        let data = ctx.data();
        for step in 1..=2 {
            ctx.checkpoint()?;
            thread::sleep(Duration::from_millis(20));
            ctx.report_progress(step * 50);
        }
        let asset_id = data["assetId"].as_str().unwrap_or_default();
        Ok(json!({
            "trackId": data["trackId"],
            "clipId": data["clipId"],
            "assetId": format!("{asset_id}_nosub"),
            "proxyAssetId": format!("{asset_id}_nosub_proxy"),
        }))
    });

    let clips: Vec<_> = session
        .timeline()
        .track(&track_id)
        .context("track disappeared")?
        .clips()
        .to_vec();
    for clip in &clips {
        session.submit_task(
            TaskType::RemoveSub,
            &format!("Remove subtitles: {}", clip.name),
            json!({"trackId": track_id, "clipId": clip.id, "assetId": clip.asset_id}),
        )?;
    }

    let timeout = Duration::from_secs(args.timeout_secs);
    let mut waited = Duration::ZERO;
    let step = Duration::from_millis(50);
    loop {
        // Stats first: anything finished before this read is already queued
        // as an event and gets drained below.
        let stats = session.queue().get_stats();
        let events = session.pump_task_events();
        for event in &events {
            println!("{}", serde_json::to_string(event)?);
        }
        if stats.pending == 0 && stats.running == 0 {
            break;
        }
        if waited >= timeout {
            bail!("subtitle tasks did not finish within {}s", args.timeout_secs);
        }
        tokio::time::sleep(step).await;
        waited += step;
    }

    let applied = clips
        .iter()
        .filter(|original| {
            session
                .timeline()
                .find_clip(&original.id)
                .is_some_and(|(_, clip)| clip.asset_id != original.asset_id)
        })
        .count();

    let undone_last = undo_last_replacement(&mut session)?;

    let track = session
        .timeline()
        .track(&track_id)
        .context("track disappeared")?;
    let summary: Vec<_> = track
        .clips()
        .iter()
        .map(|c| json!({"name": c.name, "asset": c.asset_id, "preview": c.preview_asset_id()}))
        .collect();
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "applied": applied,
            "undoneLast": undone_last,
            "clips": summary,
        }))?
    );

    session.shutdown();
    Ok(())
}

/// Reverts the newest media replacement. Any other command on top of the
/// history (such as the clip setup) is left alone.
fn undo_last_replacement(session: &mut EditSession) -> Result<bool> {
    if session.history().last_command_type() != Some("ReplaceClipAsset") {
        return Ok(false);
    }
    Ok(session.undo()?)
}

// =============================================================================
// Settings
// =============================================================================

fn run_settings(args: SettingsArgs, manager: &SettingsManager) -> Result<()> {
    let settings = if args.reset {
        manager.reset()?
    } else if args.save {
        manager.save(&manager.load())?
    } else {
        manager.load()
    };

    println!("{}", serde_json::to_string_pretty(&settings)?);
    info!(path = %manager.settings_path().display(), "Settings");
    Ok(())
}
