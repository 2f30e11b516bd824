//! LangV media command-line tool
//!
//! Runs the player's media side-channel without a UI: list embedded subtitle
//! tracks, extract one to SRT, inspect an SRT file, grab a preview frame, or
//! simulate playback to watch subtitle changes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

use langv_media::core::captions::{export_srt, find_active, format_srt_timestamp, parse_srt_file};
use langv_media::core::events::SessionEvent;
use langv_media::core::settings::default_settings_dir;
use langv_media::core::sync::{SlotId, TrackStatus};
use langv_media::logging::init_logging_with_level;
use langv_media::{MediaSession, MediaSettings, SettingsManager, TrackChoice};

#[derive(Parser)]
#[command(name = "langv-cli", version, about = "LangV media tools")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Settings directory (defaults to the player's config dir)
    #[arg(long, global = true)]
    settings_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List embedded subtitle tracks
    Probe { video: PathBuf },

    /// Extract an embedded subtitle track to SRT
    Extract {
        video: PathBuf,
        /// Subtitle-local track index (0 = first subtitle stream)
        track: usize,
        /// Output file; stdout when omitted
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Show the cues of an SRT file, or the one active at a time
    Cues {
        file: PathBuf,
        /// Playback time in milliseconds
        #[arg(long)]
        at: Option<i64>,
    },

    /// Save a seek-bar preview frame as JPEG
    Thumbnail {
        video: PathBuf,
        /// Playback time in milliseconds
        time_ms: i64,
        #[arg(long, default_value = "thumbnail.jpg")]
        out: PathBuf,
        /// Video duration in milliseconds
        #[arg(long)]
        duration: Option<i64>,
    },

    /// Simulate playback and print subtitle changes as they happen
    Play {
        video: PathBuf,
        /// External SRT for the primary slot
        #[arg(long, conflicts_with = "track")]
        subs: Option<PathBuf>,
        /// Embedded track for the primary slot
        #[arg(long)]
        track: Option<usize>,
        /// External SRT for the secondary slot
        #[arg(long)]
        secondary: Option<PathBuf>,
        #[arg(long, default_value_t = 0)]
        from: i64,
        #[arg(long, default_value_t = 60_000)]
        to: i64,
        /// Playback speed multiplier
        #[arg(long, default_value_t = 10.0)]
        speed: f64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    init_logging_with_level(None, level);

    let settings_dir = cli.settings_dir.unwrap_or_else(default_settings_dir);
    let settings = SettingsManager::new(settings_dir).load();

    match cli.command {
        Command::Cues { file, at } => show_cues(&file, at),
        Command::Probe { video } => probe(settings, &video).await,
        Command::Extract { video, track, out } => extract(settings, &video, track, out).await,
        Command::Thumbnail {
            video,
            time_ms,
            out,
            duration,
        } => thumbnail(settings, &video, time_ms, &out, duration).await,
        Command::Play {
            video,
            subs,
            track,
            secondary,
            from,
            to,
            speed,
        } => {
            let session = open(settings, &video, to).await?;
            match (subs, track) {
                (Some(path), _) => {
                    session.load_external(SlotId::Primary, &path).await;
                }
                (None, Some(index)) => {
                    session.probe_tracks().await;
                    session
                        .select_track(SlotId::Primary, TrackChoice::Embedded(index))
                        .await;
                }
                (None, None) => {}
            }
            if let Some(path) = secondary {
                session.load_external(SlotId::Secondary, &path).await;
            }
            play(&session, from, to, speed).await
        }
    }
}

async fn open(settings: MediaSettings, video: &Path, duration_ms: i64) -> anyhow::Result<MediaSession> {
    if !video.exists() {
        bail!("video not found: {}", video.display());
    }
    let session = MediaSession::new(settings).await;
    match session.tool_info().await {
        Some(info) => tracing::debug!("Using {} ({})", info.ffmpeg_path.display(), info.version),
        None => bail!("FFmpeg not found; install it or set tools.ffmpegPath in the settings"),
    }
    session.load_video(video, duration_ms);
    Ok(session)
}

async fn probe(settings: MediaSettings, video: &Path) -> anyhow::Result<()> {
    let session = open(settings, video, 0).await?;
    let tracks = session.probe_tracks().await;
    if tracks.is_empty() {
        println!("(no embedded subtitles)");
    }
    for track in tracks {
        let kind = if track.is_bitmap() { ", bitmap" } else { "" };
        println!(
            "{:>2}  {}  [{}{}]",
            track.subtitle_index,
            track.display_name(),
            track.codec,
            kind
        );
    }
    Ok(())
}

async fn extract(
    settings: MediaSettings,
    video: &Path,
    track: usize,
    out: Option<PathBuf>,
) -> anyhow::Result<()> {
    let session = open(settings, video, 0).await?;
    session.probe_tracks().await;

    match session
        .select_track(SlotId::Primary, TrackChoice::Embedded(track))
        .await
    {
        TrackStatus::Loaded { name, count } => {
            let srt = export_srt(&session.slot(SlotId::Primary).snapshot());
            match out {
                Some(path) => {
                    std::fs::write(&path, srt)
                        .with_context(|| format!("writing {}", path.display()))?;
                    println!("{}: {} cue(s) -> {}", name, count, path.display());
                }
                None => print!("{}", srt),
            }
            Ok(())
        }
        TrackStatus::Failed { name, reason } => bail!("{}: {}", name, reason),
        other => bail!("unexpected track state: {}", other.label()),
    }
}

async fn thumbnail(
    settings: MediaSettings,
    video: &Path,
    time_ms: i64,
    out: &Path,
    duration: Option<i64>,
) -> anyhow::Result<()> {
    // Without a known duration the requested time is the upper bound
    let duration = duration.unwrap_or(time_ms.saturating_add(1));
    let session = open(settings, video, duration).await?;

    let Some(thumbnail) = session.thumbnail_at(time_ms).await else {
        bail!("no frame produced at {}", format_srt_timestamp(time_ms));
    };
    thumbnail.save(out)?;
    println!(
        "{}x{} frame at {} -> {}",
        thumbnail.width(),
        thumbnail.height(),
        format_srt_timestamp(thumbnail.time_ms()),
        out.display()
    );
    Ok(())
}

fn show_cues(file: &Path, at: Option<i64>) -> anyhow::Result<()> {
    if !file.exists() {
        bail!("file not found: {}", file.display());
    }
    let cues = parse_srt_file(file);
    match at {
        Some(time_ms) => match find_active(&cues, time_ms) {
            Some(cue) => println!("{}", cue),
            None => println!("(no cue at {})", format_srt_timestamp(time_ms)),
        },
        None => {
            for cue in &cues {
                println!("{}", cue);
            }
            println!("{} cue(s)", cues.len());
        }
    }
    Ok(())
}

/// Feeds a simulated clock into the session and prints what the overlay
/// would show
async fn play(session: &MediaSession, from: i64, to: i64, speed: f64) -> anyhow::Result<()> {
    let Some(mut events) = session.subscribe() else {
        bail!("event stream already taken");
    };
    if to <= from {
        bail!("--to must be after --from");
    }
    let speed = speed.clamp(0.1, 1000.0);

    let position = session.position().clone();
    position.seek_to(from);
    let driver = session.spawn_position_driver();

    let step = Duration::from_millis(session.settings().sync.position_tick_ms);
    let advance = (step.as_millis() as f64 * speed) as i64;
    let mut clock = tokio::spawn(async move {
        let mut now = from;
        while now <= to {
            position.report(now);
            tokio::time::sleep(step).await;
            now += advance.max(1);
        }
    });

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = &mut clock => break,
            event = events.recv() => match event {
                Some(event) => print_event(session, from, event),
                None => break,
            },
        }
    }
    // Changes published by the last ticks are still queued
    while let Ok(event) = events.try_recv() {
        print_event(session, from, event);
    }

    session.shutdown();
    driver.await.context("position driver")?;
    Ok(())
}

fn print_event(session: &MediaSession, from: i64, event: SessionEvent) {
    match event {
        SessionEvent::ActiveCueChanged { slot, cue } => {
            let time = session.position().current().unwrap_or(from);
            match cue {
                Some(cue) => println!("{} {:<9} {}", format_srt_timestamp(time), slot, cue.text),
                None => println!("{} {:<9} -", format_srt_timestamp(time), slot),
            }
        }
        SessionEvent::TrackStatusChanged { slot, status } => {
            eprintln!("{}: {}", slot, status.label());
        }
        _ => {}
    }
}
