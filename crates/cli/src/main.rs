use anyhow::Context;
use clap::Parser;
use moodbeat_core::analytics::{format_duration, Insight, SessionSnapshot};
use moodbeat_core::catalog::{AudiusTrackProvider, OfflineTrackProvider, TrackProvider};
use moodbeat_core::config::{
    resolve_provider_config, AppConfig, AutoplayDelay, Env, PlayerConfig, StdEnv, TracksPerFetch,
    Volume, DEFAULT_AUTOPLAY_DELAY_MS, DEFAULT_TRACKS_PER_FETCH, DEFAULT_VOLUME,
};
use moodbeat_core::emotion::{parse_ticks, EmotionTick};
use moodbeat_core::playback::{AudioSink, DummyAudioSink, PlayerView};
use moodbeat_core::session::{Notification, Session, SessionHandle};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "moodbeat")]
#[command(about = "Replay an emotion feed through the mood-driven player and report on the session")]
struct Args {
    /// JSON-lines emotion feed; reads stdin when omitted.
    #[arg(long)]
    ticks: Option<PathBuf>,

    /// Delay between replayed ticks.
    #[arg(long, default_value_t = 500)]
    pace_ms: u64,

    /// Use the built-in catalog instead of Audius.
    #[arg(long)]
    offline: bool,

    #[arg(long)]
    audius_url: Option<String>,

    #[arg(long)]
    audius_app_name: Option<String>,

    #[arg(long, default_value_t = DEFAULT_TRACKS_PER_FETCH)]
    tracks_per_fetch: usize,

    #[arg(long, default_value_t = DEFAULT_AUTOPLAY_DELAY_MS)]
    autoplay_delay_ms: u64,

    #[arg(long, default_value_t = DEFAULT_VOLUME)]
    volume: f32,

    /// Advance to the next track at end of track but stay paused.
    #[arg(long)]
    stop_on_track_end: bool,

    /// Play through the default output device.
    #[cfg(feature = "rodio-output")]
    #[arg(long)]
    audio: bool,

    /// Print the report as JSON.
    #[arg(long)]
    json: bool,

    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level)?;

    let env = StdEnv;
    let cfg = build_config(&args, &env)?;
    tracing::info!(
        provider = %cfg.provider.base_url,
        offline = args.offline,
        tracks_per_fetch = cfg.player.tracks_per_fetch.get(),
        autoplay_delay_ms = cfg.player.autoplay_delay.delay_ms(),
        "config loaded"
    );

    let ticks = read_ticks(args.ticks.as_ref())?;
    tracing::info!(ticks = ticks.len(), "emotion feed loaded");

    let provider: Arc<dyn TrackProvider> = if args.offline {
        Arc::new(OfflineTrackProvider::new())
    } else {
        Arc::new(AudiusTrackProvider::new(&cfg.provider)?)
    };
    let pace = Duration::from_millis(args.pace_ms);

    #[cfg(feature = "rodio-output")]
    if args.audio {
        let sink = moodbeat_core::playback::RodioAudioSink::new()?;
        let report = run_session(cfg.player, provider, sink, ticks, pace).await?;
        return print_report(&report, args.json);
    }

    let report = run_session(cfg.player, provider, DummyAudioSink::new(), ticks, pace).await?;
    print_report(&report, args.json)
}

fn init_tracing(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(
            level
                .parse()
                .with_context(|| format!("invalid --log-level: {level}"))?,
        )
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn build_config(args: &Args, env: &impl Env) -> anyhow::Result<AppConfig> {
    let provider = resolve_provider_config(
        args.audius_url.clone(),
        args.audius_app_name.clone(),
        env,
    )?;
    let player = PlayerConfig {
        autoplay_delay: AutoplayDelay::new(args.autoplay_delay_ms)?,
        initial_volume: Volume::new(args.volume)?,
        tracks_per_fetch: TracksPerFetch::new(args.tracks_per_fetch)?,
        resume_on_track_end: !args.stop_on_track_end,
    };
    Ok(AppConfig { provider, player })
}

fn read_ticks(path: Option<&PathBuf>) -> anyhow::Result<Vec<EmotionTick>> {
    match path {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            parse_ticks(BufReader::new(file))
                .with_context(|| format!("invalid emotion feed in {}", path.display()))
        }
        None => parse_ticks(std::io::stdin().lock()).context("invalid emotion feed on stdin"),
    }
}

struct Report {
    snapshot: SessionSnapshot,
    insights: Vec<Insight>,
    player: PlayerView,
}

async fn run_session<S: AudioSink>(
    player: PlayerConfig,
    provider: Arc<dyn TrackProvider>,
    sink: S,
    ticks: Vec<EmotionTick>,
    pace: Duration,
) -> anyhow::Result<Report> {
    let (session, handle, mut notes) = Session::new(player, provider, sink);

    let log_notifications = async move {
        while let Some(note) = notes.recv().await {
            log_notification(&note);
        }
    };

    let (_, report, _) = tokio::join!(
        session.run(),
        replay(handle, ticks, pace),
        log_notifications
    );
    report
}

async fn replay(
    handle: SessionHandle,
    ticks: Vec<EmotionTick>,
    pace: Duration,
) -> anyhow::Result<Report> {
    let result = replay_inner(&handle, ticks, pace).await;
    // the loop must end even when replay failed, or join! never returns
    let _ = handle.shutdown();
    result
}

async fn replay_inner(
    handle: &SessionHandle,
    ticks: Vec<EmotionTick>,
    pace: Duration,
) -> anyhow::Result<Report> {
    handle.start_session()?;
    for tick in ticks {
        tracing::debug!(emotion = %tick.emotion, confidence = %tick.confidence, "replaying tick");
        handle.on_emotion_tick(tick)?;
        tokio::time::sleep(pace).await;
    }
    handle.stop_session()?;

    let snapshot = handle.snapshot().await?;
    let insights = handle.insights().await?;
    let player = handle.player().await?;
    Ok(Report {
        snapshot,
        insights,
        player,
    })
}

fn log_notification(note: &Notification) {
    match note {
        Notification::PlayingForMood { emotion, count } => {
            tracing::info!(%emotion, count, "now playing tracks for mood")
        }
        Notification::QueuedForMood { emotion, count } => {
            tracing::info!(%emotion, count, "queued tracks for mood")
        }
        Notification::NoTracksFound { emotion } => {
            tracing::warn!(%emotion, "no tracks found for mood")
        }
        Notification::TrackFetchFailed { emotion, reason } => {
            tracing::warn!(%emotion, %reason, "could not fetch tracks")
        }
        Notification::PlaybackFailed { details } => {
            tracing::warn!(%details, "playback failed")
        }
    }
}

fn print_report(report: &Report, json: bool) -> anyhow::Result<()> {
    if json {
        let value = serde_json::json!({
            "session": report.snapshot,
            "breakdown": report.snapshot.breakdown(),
            "insights": report.insights,
            "player": report.player,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let snapshot = &report.snapshot;
    println!("Session duration: {}", format_duration(snapshot.duration));
    println!("Readings: {}", snapshot.log.len());
    println!("Emotion changes: {}", snapshot.change_count);

    println!();
    println!("Emotion breakdown:");
    for share in snapshot.breakdown() {
        println!(
            "  {:<10} {:>5.1}%  ({})",
            share.emotion.as_str(), share.percentage, share.count
        );
    }

    if let Some(track) = &report.player.current_track {
        println!();
        println!(
            "Now loaded: {} by {} ({} in queue)",
            track.title,
            track.artist,
            report.player.queue.len()
        );
    }

    println!();
    println!("Insights:");
    for insight in &report.insights {
        println!("  [{:?}] {}", insight.kind, insight.title);
        println!("    {}", insight.description);
        println!("    -> {}", insight.recommendation);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use moodbeat_core::config::{MapEnv, ENV_AUDIUS_BASE_URL};

    #[test]
    fn defaults_build_a_valid_config() {
        let args = Args::parse_from(["moodbeat", "--offline"]);
        let cfg = build_config(&args, &MapEnv::default()).expect("config");
        assert_eq!(cfg.player, PlayerConfig::default());
    }

    #[test]
    fn flags_override_player_settings() {
        let args = Args::parse_from([
            "moodbeat",
            "--autoplay-delay-ms",
            "5000",
            "--volume",
            "0.25",
            "--tracks-per-fetch",
            "6",
            "--stop-on-track-end",
        ]);
        let cfg = build_config(&args, &MapEnv::default()).expect("config");
        assert_eq!(cfg.player.autoplay_delay.delay_ms(), 5000);
        assert_eq!(cfg.player.initial_volume.level(), 0.25);
        assert_eq!(cfg.player.tracks_per_fetch.get(), 6);
        assert!(!cfg.player.resume_on_track_end);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let env = MapEnv::default();
        for flags in [
            ["--volume", "1.5"],
            ["--tracks-per-fetch", "0"],
            ["--autoplay-delay-ms", "0"],
        ] {
            let args = Args::parse_from(std::iter::once("moodbeat").chain(flags));
            assert!(build_config(&args, &env).is_err(), "{flags:?}");
        }
    }

    #[test]
    fn audius_url_falls_back_to_env() {
        let env = MapEnv::default().with_var(ENV_AUDIUS_BASE_URL, "http://localhost:5000");
        let args = Args::parse_from(["moodbeat"]);
        let cfg = build_config(&args, &env).expect("config");
        assert_eq!(cfg.provider.base_url.as_str(), "http://localhost:5000/");
    }

    #[tokio::test(start_paused = true)]
    async fn offline_replay_produces_a_report() {
        let ticks = parse_ticks(
            concat!(
                "{\"emotion\":\"happy\",\"confidence\":80}\n",
                "{\"emotion\":\"happy\",\"confidence\":90}\n",
                "{\"emotion\":\"sad\",\"confidence\":70}\n",
            )
            .as_bytes(),
        )
        .expect("feed");
        let report = run_session(
            PlayerConfig::default(),
            Arc::new(OfflineTrackProvider::new()),
            DummyAudioSink::new(),
            ticks,
            Duration::from_millis(500),
        )
        .await
        .expect("report");

        assert_eq!(report.snapshot.change_count, 1);
        assert_eq!(report.snapshot.log.len(), 3);
        assert_eq!(report.player.queue.len(), 6);
        assert!(!report.insights.is_empty());
    }
}
