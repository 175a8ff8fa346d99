//! autoclick - record/replay and click-loop automation
//!
//! `run` starts the interactive controller with global hotkeys; the other
//! subcommands are one-shot.

mod app;
mod commands;
mod logging;
mod pages;

use anyhow::Result;
use autoclick_core::platform::{InputSink, RdevSink, RdevSource, RecordingSink};
use autoclick_core::prelude::*;
use autoclick_core::storage;
use autoclick_core::{ConfigStore, MarkerList, RecordingStore};
use autoclick_hotkeys::HotkeyRegistry;
use autoclick_recorder::prelude::*;
use clap::{Parser, Subcommand};
use crossbeam_channel::{bounded, select, Receiver};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "autoclick")]
#[command(about = "Record and replay input, run marker click loops, drive both with global hotkeys")]
#[command(version)]
struct Cli {
    /// Config file (default: <config dir>/autoclick/app_config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive controller: hotkeys plus JSONL commands on stdin
    Run,
    /// Record until Ctrl+C and save under NAME
    Record {
        /// Bare names are kept in the recordings directory; paths are used as given
        name: String,
        /// Pointer sampling interval in seconds
        #[arg(long)]
        interval: Option<f64>,
    },
    /// Replay a recording in the foreground
    Play {
        name: String,
        #[arg(short, long)]
        speed: Option<f64>,
        /// -1 loops forever
        #[arg(long, allow_hyphen_values = true)]
        loops: Option<i64>,
        /// Pause between loops in seconds
        #[arg(long)]
        gap: Option<f64>,
        /// Pause before the first event in seconds
        #[arg(long)]
        delay: Option<f64>,
        /// Print actions instead of injecting them
        #[arg(long)]
        dry_run: bool,
    },
    /// Run the click loop of a saved profile
    Click {
        profile: PathBuf,
        #[arg(long, allow_hyphen_values = true)]
        loops: Option<i64>,
        #[arg(long)]
        delay: Option<f64>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Summarize a recording
    Show {
        name: String,
        #[arg(long)]
        all: bool,
    },
    /// List saved recordings
    List,
    /// Delete a saved recording
    Delete { name: String },
    /// Print the effective hotkey bindings
    Bindings,
}

#[derive(Serialize)]
struct Output<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<Error>,
}

impl<T: Serialize> Output<T> {
    fn ok(data: T) -> Self {
        Self { success: true, data: Some(data), error: None }
    }
    fn err(e: Error) -> Output<()> {
        Output { success: false, data: None, error: Some(e) }
    }
}

fn print_json<T: Serialize>(output: &T) {
    match serde_json::to_string_pretty(output) {
        Ok(s) => println!("{}", s),
        Err(e) => tracing::error!(error = %e, "could not serialize output"),
    }
}

fn main() {
    logging::init();
    let cli = Cli::parse();

    let result = config_store(cli.config.as_deref()).and_then(|store| match cli.command {
        Commands::Run => run(store),
        Commands::Record { name, interval } => record(&store, &name, interval),
        Commands::Play { name, speed, loops, gap, delay, dry_run } => {
            play(&store, &name, PlayArgs { speed, loops, gap, delay }, dry_run)
        }
        Commands::Click { profile, loops, delay, dry_run } => click(&profile, loops, delay, dry_run),
        Commands::Show { name, all } => show(&name, all),
        Commands::List => list(),
        Commands::Delete { name } => delete(&name),
        Commands::Bindings => bindings(&store),
    });

    if let Err(e) = result {
        if let Some(err) = e.downcast_ref::<Error>() {
            print_json(&Output::<()>::err(err.clone()));
        }
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn config_store(path: Option<&Path>) -> Result<ConfigStore> {
    Ok(match path {
        Some(p) => ConfigStore::new(p),
        None => ConfigStore::open_default()?,
    })
}

fn sink(dry_run: bool) -> Arc<dyn InputSink> {
    if dry_run {
        Arc::new(RecordingSink::echoing())
    } else {
        Arc::new(RdevSink::new())
    }
}

/// Fires once on the first Ctrl+C
fn interrupt_channel() -> Result<Receiver<()>> {
    let (tx, rx) = bounded(1);
    ctrlc::set_handler(move || {
        let _ = tx.try_send(());
    })?;
    Ok(rx)
}

fn run(store: ConfigStore) -> Result<()> {
    let interrupt = interrupt_channel()?;
    let mut app = app::App::new(store, RdevSource::shared(), sink(false));
    let commands = commands::spawn_stdin_reader(app.notifier())?;
    app.run(commands, interrupt);
    Ok(())
}

fn record(store: &ConfigStore, name: &str, interval: Option<f64>) -> Result<()> {
    let interval = interval.unwrap_or(store.load().recorder.params.interval);
    let recordings = RecordingStore::new()?;
    let file = recordings.resolve(name);
    let interrupt = interrupt_channel()?;
    let (notifier, events) = Notifier::channel();
    let mut recorder = Recorder::new(RdevSource::shared(), notifier);
    recorder.start(interval)?;
    println!("Recording to {} (Ctrl+C to stop)", file.display());

    loop {
        select! {
            recv(events) -> msg => {
                if let Ok(AppEvent::Log { source, message }) = msg {
                    logging::print_line(source, &message);
                }
            }
            recv(interrupt) -> _ => break,
        }
    }
    recorder.stop();
    for event in events.try_iter() {
        if let AppEvent::Log { source, message } = event {
            logging::print_line(source, &message);
        }
    }
    let recording = recorder.recording();
    if recording.is_empty() {
        return Err(Error::no_data("nothing recorded").into());
    }
    let file = recordings.save(name, &recording)?;
    println!("Saved {} events: {}", recording.len(), file.display());
    Ok(())
}

struct PlayArgs {
    speed: Option<f64>,
    loops: Option<i64>,
    gap: Option<f64>,
    delay: Option<f64>,
}

fn play(store: &ConfigStore, name: &str, args: PlayArgs, dry_run: bool) -> Result<()> {
    let defaults = store.load().recorder.params;
    let loops = match args.loops {
        Some(n) => LoopCount::from_i64(n)?,
        None => defaults.loops,
    };
    let replayer = Replayer::new()
        .speed(args.speed.unwrap_or(defaults.speed))
        .loops(loops)
        .gap(args.gap.unwrap_or(defaults.gap))
        .delay(args.delay.unwrap_or(defaults.delay));

    let recording = RecordingStore::new()?.load(name)?;
    let interrupt = interrupt_channel()?;
    let (notifier, events) = Notifier::channel();
    let mut player = Player::new(sink(dry_run), notifier);
    player.start(&recording, replayer)?;

    follow(&events, &interrupt, || player.stop());
    if let Some(stats) = player.join() {
        print_json(&Output::ok(stats));
    }
    Ok(())
}

fn click(profile: &Path, loops: Option<i64>, delay: Option<f64>, dry_run: bool) -> Result<()> {
    let profile = storage::load_profile(profile)?;
    let loops = match loops {
        Some(n) => LoopCount::from_i64(n)?,
        None => profile.config.loops,
    };
    let options = ClickOptions {
        loops,
        start_delay: delay.unwrap_or(profile.config.delay),
    };
    let markers = MarkerList::from_records(&profile.markers);

    let interrupt = interrupt_channel()?;
    let (notifier, events) = Notifier::channel();
    let mut runner = ClickRunner::new(sink(dry_run), notifier);
    runner.start(markers.snapshot(), options)?;

    follow(&events, &interrupt, || runner.stop());
    runner.join();
    Ok(())
}

/// Print log lines until the run ends; the first Ctrl+C cancels it
fn follow(events: &Receiver<AppEvent>, interrupt: &Receiver<()>, stop: impl Fn() -> bool) {
    loop {
        select! {
            recv(events) -> msg => match msg {
                Ok(AppEvent::Log { source, message }) => logging::print_line(source, &message),
                Ok(AppEvent::Ended { .. }) | Err(_) => break,
                Ok(_) => {}
            },
            recv(interrupt) -> _ => {
                stop();
            }
        }
    }
}

#[derive(Serialize)]
struct RecordingSummary {
    file: String,
    events: usize,
    duration_secs: f64,
    counts: BTreeMap<&'static str, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    all: Option<Vec<Event>>,
}

fn show(name: &str, all: bool) -> Result<()> {
    let recordings = RecordingStore::new()?;
    let file = recordings.resolve(name);
    let recording = storage::load_recording(&file)?;
    let mut counts = BTreeMap::new();
    for e in recording.events() {
        *counts.entry(e.kind.name()).or_insert(0) += 1;
    }
    print_json(&Output::ok(RecordingSummary {
        file: file.display().to_string(),
        events: recording.len(),
        duration_secs: recording.duration(),
        counts,
        all: all.then(|| recording.events().to_vec()),
    }));
    Ok(())
}

#[derive(Serialize)]
struct RecordingList {
    dir: String,
    recordings: Vec<String>,
}

fn list() -> Result<()> {
    let store = RecordingStore::new()?;
    print_json(&Output::ok(RecordingList {
        dir: store.path().display().to_string(),
        recordings: store.list()?,
    }));
    Ok(())
}

fn delete(name: &str) -> Result<()> {
    let store = RecordingStore::new()?;
    let file = store.resolve(name);
    store.delete(name)?;
    print_json(&Output::ok(file.display().to_string()));
    Ok(())
}

#[derive(Serialize)]
struct BindingsReport {
    config: String,
    bindings: BTreeMap<String, autoclick_core::HotkeyMap>,
    repairs: Vec<autoclick_hotkeys::Repair>,
    warnings: Vec<String>,
}

fn bindings(store: &ConfigStore) -> Result<()> {
    let config = store.load();
    let (registry, repairs, warnings) = HotkeyRegistry::from_config(&config);
    let bindings = registry
        .tables()
        .iter()
        .map(|t| (t.group().to_string(), t.to_map()))
        .collect();
    print_json(&Output::ok(BindingsReport {
        config: store.path().display().to_string(),
        bindings,
        repairs,
        warnings,
    }));
    Ok(())
}
