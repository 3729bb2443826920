//! Accolade - Demo Walkthrough
//!
//! Plays a scripted run of the narrative scenes against a real engine:
//! file-backed persistence, terminal toasts, and the unlock chime.
//! Run it twice to see toast deduplication across sessions, or with
//! `--reset` to start a fresh profile.

use std::env;
use std::fs::OpenOptions;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use crossterm::style::Stylize;
use serde_json::json;

use accolade::audio::KiraChime;
use accolade::bus::{self, LocalBus};
use accolade::catalog::{export_default, load_or_default, CATALOG_PATH};
use accolade::engine::REGISTRATION_EVENT;
use accolade::notify::TerminalPresenter;
use accolade::{AchievementEngine, EngineSettings, JsonFileStore, ProfileStore};

/// Cadence at which the demo drives the engine's timers.
const TICK: Duration = Duration::from_millis(50);

fn main() -> Result<()> {
    init_logging();
    log::info!("Starting accolade demo v{}", env!("CARGO_PKG_VERSION"));

    let args: Vec<String> = env::args().skip(1).collect();
    if args.iter().any(|a| a == "--export-catalog") {
        export_default(CATALOG_PATH)?;
        println!("Wrote default catalog to {}", CATALOG_PATH);
        return Ok(());
    }

    let store: Arc<dyn ProfileStore> = match env::var("ACCOLADE_DATA") {
        Ok(dir) => Arc::new(JsonFileStore::new(dir)),
        Err(_) => Arc::new(JsonFileStore::in_default_dir()),
    };

    let settings = EngineSettings {
        presenter: Arc::new(TerminalPresenter),
        chime: Arc::new(KiraChime::new()),
        ..EngineSettings::default()
    };
    let engine = Arc::new(AchievementEngine::with_settings(store, settings));

    if args.iter().any(|a| a == "--reset") {
        engine.clear_all();
        println!("Cleared achievement state.");
    }

    engine.on_unlock(|notice| {
        log::info!("Listener saw unlock of {}", notice.id);
    });

    let catalog = load_or_default(CATALOG_PATH);
    catalog.install(&engine);

    let app_bus = Arc::new(LocalBus::new());
    bus::attach(&engine, app_bus.clone());

    println!("{}", "A short story, with achievements".bold());
    run_story(&engine, &app_bus);
    print_gallery(&engine);

    log::info!("Demo finished");
    Ok(())
}

/// Log to a file so toast output stays readable.
fn init_logging() {
    let log_file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open("accolade.log")
        .unwrap_or_else(|_| OpenOptions::new().write(true).open("/dev/null").unwrap());

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .init();
}

/// Play the scenes in order, pausing between beats so toast batches get
/// their display windows.
fn run_story(engine: &AchievementEngine, app_bus: &LocalBus) {
    engine.record_event(REGISTRATION_EVENT, None);

    pause(engine, 300);
    println!("  > The screen flickers to life.");
    engine.record_event("scene0:started", None);

    pause(engine, 800);
    println!("  > You type your name. It knows you.");
    engine.record_event("scene0:identity_confirmed", None);

    pause(engine, 1_200);
    println!("  > The exam. Ten questions, zero mistakes.");
    engine.record_event("scene1:exam_finished", Some(json!({ "score": 100 })));

    pause(engine, 900);
    println!("  > Every mine flagged, none triggered.");
    engine.record_event("scene2:minefield_cleared", None);

    println!("  > The sliding puzzle fights back.");
    for _ in 0..5 {
        pause(engine, 150);
        engine.record_event("scene3:puzzle_retry", None);
    }
    pause(engine, 600);
    engine.record_event("scene3:slider_solved", None);

    pause(engine, 900);
    println!("  > The years fall into place.");
    engine.record_event("scene4:timeline_sorted", None);

    // this one arrives over the application bus instead of a direct call
    pause(engine, 400);
    println!("  > Someone opened the debug panel. On purpose.");
    app_bus.announce("debug:panel_opened", Some(json!({ "deliberate": true })));

    pause(engine, 500);
    println!("  > The final scene.");
    engine.record_event("scene5:finale_reached", None);

    // let the last batch display and tear down
    pause(engine, 4_500);
}

/// Sleep for `total_ms` while keeping the engine's timers moving.
fn pause(engine: &AchievementEngine, total_ms: u64) {
    let mut remaining = Duration::from_millis(total_ms);
    loop {
        engine.tick();
        if remaining.is_zero() {
            break;
        }
        let step = remaining.min(TICK);
        thread::sleep(step);
        remaining -= step;
    }
}

fn print_gallery(engine: &AchievementEngine) {
    println!();
    println!("{}", "Gallery".bold());
    let listed = engine.list_registered();
    for entry in &listed {
        let mark = if entry.unlocked { "[x]" } else { "[ ]" };
        let description = if entry.meta.is_description_visible() {
            entry.meta.description.as_str()
        } else {
            "???"
        };
        println!("  {} {}: {}", mark, entry.meta.title, description);
    }
    let unlocked = listed.iter().filter(|entry| entry.unlocked).count();
    println!("  {} of {} unlocked", unlocked, listed.len());
    if let Some(elapsed) = engine.elapsed_since_registered(None) {
        println!("  Elapsed since registration: {:.1}s", elapsed as f64 / 1000.0);
    }
}
