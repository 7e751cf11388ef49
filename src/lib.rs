// Music.AI - prompt, simulated generation, single-track player
// Module declarations
pub mod audio;
pub mod commands;
pub mod error;
pub mod generation;
pub mod metadata;
pub mod player;
pub mod settings;
pub mod state;

use anyhow::{Context, Result};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use audio::{RenderEngine, SymphoniaEngine, UnavailableEngine};
use commands::PlayerCommand;
use generation::{GenerationOutcome, GenerationRequest, ProgressSimulator};
use metadata::TrackInfo;
use player::{format_time, PlaybackController, PlaybackState};
use settings::AppSettings;
use state::AppState;

pub use error::{PlaybackError, PlaybackResult};

/// Run the prompt -> generating -> player flow. `args` form the prompt.
pub async fn run(args: Vec<String>) -> Result<()> {
    let state = AppState::load();
    let request = GenerationRequest::new(args.join(" "));

    match generate(&request, &state.settings).await {
        GenerationOutcome::Completed => {}
        GenerationOutcome::Aborted => {
            info!("Generation aborted before completion");
            return Ok(());
        }
    }

    // The player opens whether or not the asset loads; a failed load is
    // shown as a notice and the controls stay inert.
    play(&state.settings).await
}

async fn generate(request: &GenerationRequest, settings: &AppSettings) -> GenerationOutcome {
    let mut simulator = ProgressSimulator::new(request.clone(), settings.generation.simulator_config());

    let mut progress = simulator.subscribe();
    let printer = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let percent = progress.borrow_and_update().percent_complete;
            print!("\rGenerating your music... {:>3}%", percent);
            let _ = std::io::stdout().flush();
        }
    });

    let outcome = simulator.run().await;
    // Dropping the simulator closes the progress channel and ends the printer
    drop(simulator);
    let _ = printer.await;
    println!();
    outcome
}

async fn play(settings: &AppSettings) -> Result<()> {
    let asset = settings.playback.resolve_asset();

    let engine: Box<dyn RenderEngine> = match SymphoniaEngine::new() {
        Ok(engine) => Box::new(engine),
        Err(e) => {
            warn!("{}", e);
            Box::new(UnavailableEngine::new(e))
        }
    };

    let mut controller = PlaybackController::new(engine, asset.clone(), settings.playback.player_config());
    controller.prepare();
    controller.set_volume(settings.playback.initial_volume);

    let info = TrackInfo::read(&asset, &settings.track.track_info());
    println!("{} - {}", info.title, info.artist);
    if let Some(err) = &controller.state().load_error {
        println!("Playback unavailable: {}", err);
    }
    println!("p play/pause | f/b skip | s <secs> seek | v <0-1> volume | q quit");
    print_status(controller.state());

    let mut status = controller.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read from stdin")? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match line.parse::<PlayerCommand>() {
                    Ok(command) => {
                        if !commands::apply(&mut controller, command) {
                            break;
                        }
                    }
                    Err(e) => println!("{}", e),
                }
            }
            Some(event) = controller.next_event() => controller.handle_event(event),
            Ok(()) = status.changed() => {
                let snapshot = status.borrow_and_update().clone();
                print_status(&snapshot);
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    controller.shutdown();
    println!();
    Ok(())
}

fn print_status(state: &PlaybackState) {
    let label = if state.is_playing { "playing" } else { "paused " };
    print!(
        "\r[{}] {} / {}  vol {:>3}%",
        label,
        format_time(state.position),
        format_time(state.duration),
        (state.volume * 100.0).round() as u32
    );
    let _ = std::io::stdout().flush();
}
