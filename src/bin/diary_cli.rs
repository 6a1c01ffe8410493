use anyhow::{bail, Context, Result};
use std::env;
use std::path::Path;
use std::sync::Arc;
use videodiary::capture::SessionState;
use videodiary::{Diary, DiaryConfig, RecordingOutcome};

const USAGE: &str = "Usage: diary-cli <record|list [--json]|delete <name>|usage|poster <name> <out.jpg>>";

#[tokio::main]
async fn main() -> Result<()> {
    videodiary::init_logging();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("{}", USAGE);
        std::process::exit(1);
    }

    let diary = Diary::native(DiaryConfig::load_or_default());
    match args[1].as_str() {
        "record" => cmd_record(&diary).await,
        "list" => cmd_list(&diary, &args),
        "delete" => cmd_delete(&diary, &args),
        "usage" => {
            println!("{}", diary.storage_used());
            Ok(())
        }
        "poster" => cmd_poster(&diary, &args).await,
        other => {
            eprintln!("Unknown command: {}\n{}", other, USAGE);
            std::process::exit(1);
        }
    }
}

async fn cmd_record(diary: &Diary) -> Result<()> {
    let screen = Arc::new(diary.open_camera());
    let state = screen.ready().await;
    if state != SessionState::Running {
        bail!("Camera session did not start ({:?})", state);
    }

    // Ctrl-C ends the clip early; whatever was captured is still stored
    let interrupted = screen.clone();
    ctrlc::set_handler(move || {
        eprintln!("Stopping recording...");
        interrupted.controller().stop_recording();
    })
    .context("Failed to install Ctrl-C handler")?;

    let mut status = screen.status();
    if !screen.start_countdown() {
        bail!("Countdown could not be started");
    }

    let mut last_countdown = None;
    let mut announced = false;
    while status.changed().await.is_ok() {
        let current = status.borrow_and_update().clone();
        if current.completed >= 1 {
            break;
        }
        if let Some(secs) = current.countdown.filter(|s| *s > 0) {
            if last_countdown != Some(secs) {
                println!("{}", secs);
                last_countdown = Some(secs);
            }
        }
        if current.recording && !announced {
            println!("Recording...");
            announced = true;
        }
    }

    let outcome = screen.wait_for_completed(1).await;
    screen.close();
    match outcome {
        Some(RecordingOutcome::Saved { path, stats, .. }) => {
            println!(
                "Saved {} ({} frames, {} audio packets, {:.1}s)",
                path.display(),
                stats.video_frames,
                stats.audio_frames,
                stats.duration_secs
            );
            Ok(())
        }
        Some(RecordingOutcome::Failed { error, .. }) => bail!("Recording failed: {}", error),
        None => bail!("Recording ended without an outcome"),
    }
}

fn cmd_list(diary: &Diary, args: &[String]) -> Result<()> {
    let records = diary.store().records();
    if args.contains(&"--json".to_string()) {
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else {
        for record in &records {
            println!("{}  {} bytes", record.name, record.size_bytes);
        }
        println!("{} clips, {}", records.len(), diary.storage_used());
    }
    Ok(())
}

fn cmd_delete(diary: &Diary, args: &[String]) -> Result<()> {
    let Some(name) = args.get(2) else {
        bail!("Usage: diary-cli delete <name>");
    };
    let store = diary.store();
    let path = store.root().join(name);
    if !path.is_file() {
        bail!("No clip named {}", name);
    }
    store.try_delete(&path)?;
    println!("Deleted {}", name);
    Ok(())
}

async fn cmd_poster(diary: &Diary, args: &[String]) -> Result<()> {
    let (Some(name), Some(out)) = (args.get(2), args.get(3)) else {
        bail!("Usage: diary-cli poster <name> <out.jpg>");
    };

    let mut gallery = diary.open_gallery();
    let Some(index) = gallery.entries().iter().position(|e| &e.record.name == name) else {
        bail!("No clip named {}", name);
    };
    gallery.load_posters().await;

    match gallery.poster(index) {
        Some(videodiary::PosterState::Ready(frame)) => {
            let jpeg = frame.to_jpeg(90)?;
            std::fs::write(Path::new(out), jpeg).with_context(|| format!("Writing {}", out))?;
            println!("Poster {}x{} written to {}", frame.width, frame.height, out);
            Ok(())
        }
        _ => bail!("Could not decode a poster frame from {}", name),
    }
}
