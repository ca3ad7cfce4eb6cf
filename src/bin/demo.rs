use anyhow::{Context, Result};
use fancy_logger::{Configuration, Engine, EngineOptions, RemovalDelay, TaskProgress};
use simplelog::{Config, LevelFilter, WriteLogger};
use std::fs::File;
use std::thread;
use std::time::Duration;

const DIAGNOSTICS: &str = "fancy_logger-diagnostics.log";

fn main() -> Result<()> {
    let diagnostics = File::create(DIAGNOSTICS).context("creating diagnostics log")?;
    WriteLogger::init(LevelFilter::Debug, Config::default(), diagnostics)?;

    let config = Configuration {
        permanent_progressbar_slots: 2,
        message_number: 8,
        exception_number: 1,
        task_removal_delay: RemovalDelay::After(Duration::from_secs(1)),
        ..Configuration::default()
    };
    let engine = Engine::start(EngineOptions {
        config,
        ..EngineOptions::default()
    })?;

    let jobs = [
        ("download", "Downloading", 120, 15, true),
        ("extract", "Extracting", 60, 40, false),
        ("index", "Indexing", 200, 10, false),
        ("verify", "Verifying", 30, 90, false),
    ];
    let workers: Vec<_> = jobs
        .into_iter()
        .map(|(id, prefix, total, pause, keep_alive)| {
            let handle = engine.handle();
            thread::spawn(move || {
                handle.set_task(
                    id,
                    TaskProgress::new(total)
                        .prefix(prefix)
                        .display_time(true)
                        .keep_alive(keep_alive),
                );
                for step in 1..=total {
                    thread::sleep(Duration::from_millis(pause));
                    handle.update(id, step);
                    if step % 25 == 0 {
                        handle.info(format!("{prefix}: {step}/{total}"));
                    }
                }
                handle.warning(format!("{prefix} finished"));
            })
        })
        .collect();

    let files: Vec<u32> = (0..40).collect();
    for _ in engine.track("scan", TaskProgress::default().prefix("Scanning"), files) {
        thread::sleep(Duration::from_millis(50));
    }
    engine.report_failure("scanner", "could not open ./cache\n  permission denied");

    for worker in workers {
        if worker.join().is_err() {
            engine.error("a worker panicked");
        }
    }
    engine.info("all done");
    engine.flush()?;
    Ok(())
}
