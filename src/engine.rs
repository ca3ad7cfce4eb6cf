use anyhow::{Context, Result};
use chrono::Local;
use std::io::{self, Write};
use std::ops::Deref;
use std::path::PathBuf;
use std::sync::mpsc as std_mpsc;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Interval, MissedTickBehavior};

use crate::ansi::{sanitize, sanitize_lines};
use crate::config::{ConfigChange, ConfigError, Configuration};
use crate::event::{Event, Failure, LogEntry, LogLevel, TaskProgress};
use crate::layout::{layout, FrameSize, Snapshot};
use crate::messages::MessageBuffer;
use crate::registry::TaskRegistry;
use crate::render::Renderer;
use crate::sink::FileSink;

pub const DEFAULT_LOG_FILE: &str = "logging.log";
const FALLBACK_SIZE: FrameSize = FrameSize {
    width: 80,
    height: 24,
};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),
    #[error("the display engine has shut down")]
    Closed,
}

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub config: Configuration,
    /// Where every message is mirrored. `None` disables the file sink.
    pub log_file: Option<PathBuf>,
    /// Fixed frame size. When unset the terminal is asked on every frame.
    pub terminal_size: Option<FrameSize>,
    /// Unix socket other processes can feed events through.
    #[cfg(unix)]
    pub socket: Option<PathBuf>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            config: Configuration::default(),
            log_file: Some(PathBuf::from(DEFAULT_LOG_FILE)),
            terminal_size: None,
            #[cfg(unix)]
            socket: None,
        }
    }
}

/// Completion signal for a flush or terminate request. Threads block on a std channel,
/// tasks on the engine's own runtime await a oneshot.
enum Ack {
    Thread(std_mpsc::Sender<()>),
    Task(oneshot::Sender<()>),
}

impl Ack {
    fn done(self) {
        match self {
            Ack::Thread(done) => done.send(()).ok(),
            Ack::Task(done) => done.send(()).ok(),
        };
    }
}

enum Command {
    Event(Event),
    Flush(Ack),
    Terminate(Ack),
}

/// Producer side of the event queue. Cheap to clone and safe to use from any thread; nothing
/// here blocks except `flush` and `terminate`, which wait for the engine on purpose.
#[derive(Clone)]
pub struct Handle {
    queue: mpsc::UnboundedSender<Command>,
}

impl Handle {
    /// Queues an event. Configuration changes are validated here so the caller sees the error.
    pub fn submit(&self, event: Event) -> Result<(), Error> {
        if let Event::Configure(change) = &event {
            change.validate()?;
        }
        self.queue
            .send(Command::Event(event))
            .map_err(|_| Error::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.queue.is_closed()
    }

    pub fn log(&self, level: LogLevel, text: impl Into<String>) {
        self.forget(Event::Log {
            level,
            text: text.into(),
        });
    }

    pub fn debug(&self, text: impl Into<String>) {
        self.log(LogLevel::Debug, text);
    }

    pub fn info(&self, text: impl Into<String>) {
        self.log(LogLevel::Info, text);
    }

    pub fn warning(&self, text: impl Into<String>) {
        self.log(LogLevel::Warning, text);
    }

    pub fn error(&self, text: impl Into<String>) {
        self.log(LogLevel::Error, text);
    }

    pub fn critical(&self, text: impl Into<String>) {
        self.log(LogLevel::Critical, text);
    }

    pub fn update(&self, id: impl Into<String>, current: u64) {
        self.forget(Event::Update {
            id: id.into(),
            current,
            total: None,
        });
    }

    pub fn update_with_total(&self, id: impl Into<String>, current: u64, total: u64) {
        self.forget(Event::Update {
            id: id.into(),
            current,
            total: Some(total),
        });
    }

    pub fn set_task(&self, id: impl Into<String>, progress: TaskProgress) {
        self.forget(Event::SetTask {
            id: id.into(),
            progress,
        });
    }

    /// Pins a failure report (typically a backtrace) below the messages.
    pub fn report_failure(&self, origin: impl Into<String>, trace: impl Into<String>) {
        self.forget(Event::Failure {
            origin: origin.into(),
            trace: trace.into(),
        });
    }

    pub fn set_configuration(&self, change: ConfigChange) -> Result<(), Error> {
        self.submit(Event::Configure(change))
    }

    /// Blocks until a frame reflecting everything this handle queued so far has been drawn.
    pub fn flush(&self) -> Result<(), Error> {
        let (done, wait) = std_mpsc::channel();
        self.queue
            .send(Command::Flush(Ack::Thread(done)))
            .map_err(|_| Error::Closed)?;
        wait.recv().map_err(|_| Error::Closed)
    }

    pub async fn flush_async(&self) -> Result<(), Error> {
        let (done, wait) = oneshot::channel();
        self.queue
            .send(Command::Flush(Ack::Task(done)))
            .map_err(|_| Error::Closed)?;
        wait.await.map_err(|_| Error::Closed)
    }

    /// Draws a last frame, gives the cursor back and stops the engine. Calling it again, or
    /// from several threads at once, is harmless.
    pub fn terminate(&self) {
        let (done, wait) = std_mpsc::channel();
        if self.queue.send(Command::Terminate(Ack::Thread(done))).is_ok() {
            wait.recv().ok();
        }
    }

    fn forget(&self, event: Event) {
        if self.submit(event).is_err() {
            log::trace!("dropping event for a closed engine");
        }
    }
}

/// Owns the render thread. Dropping it terminates the engine.
pub struct Engine {
    handle: Handle,
    thread: Option<thread::JoinHandle<()>>,
}

impl Engine {
    pub fn start(options: EngineOptions) -> Result<Engine> {
        Self::start_with_output(options, io::stdout())
    }

    pub fn start_with_output<W: Write + Send + 'static>(
        options: EngineOptions,
        output: W,
    ) -> Result<Engine> {
        options
            .config
            .validate()
            .context("invalid initial configuration")?;
        let sink = options.log_file.as_ref().map(FileSink::open).transpose()?;
        #[cfg(unix)]
        let listener = options
            .socket
            .as_deref()
            .map(crate::ipc::bind)
            .transpose()?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("building the render runtime")?;

        let (queue, commands) = mpsc::unbounded_channel();
        let handle = Handle { queue };
        let core = Core::new(options.config, sink, Renderer::new(output), options.terminal_size);
        #[cfg(unix)]
        let server = handle.clone();

        let thread = thread::Builder::new()
            .name("fancy-logger".to_owned())
            .spawn(move || {
                runtime.block_on(async move {
                    #[cfg(unix)]
                    if let Some(listener) = listener {
                        tokio::spawn(crate::ipc::serve(listener, server));
                    }
                    core.run(commands).await;
                });
                #[cfg(unix)]
                crate::ipc::unlink(options.socket);
            })
            .context("spawning the render thread")?;

        Ok(Engine {
            handle,
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> Handle {
        self.handle.clone()
    }

    /// Terminates and waits for the render thread to finish.
    pub fn terminate(&mut self) {
        self.handle.terminate();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("render thread panicked");
            }
        }
    }
}

impl Deref for Engine {
    type Target = Handle;

    fn deref(&self) -> &Handle {
        &self.handle
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// The single consumer: owns all mutable state, writes the file sink and the terminal.
struct Core<W: Write> {
    config: Configuration,
    pending: Option<Configuration>,
    registry: TaskRegistry,
    messages: MessageBuffer,
    failures: MessageBuffer<Failure>,
    sink: Option<FileSink>,
    renderer: Renderer<W>,
    size: Option<FrameSize>,
}

impl<W: Write> Core<W> {
    fn new(
        config: Configuration,
        sink: Option<FileSink>,
        renderer: Renderer<W>,
        size: Option<FrameSize>,
    ) -> Self {
        Self {
            registry: TaskRegistry::new(config.permanent_progressbar_slots),
            messages: MessageBuffer::new(config.message_number),
            failures: MessageBuffer::new(config.exception_number),
            config,
            pending: None,
            sink,
            renderer,
            size,
        }
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        let mut timer = ticker(self.config.refresh_interval);
        loop {
            let mut period = None;
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Event(event)) => self.apply(event, Instant::now()),
                    Some(Command::Flush(ack)) => {
                        period = self.render_cycle(Instant::now());
                        ack.done();
                    }
                    Some(Command::Terminate(ack)) => {
                        self.shutdown();
                        ack.done();
                        return;
                    }
                    None => {
                        self.shutdown();
                        return;
                    }
                },
                _ = timer.tick() => period = self.render_cycle(Instant::now()),
            }
            if let Some(period) = period {
                timer = ticker(period);
            }
        }
    }

    fn apply(&mut self, event: Event, now: Instant) {
        match event {
            Event::Log { level, text } => {
                let entry = LogEntry {
                    level,
                    text: sanitize(&text),
                    timestamp: Local::now(),
                };
                if let Some(sink) = self.sink.as_mut() {
                    sink.write_entry(&entry);
                }
                // Queued changes apply to entries consumed after them.
                let display_level = self.pending.as_ref().unwrap_or(&self.config).display_level;
                if level >= display_level {
                    self.messages.append(entry);
                }
            }
            Event::Update { id, current, total } => {
                self.registry.upsert(&id, current, total, now);
            }
            Event::SetTask { id, progress } => {
                let progress = TaskProgress {
                    prefix: sanitize(&progress.prefix),
                    suffix: sanitize(&progress.suffix),
                    ..progress
                };
                self.registry.set_task(&id, progress, now);
            }
            Event::Failure { origin, trace } => {
                let failure = Failure {
                    origin: sanitize(&origin),
                    lines: sanitize_lines(&trace),
                    timestamp: Local::now(),
                };
                if let Some(sink) = self.sink.as_mut() {
                    sink.write_failure(&failure);
                }
                self.failures.append(failure);
            }
            Event::Configure(change) => {
                if let Err(err) = change.validate() {
                    log::warn!("ignoring invalid configuration change: {err}");
                    return;
                }
                let base = self.pending.as_ref().unwrap_or(&self.config);
                self.pending = Some(base.with_change(&change));
            }
        }
    }

    /// One frame: swap in pending configuration, expire tasks, snapshot, lay out, draw.
    /// Returns the new refresh interval when it changed.
    fn render_cycle(&mut self, now: Instant) -> Option<Duration> {
        let period = self.swap_config();
        self.registry.tick(now, self.config.task_removal_delay);
        if self.renderer.is_disabled() {
            return period;
        }
        let snapshot = Snapshot {
            rows: self.registry.snapshot(now),
            messages: self.messages.snapshot(),
            failures: self.failures.snapshot(),
        };
        let size = self.size.unwrap_or_else(terminal_size);
        let lines = layout(&snapshot, self.config.decimal_places, size);
        self.renderer.draw(&lines);
        period
    }

    fn swap_config(&mut self) -> Option<Duration> {
        let config = self.pending.take()?;
        self.registry
            .set_slot_count(config.permanent_progressbar_slots);
        self.messages.set_capacity(config.message_number);
        self.failures.set_capacity(config.exception_number);
        let period = (config.refresh_interval != self.config.refresh_interval)
            .then_some(config.refresh_interval);
        log::debug!("configuration swapped: {config:?}");
        self.config = config;
        period
    }

    fn shutdown(&mut self) {
        self.render_cycle(Instant::now());
        self.renderer.release();
    }
}

fn ticker(period: Duration) -> Interval {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

fn terminal_size() -> FrameSize {
    match crossterm::terminal::size() {
        Ok((width, height)) if width > 0 && height > 0 => FrameSize { width, height },
        _ => FALLBACK_SIZE,
    }
}
