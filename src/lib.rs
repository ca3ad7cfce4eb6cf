/*
Producers (threads, or other processes through the socket) push events onto one queue.
A single consumer owns the task registry and message buffer, mirrors messages to the
log file, and on each tick draws a frame from a snapshot of that state.

Frame, top to bottom:
    permanent slots (stable rows, "---" while unclaimed)
    other tasks in insertion order
    most recent messages
    pinned failures, newest first

Drawing is inline: move up over the previous frame, rewrite each row, clear whatever is
left below when the frame got shorter. Nothing above the frame is touched.
*/
mod ansi;
mod clock;
mod config;
mod engine;
mod event;
#[cfg(unix)]
mod ipc;
mod layout;
mod messages;
mod registry;
mod render;
mod sink;
mod track;

pub use clock::{human_duration, human_seconds};
pub use config::{ConfigChange, ConfigError, Configuration, RemovalDelay};
pub use engine::{Engine, EngineOptions, Error, Handle, DEFAULT_LOG_FILE};
pub use event::{Event, Failure, LogEntry, LogLevel, TaskProgress};
#[cfg(unix)]
pub use ipc::{RemoteProducer, WireMessage};
pub use layout::{layout, FrameSize, Snapshot};
pub use messages::MessageBuffer;
pub use registry::{Row, TaskRegistry, TaskState, TaskView};
pub use render::Renderer;
pub use sink::FileSink;
pub use track::Tracked;
