//! Lets other processes share the engine's terminal. Producers connect to a Unix socket and
//! write one JSON [`WireMessage`] per line; events from one connection keep their order.
//! A `flush` line is answered with `ok` once the frame is on screen, or `closed` if the
//! engine is going away.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::os::unix::net::{UnixListener as StdUnixListener, UnixStream as StdUnixStream};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader as AsyncBufReader};
use tokio::net::{UnixListener, UnixStream};

use crate::config::ConfigChange;
use crate::engine::{Error, Handle};
use crate::event::{Event, LogLevel, TaskProgress};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireMessage {
    Event { event: Event },
    Flush,
}

/// Binds `path`, replacing a socket file nobody is listening on any more.
pub(crate) fn bind(path: &Path) -> Result<StdUnixListener> {
    let listener = match StdUnixListener::bind(path) {
        Err(err) if err.kind() == ErrorKind::AddrInUse && StdUnixStream::connect(path).is_err() => {
            log::debug!("removing stale producer socket {}", path.display());
            std::fs::remove_file(path)
                .with_context(|| format!("removing stale socket {}", path.display()))?;
            StdUnixListener::bind(path)
        }
        bound => bound,
    }
    .with_context(|| format!("binding producer socket {}", path.display()))?;
    listener
        .set_nonblocking(true)
        .context("making the producer socket non-blocking")?;
    Ok(listener)
}

pub(crate) fn unlink(socket: Option<PathBuf>) {
    let Some(socket) = socket else {
        return;
    };
    if let Err(err) = std::fs::remove_file(&socket) {
        log::debug!("could not remove {}: {err}", socket.display());
    }
}

pub(crate) async fn serve(listener: StdUnixListener, handle: Handle) {
    let listener = match UnixListener::from_std(listener) {
        Ok(listener) => listener,
        Err(err) => {
            log::error!("producer socket unusable: {err}");
            return;
        }
    };
    loop {
        match listener.accept().await {
            Ok((stream, _)) => {
                log::debug!("producer connected");
                tokio::spawn(forward(stream, handle.clone()));
            }
            Err(err) => {
                log::warn!("accepting a producer failed: {err}");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
            }
        }
    }
}

async fn forward(stream: UnixStream, handle: Handle) {
    let (read, mut write) = stream.into_split();
    let mut lines = AsyncBufReader::new(read).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                log::warn!("reading from a producer failed: {err}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        let message = match serde_json::from_str::<WireMessage>(&line) {
            Ok(message) => message,
            Err(err) => {
                log::warn!("ignoring undecodable producer line: {err}");
                continue;
            }
        };
        let reply: &[u8] = match message {
            WireMessage::Event { event } => match handle.submit(event) {
                Ok(()) => continue,
                Err(Error::Closed) => break,
                Err(err) => {
                    log::warn!("rejected event from a producer: {err}");
                    continue;
                }
            },
            WireMessage::Flush => match handle.flush_async().await {
                Ok(()) => b"ok\n",
                Err(_) => b"closed\n",
            },
        };
        if let Err(err) = write.write_all(reply).await {
            log::warn!("answering a producer failed: {err}");
            break;
        }
    }
    log::debug!("producer disconnected");
}

/// Client end for a producer running in another process.
pub struct RemoteProducer {
    writer: StdUnixStream,
    reader: BufReader<StdUnixStream>,
}

impl RemoteProducer {
    pub fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let writer = StdUnixStream::connect(path)
            .with_context(|| format!("connecting to display engine at {}", path.display()))?;
        let reader = BufReader::new(writer.try_clone().context("cloning producer socket")?);
        Ok(Self { writer, reader })
    }

    pub fn submit(&mut self, event: Event) -> Result<()> {
        if let Event::Configure(change) = &event {
            change.validate()?;
        }
        self.send(&WireMessage::Event { event })
    }

    pub fn log(&mut self, level: LogLevel, text: impl Into<String>) -> Result<()> {
        self.submit(Event::Log {
            level,
            text: text.into(),
        })
    }

    pub fn update(&mut self, id: impl Into<String>, current: u64, total: Option<u64>) -> Result<()> {
        self.submit(Event::Update {
            id: id.into(),
            current,
            total,
        })
    }

    pub fn set_task(&mut self, id: impl Into<String>, progress: TaskProgress) -> Result<()> {
        self.submit(Event::SetTask {
            id: id.into(),
            progress,
        })
    }

    pub fn report_failure(&mut self, origin: impl Into<String>, trace: impl Into<String>) -> Result<()> {
        self.submit(Event::Failure {
            origin: origin.into(),
            trace: trace.into(),
        })
    }

    pub fn set_configuration(&mut self, change: ConfigChange) -> Result<()> {
        self.submit(Event::Configure(change))
    }

    /// Waits until the engine has drawn everything this producer sent.
    pub fn flush(&mut self) -> Result<()> {
        self.send(&WireMessage::Flush)?;
        let mut reply = String::new();
        self.reader
            .read_line(&mut reply)
            .context("waiting for flush")?;
        match reply.trim() {
            "ok" => Ok(()),
            "" => bail!("display engine hung up"),
            other => bail!("display engine refused flush: {other}"),
        }
    }

    fn send(&mut self, message: &WireMessage) -> Result<()> {
        let mut line = serde_json::to_string(message)?;
        line.push('\n');
        self.writer
            .write_all(line.as_bytes())
            .context("sending to display engine")
    }
}

#[cfg(test)]
mod test {
    use super::{bind, WireMessage};
    use crate::config::ConfigChange;
    use crate::event::{Event, LogLevel};

    #[test]
    fn decodes_log_line() {
        let line = r#"{"type":"event","event":{"kind":"log","level":"warning","text":"low disk"}}"#;
        assert_eq!(
            serde_json::from_str::<WireMessage>(line).unwrap(),
            WireMessage::Event {
                event: Event::Log {
                    level: LogLevel::Warning,
                    text: "low disk".to_owned()
                }
            }
        );
    }

    #[test]
    fn decodes_flush() {
        assert_eq!(
            serde_json::from_str::<WireMessage>(r#"{"type":"flush"}"#).unwrap(),
            WireMessage::Flush
        );
    }

    #[test]
    fn configuration_survives_the_wire() {
        let message = WireMessage::Event {
            event: Event::Configure(ConfigChange::new().message_number(4)),
        };
        let line = serde_json::to_string(&message).unwrap();
        assert_eq!(serde_json::from_str::<WireMessage>(&line).unwrap(), message);
    }

    #[test]
    fn rebinds_over_a_stale_socket() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("producers.sock");
        drop(bind(&path).unwrap());
        assert!(path.exists());
        let listener = bind(&path).unwrap();
        assert!(std::os::unix::net::UnixStream::connect(&path).is_ok());
        drop(listener);
    }

    #[test]
    fn refuses_a_socket_still_in_use() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("producers.sock");
        let _live = bind(&path).unwrap();
        assert!(bind(&path).is_err());
    }
}
