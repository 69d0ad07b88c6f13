/*
User-facing console output.

All lines printed by the menu loop and by device-side listeners go
through a single writer task, so output from concurrent tasks never
interleaves within a line. Lines are colored by the role that produced
them.
*/

use nu_ansi_term::Color;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Prompts and blank separator lines
    Plain,
    /// Output produced on behalf of the simulated device
    Device,
    /// Registry, job and storage operations
    Operator,
    /// Direct method invocations from the service side
    Invoke,
    Error,
}

impl Level {
    fn color(&self) -> Option<Color> {
        match self {
            Level::Plain => None,
            Level::Device => Some(Color::Green),
            Level::Operator => Some(Color::Yellow),
            Level::Invoke => Some(Color::Cyan),
            Level::Error => Some(Color::Red),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub message: String,
    pub level: Level,
}

#[derive(Debug)]
pub enum Message {
    Line(Line),
    Flush(oneshot::Sender<()>),
}

/// Handle used to print to the console, cheap to clone
#[derive(Debug, Clone)]
pub struct Console {
    tx: mpsc::UnboundedSender<Message>,
}

impl Console {
    /// Create a console handle and the receiving end of its channel.
    ///
    /// The receiver is meant to be handed to [`spawn_writer`], tests may
    /// also read from it directly.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Create a console writing colored lines to stdout
    pub fn stdout() -> (Self, JoinHandle<()>) {
        let (console, rx) = Self::channel();
        let writer = spawn_writer(rx, tokio::io::stdout(), true);
        (console, writer)
    }

    pub fn write(&self, message: impl Into<String>, level: Level) {
        let line = Line {
            message: message.into(),
            level,
        };
        // the writer only goes away at shutdown
        let _ = self.tx.send(Message::Line(line));
    }

    pub fn blank(&self) {
        self.write("", Level::Plain);
    }

    pub fn error(&self, err: impl std::fmt::Display) {
        self.write(format!("* ERROR * {err}"), Level::Error);
    }

    /// Wait until every line written before this call has been printed
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(Message::Flush(tx)).is_ok() {
            let _ = rx.await;
        }
    }
}

/// Collect the lines already queued on a console channel without waiting
#[cfg(any(test, feature = "testing"))]
pub fn pending_lines(rx: &mut mpsc::UnboundedReceiver<Message>) -> Vec<Line> {
    let mut lines = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        match msg {
            Message::Line(line) => lines.push(line),
            Message::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    lines
}

/// Drain console messages into `out` until every handle is dropped
pub fn spawn_writer<W>(
    mut rx: mpsc::UnboundedReceiver<Message>,
    mut out: W,
    ansi: bool,
) -> JoinHandle<()>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match msg {
                Message::Line(line) => {
                    let text = render(&line, ansi);
                    if let Err(e) = out.write_all(text.as_bytes()).await {
                        warn!("failed to write to console: {e}");
                    }
                }
                Message::Flush(done) => {
                    if let Err(e) = out.flush().await {
                        warn!("failed to flush console: {e}");
                    }
                    let _ = done.send(());
                }
            }
        }
        let _ = out.flush().await;
    })
}

fn render(line: &Line, ansi: bool) -> String {
    match line.level.color() {
        Some(color) if ansi && !line.message.is_empty() => {
            format!("{}\n", color.paint(line.message.as_str()))
        }
        _ => format!("{}\n", line.message),
    }
}
