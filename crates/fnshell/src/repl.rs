//! The interactive read-invoke-print loop.
//!
//! Lines come from a [`LineSource`]: a line editor when a person is typing
//! ([`Readline`]), or any async reader when input is piped ([`ReaderLines`]).

use std::fmt;
use std::sync::mpsc as std_mpsc;

use async_trait::async_trait;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::deployer::Deployer;
use crate::error::Error;
use crate::function::EphemeralFunction;
use crate::wire::{Request, decode_response};

/// Render `name>` in blue followed by a space.
pub fn colored_prompt(name: &str) -> String {
    format!("\x1b[34m{name}>\x1b[0m ")
}

/// Where the loop gets its commands from.
#[async_trait]
pub trait LineSource: Send {
    /// Next line without its terminator, or `None` once input is over.
    ///
    /// End of input, an interrupt and a read error all count as "over".
    async fn next_line(&mut self) -> Result<Option<String>, Error>;
}

/// A prompt shown before each line is read from a [`ReaderLines`].
pub struct Prompt {
    text: String,
    writer: Box<dyn AsyncWrite + Send + Unpin>,
}

impl fmt::Debug for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Prompt")
            .field("text", &self.text)
            .finish_non_exhaustive()
    }
}

impl Prompt {
    /// Show `text` verbatim on `writer`.
    pub fn new(text: impl Into<String>, writer: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        Self {
            text: text.into(),
            writer: Box::new(writer),
        }
    }

    /// Show `name>` in blue followed by a space.
    pub fn colored(name: &str, writer: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        Self::new(colored_prompt(name), writer)
    }

    async fn show(&mut self) -> std::io::Result<()> {
        self.writer.write_all(self.text.as_bytes()).await?;
        self.writer.flush().await
    }
}

/// Lines read from an async reader, e.g. piped stdin.
pub struct ReaderLines<R> {
    reader: R,
    prompt: Option<Prompt>,
    buf: String,
}

impl<R> fmt::Debug for ReaderLines<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReaderLines")
            .field("prompt", &self.prompt)
            .finish_non_exhaustive()
    }
}

impl<R: AsyncBufRead + Unpin + Send> ReaderLines<R> {
    /// Read lines from `reader`.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            prompt: None,
            buf: String::new(),
        }
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> LineSource for ReaderLines<R> {
    async fn next_line(&mut self) -> Result<Option<String>, Error> {
        if let Some(prompt) = self.prompt.as_mut() {
            prompt.show().await.map_err(Error::Output)?;
        }

        self.buf.clear();
        match self.reader.read_line(&mut self.buf).await {
            Ok(0) => {
                tracing::debug!("end of input");
                Ok(None)
            }
            Ok(_) => Ok(Some(strip_line_ending(&self.buf).to_string())),
            Err(e) => {
                tracing::debug!(error = %e, "input closed");
                Ok(None)
            }
        }
    }
}

#[derive(Debug)]
enum ReadlineEvent {
    Line(String),
    Interrupted,
    Eof,
    Failed(String),
}

impl From<Result<String, ReadlineError>> for ReadlineEvent {
    fn from(result: Result<String, ReadlineError>) -> Self {
        match result {
            Ok(line) => ReadlineEvent::Line(line),
            Err(ReadlineError::Interrupted) => ReadlineEvent::Interrupted,
            Err(ReadlineError::Eof) => ReadlineEvent::Eof,
            Err(e) => ReadlineEvent::Failed(e.to_string()),
        }
    }
}

/// Lines typed into a terminal line editor with history.
///
/// The editor blocks, so it lives on its own thread and only reads when the
/// loop asks for the next line. Ctrl-C and Ctrl-D both end the input.
#[derive(Debug)]
pub struct Readline {
    requests: std_mpsc::Sender<()>,
    events: mpsc::UnboundedReceiver<ReadlineEvent>,
}

impl Readline {
    /// Start a line editor showing `prompt`.
    pub fn new(prompt: impl Into<String>) -> Result<Self, Error> {
        let prompt = prompt.into();
        let (ready_tx, ready_rx) = std_mpsc::sync_channel(1);
        let (requests, request_rx) = std_mpsc::channel::<()>();
        let (event_tx, events) = mpsc::unbounded_channel();

        std::thread::Builder::new()
            .name("fnshell-readline".to_string())
            .spawn(move || {
                let mut editor = match DefaultEditor::new() {
                    Ok(editor) => {
                        let _ = ready_tx.send(Ok(()));
                        editor
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };

                while request_rx.recv().is_ok() {
                    let result = editor.readline(&prompt);
                    if let Ok(line) = &result
                        && !line.is_empty()
                    {
                        let _ = editor.add_history_entry(line.as_str());
                    }
                    let event = ReadlineEvent::from(result);
                    let last = !matches!(event, ReadlineEvent::Line(_));
                    if event_tx.send(event).is_err() || last {
                        break;
                    }
                }
            })
            .map_err(Error::Input)?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self { requests, events }),
            Ok(Err(message)) => Err(Error::Input(std::io::Error::other(message))),
            Err(_) => Err(Error::Input(std::io::Error::other(
                "line editor thread exited",
            ))),
        }
    }
}

#[async_trait]
impl LineSource for Readline {
    async fn next_line(&mut self) -> Result<Option<String>, Error> {
        if self.requests.send(()).is_err() {
            return Ok(None);
        }

        match self.events.recv().await {
            Some(ReadlineEvent::Line(line)) => Ok(Some(line)),
            Some(ReadlineEvent::Interrupted) => {
                tracing::debug!("interrupted");
                Ok(None)
            }
            Some(ReadlineEvent::Eof) | None => {
                tracing::debug!("end of input");
                Ok(None)
            }
            Some(ReadlineEvent::Failed(message)) => {
                tracing::warn!(error = %message, "line editor failed");
                Ok(None)
            }
        }
    }
}

/// Reads commands line by line and prints what the function sends back.
pub struct ReplLoop<L, W> {
    lines: L,
    output: W,
}

impl<L: fmt::Debug, W> fmt::Debug for ReplLoop<L, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplLoop")
            .field("lines", &self.lines)
            .finish_non_exhaustive()
    }
}

impl<R, W> ReplLoop<ReaderLines<R>, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin,
{
    /// Create a loop reading from `input`, without a prompt.
    pub fn new(input: R, output: W) -> Self {
        Self::from_lines(ReaderLines::new(input), output)
    }

    /// Show `prompt` before every read.
    pub fn with_prompt(mut self, prompt: Prompt) -> Self {
        self.lines.prompt = Some(prompt);
        self
    }
}

impl<L, W> ReplLoop<L, W>
where
    L: LineSource,
    W: AsyncWrite + Unpin,
{
    /// Create a loop over any line source.
    pub fn from_lines(lines: L, output: W) -> Self {
        Self { lines, output }
    }

    /// Give back the output stream.
    pub fn into_output(self) -> W {
        self.output
    }

    /// Run until the input ends, or until an invocation or decode fails.
    ///
    /// End of input, interrupts and read errors all end the loop normally.
    /// Any other failure is returned at once; the function is left deployed
    /// for the caller to delete.
    pub async fn run<D: Deployer>(&mut self, function: &EphemeralFunction<D>) -> Result<(), Error> {
        while let Some(line) = self.lines.next_line().await? {
            let reply = function.invoke(&Request::new(line)).await?;
            let output = decode_response(&reply)?;

            self.output
                .write_all(output.as_bytes())
                .await
                .map_err(Error::Output)?;
            self.output.flush().await.map_err(Error::Output)?;
        }
        Ok(())
    }
}

fn strip_line_ending(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_line_ending() {
        assert_eq!(strip_line_ending("ls -la\n"), "ls -la");
        assert_eq!(strip_line_ending("ls\r\n"), "ls");
        assert_eq!(strip_line_ending("no newline"), "no newline");
        assert_eq!(strip_line_ending("\n"), "");
        assert_eq!(strip_line_ending("  keep spaces  \n"), "  keep spaces  ");
    }

    #[test]
    fn test_colored_prompt() {
        assert_eq!(colored_prompt("fnshell"), "\x1b[34mfnshell>\x1b[0m ");
    }

    #[test]
    fn test_readline_interrupt_and_eof_end_input() {
        assert!(matches!(
            ReadlineEvent::from(Err(ReadlineError::Interrupted)),
            ReadlineEvent::Interrupted
        ));
        assert!(matches!(
            ReadlineEvent::from(Err(ReadlineError::Eof)),
            ReadlineEvent::Eof
        ));
        assert!(matches!(
            ReadlineEvent::from(Ok("ls -la".to_string())),
            ReadlineEvent::Line(line) if line == "ls -la"
        ));
    }

    #[tokio::test]
    async fn test_reader_lines() {
        let mut lines = ReaderLines::new(&b"echo hi\r\n\nlast"[..]);
        assert_eq!(lines.next_line().await.expect("read").as_deref(), Some("echo hi"));
        assert_eq!(lines.next_line().await.expect("read").as_deref(), Some(""));
        assert_eq!(lines.next_line().await.expect("read").as_deref(), Some("last"));
        assert_eq!(lines.next_line().await.expect("read"), None);
    }

    #[tokio::test]
    async fn test_readline_stops_at_interrupt() {
        let (requests, request_rx) = std_mpsc::channel();
        let (event_tx, events) = mpsc::unbounded_channel();
        let mut lines = Readline { requests, events };

        event_tx.send(ReadlineEvent::Line("pwd".into())).expect("send");
        event_tx.send(ReadlineEvent::Interrupted).expect("send");

        assert_eq!(lines.next_line().await.expect("read").as_deref(), Some("pwd"));
        assert_eq!(lines.next_line().await.expect("read"), None);
        // One read requested per line asked for
        assert_eq!(request_rx.try_iter().count(), 2);
    }
}
