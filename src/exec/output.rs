use std::io::Write;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tokio::task::JoinHandle;

/// Which child stream a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamLabel {
    Out,
    Err,
}

impl StreamLabel {
    pub fn prefix(&self) -> &'static str {
        match self {
            StreamLabel::Out => "OUT",
            StreamLabel::Err => "ERR",
        }
    }
}

/// Lines collected from both streams once draining has finished.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CapturedOutput {
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
}

impl CapturedOutput {
    /// True if any line on either stream contains `needle`, ignoring case.
    pub fn mentions(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.stdout
            .iter()
            .chain(self.stderr.iter())
            .any(|l| l.to_lowercase().contains(&needle))
    }
}

/// Handles to the two drain tasks of one child.
///
/// Nobody is required to join these. A caller that moves on without joining
/// accepts that the tail of the output may still be printing.
#[derive(Debug)]
pub struct DrainHandles {
    stdout: Option<JoinHandle<Vec<String>>>,
    stderr: Option<JoinHandle<Vec<String>>>,
}

impl DrainHandles {
    pub fn is_finished(&self) -> bool {
        self.stdout.as_ref().map_or(true, |h| h.is_finished())
            && self.stderr.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Wait for both streams to close and return what they carried.
    pub async fn join(self) -> CapturedOutput {
        CapturedOutput {
            stdout: join_drain(self.stdout).await,
            stderr: join_drain(self.stderr).await,
        }
    }
}

async fn join_drain(handle: Option<JoinHandle<Vec<String>>>) -> Vec<String> {
    match handle {
        Some(handle) => handle.await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Output drain task failed");
            Vec::new()
        }),
        None => Vec::new(),
    }
}

/// Drains a child's stdout and stderr concurrently, one task per stream, so
/// that a full pipe on one side can never stall the other or the child.
///
/// With `echo` set each line is printed as `OUT: <line>` / `ERR: <line>` and
/// flushed as soon as it is read. Lines are always captured.
#[derive(Debug, Clone, Copy)]
pub struct OutputMultiplexer {
    echo: bool,
}

impl OutputMultiplexer {
    pub fn new(echo: bool) -> Self {
        Self { echo }
    }

    /// Take the child's piped streams and start draining them.
    /// Streams that were not piped are skipped.
    pub fn attach(&self, child: &mut Child) -> DrainHandles {
        DrainHandles {
            stdout: child
                .stdout
                .take()
                .map(|out| self.spawn_drain(out, StreamLabel::Out)),
            stderr: child
                .stderr
                .take()
                .map(|err| self.spawn_drain(err, StreamLabel::Err)),
        }
    }

    pub fn spawn_drain<R>(&self, reader: R, label: StreamLabel) -> JoinHandle<Vec<String>>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let echo = self.echo;
        tokio::spawn(async move { drain_lines(reader, label, echo).await })
    }
}

/// Read `reader` to EOF line by line. Invalid UTF-8 is replaced rather than
/// treated as an error, so the pipe keeps being emptied whatever the child
/// writes.
pub async fn drain_lines<R>(reader: R, label: StreamLabel, echo: bool) -> Vec<String>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut lines = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf)
                    .trim_end_matches(['\n', '\r'])
                    .to_string();
                if echo {
                    emit(label, &line);
                }
                lines.push(line);
            }
            Err(e) => {
                tracing::warn!(stream = label.prefix(), error = %e, "Stopped reading child output");
                break;
            }
        }
    }

    lines
}

fn emit(label: StreamLabel, line: &str) {
    let mut stdout = std::io::stdout().lock();
    // A closed stdout must not stop the drain
    let _ = writeln!(stdout, "{}: {}", label.prefix(), line);
    let _ = stdout.flush();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn drain_splits_lines_and_strips_endings() {
        let data: &[u8] = b"one\r\ntwo\nthree";
        let lines = drain_lines(data, StreamLabel::Out, false).await;
        assert_eq!(lines, vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn drain_replaces_invalid_utf8() {
        let data: &[u8] = b"ok\n\xff\xfe\nafter\n";
        let lines = drain_lines(data, StreamLabel::Err, false).await;
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2], "after");
    }

    #[tokio::test]
    async fn drain_empty_stream() {
        let data: &[u8] = b"";
        assert!(drain_lines(data, StreamLabel::Out, true).await.is_empty());
    }

    #[test]
    fn labels_have_wire_prefixes() {
        assert_eq!(StreamLabel::Out.prefix(), "OUT");
        assert_eq!(StreamLabel::Err.prefix(), "ERR");
    }

    #[test]
    fn captured_output_mentions_is_case_insensitive() {
        let captured = CapturedOutput {
            stdout: vec![],
            stderr: vec!["Error: No such service: foo".to_string()],
        };
        assert!(captured.mentions("no such service"));
        assert!(!captured.mentions("not found"));
    }
}
