//! Utilities
//!
//! Various simple utilities for use in the debuggers

use std::env;
use std::io;
use std::mem;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::str;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::{ready, Stream};
use pin_project::pin_project;
use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::{self, Sender};
use tracing::{debug, warn};

/// Forward everything sent on the returned channel to `writer`, normally a process's stdin.
///
/// Write errors are logged and end the forwarding, the process has most likely gone away.
pub fn setup_stdin<W>(mut writer: W) -> Sender<Bytes>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (stdin_tx, mut stdin_rx) = mpsc::channel::<Bytes>(32);

    tokio::spawn(async move {
        while let Some(text) = stdin_rx.recv().await {
            debug!("Writing to stdin: {:?}", text);
            let written = match writer.write_all(&text).await {
                Ok(_) => writer.flush().await,
                Err(e) => Err(e),
            };
            if let Err(e) = written {
                warn!("Writing stdin err e: {}", e);
                break;
            }
        }
    });

    stdin_tx
}

/// Find out the full path of a file based on the PATH environment variable.
///
/// Anything containing a path separator is returned as is.
pub fn get_file_full_path(cmd: &str) -> PathBuf {
    if cmd.contains('/') {
        return PathBuf::from(cmd);
    }

    env::var_os("PATH")
        .and_then(|paths| {
            env::split_paths(&paths)
                .map(|dir| dir.join(cmd))
                .find(|cmd_full_path| cmd_full_path.is_file())
        })
        .unwrap_or_else(|| PathBuf::from(cmd))
}

/// Return true if the path specified exists.
pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref().exists()
}

/// Combinator created by `read_output` which is a stream over the text an I/O object produces.
///
/// Text is returned in whatever chunks it arrives in, nothing is assumed about lines. A UTF-8
/// character split over two reads is held back until it's complete.
#[pin_project]
#[derive(Debug)]
pub struct ReadOutput<R> {
    #[pin]
    reader: R,
    buf: Vec<u8>,
}

/// Creates a new stream from the I/O object
///
/// This method takes an asynchronous I/O object, `reader`, and returns a `Stream` of text that
/// the object contains. The returned stream will reach its end once `reader` reaches EOF.
pub fn read_output<R>(reader: R) -> ReadOutput<R>
where
    R: AsyncBufRead,
{
    ReadOutput {
        reader,
        buf: Vec::new(),
    }
}

impl<R: AsyncBufRead> Stream for ReadOutput<R> {
    type Item = io::Result<String>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            let used = match ready!(this.reader.as_mut().poll_fill_buf(cx)) {
                Ok(t) => {
                    this.buf.extend_from_slice(t);
                    t.len()
                }
                Err(e) => return Poll::Ready(Some(Err(e))),
            };

            if used == 0 {
                // EOF, flush out whatever we've got left
                if this.buf.is_empty() {
                    return Poll::Ready(None);
                }
                let buf = mem::take(this.buf);
                return Poll::Ready(Some(Ok(String::from_utf8_lossy(&buf).into_owned())));
            }

            this.reader.as_mut().consume(used);

            let valid_up_to = match str::from_utf8(&this.buf[..]) {
                Ok(_) => this.buf.len(),
                // Incomplete character at the end, wait for the rest
                Err(e) if e.error_len().is_none() => e.valid_up_to(),
                Err(_) => this.buf.len(),
            };

            if valid_up_to == 0 {
                continue;
            }

            let rest = this.buf.split_off(valid_up_to);
            let text = mem::replace(this.buf, rest);
            return Poll::Ready(Some(Ok(String::from_utf8_lossy(&text).into_owned())));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use tokio::io::{AsyncReadExt, BufReader};

    #[tokio::test]
    async fn check_read_output_returns_all_text() {
        let input: &[u8] = b"bashdb<0> abc\ndef";
        let mut reader = read_output(BufReader::with_capacity(4, input));

        let mut text = String::new();
        while let Some(chunk) = reader.next().await {
            text += &chunk.unwrap();
        }

        assert_eq!(text, "bashdb<0> abc\ndef");
    }

    #[tokio::test]
    async fn check_read_output_holds_back_split_characters() {
        // "é" is two bytes, a capacity of 3 splits it across reads
        let input: &[u8] = "abé".as_bytes();
        let mut reader = read_output(BufReader::with_capacity(3, input));

        assert_eq!(reader.next().await.unwrap().unwrap(), "ab");
        assert_eq!(reader.next().await.unwrap().unwrap(), "é");
        assert!(reader.next().await.is_none());
    }

    #[tokio::test]
    async fn check_stdin_forwarded() {
        let (writer, mut reader) = tokio::io::duplex(64);
        let stdin_tx = setup_stdin(writer);

        stdin_tx.send(Bytes::from("next\n")).await.unwrap();
        stdin_tx.send(Bytes::from("quit\n")).await.unwrap();
        drop(stdin_tx);

        let mut text = String::new();
        reader.read_to_string(&mut text).await.unwrap();
        assert_eq!(text, "next\nquit\n");
    }

    #[test]
    fn check_full_path_of_separated_command_unchanged() {
        assert_eq!(
            get_file_full_path("./bashdb"),
            PathBuf::from("./bashdb")
        );
    }

    #[test]
    fn check_full_path_found_on_path() {
        let path = get_file_full_path("sh");
        assert!(path.is_absolute());
        assert!(file_exists(&path));
    }

    #[test]
    fn check_missing_file_does_not_exist() {
        assert!(!file_exists("/this/does/not/exist/bashdb"));
        assert_eq!(
            get_file_full_path("not-a-real-command-anywhere"),
            PathBuf::from("not-a-real-command-anywhere")
        );
    }
}
