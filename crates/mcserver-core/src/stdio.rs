use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_util::bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, FramedRead};
use tracing::{debug, warn};

type SharedWriter = Arc<Mutex<Box<dyn AsyncWrite + Unpin + Sync + Send>>>;

/// Destination for the managed server's console output
#[derive(Clone)]
pub struct ConsoleSink(SharedWriter);

impl ConsoleSink {
    pub fn new(t: Box<dyn AsyncWrite + Unpin + Sync + Send>) -> ConsoleSink {
        ConsoleSink(Arc::new(Mutex::new(t)))
    }

    /// A sink that drops everything; output is still traced at debug level
    pub fn discard() -> ConsoleSink {
        ConsoleSink::new(Box::new(tokio::io::sink()))
    }

    pub async fn write_line(&self, line: &str) -> std::io::Result<()> {
        let mut lock = self.0.lock().await;
        lock.write_all(line.as_bytes()).await?;
        lock.write_all(b"\n").await?;
        lock.flush().await
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        ConsoleSink::discard()
    }
}

/// Splits console output on `\n`, decoding lossily so a stray byte never
/// stops the pipe from being drained.
struct ConsoleLineCodec;

impl Decoder for ConsoleLineCodec {
    type Item = String;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(newline) = src.iter().position(|b| *b == b'\n') else {
            return Ok(None);
        };
        let line = src.split_to(newline);
        src.advance(1);
        Ok(Some(decode_line(&line)))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(line) => Ok(Some(line)),
            None if src.is_empty() => Ok(None),
            None => {
                let rest = src.split();
                Ok(Some(decode_line(&rest)))
            }
        }
    }
}

fn decode_line(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    text.strip_suffix('\r').unwrap_or(&*text).to_string()
}

/// Drain `reader` line by line into `sink` until EOF.
pub fn spawn_console_forwarder<R>(reader: R, sink: ConsoleSink, stream: &'static str) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut frames = FramedRead::with_capacity(reader, ConsoleLineCodec, 1024);
        while let Some(frame) = frames.next().await {
            match frame {
                Ok(line) => {
                    debug!(target: "mcserver::console", stream, "{line}");
                    if let Err(e) = sink.write_line(&line).await {
                        warn!(stream, error = %e, "Failed to write console line to sink");
                    }
                }
                Err(e) => {
                    warn!(stream, error = %e, "Console stream closed with error");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_forwarder_copies_lines() {
        let (mut server_side, console_side) = tokio::io::duplex(256);
        let (sink_writer, mut sink_reader) = tokio::io::duplex(256);
        let sink = ConsoleSink::new(Box::new(sink_writer));

        let task = spawn_console_forwarder(console_side, sink.clone(), "stdout");
        server_side
            .write_all(b"[Server] Done (3.2s)!\r\nplayer joined\ntrailing")
            .await
            .unwrap();
        drop(server_side);
        task.await.unwrap();
        drop(sink);

        let mut out = String::new();
        sink_reader.read_to_string(&mut out).await.unwrap();
        assert_eq!(out, "[Server] Done (3.2s)!\nplayer joined\ntrailing\n");
    }

    #[test]
    fn test_codec_is_lossy_on_invalid_utf8() {
        let mut codec = ConsoleLineCodec;
        let mut buf = BytesMut::from(&b"caf\xff\nnext"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap(), "caf\u{fffd}");
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert_eq!(codec.decode_eof(&mut buf).unwrap().unwrap(), "next");
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), None);
    }
}
