//! Line-delimited JSON framing: one UTF-8 JSON value per line, newline
//! terminated, flushed after every write.

use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::error::IpcError;

pub struct LineReader<R> {
    inner: BufReader<R>,
}

impl<R: tokio::io::AsyncRead + Unpin> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner: BufReader::new(inner),
        }
    }

    /// Reads the next non-empty line. Returns `Ok(None)` on clean EOF.
    pub async fn read_line(&mut self) -> Result<Option<String>, IpcError> {
        loop {
            let mut line = String::new();
            let bytes_read = self.inner.read_line(&mut line).await?;
            if bytes_read == 0 {
                return Ok(None);
            }
            let trimmed = line.trim_end_matches(['\n', '\r']);
            if trimmed.is_empty() {
                continue;
            }
            return Ok(Some(trimmed.to_string()));
        }
    }
}

pub struct LineWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin> LineWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub async fn write_line(&mut self, line: &str) -> Result<(), IpcError> {
        self.inner.write_all(line.as_bytes()).await?;
        self.inner.write_all(b"\n").await?;
        self.inner.flush().await?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reader_skips_blank_lines_and_strips_terminators() {
        let data = b"\r\n{\"a\":1}\n\n{\"b\":2}\r\n".to_vec();
        let mut reader = LineReader::new(std::io::Cursor::new(data));
        assert_eq!(reader.read_line().await.unwrap().as_deref(), Some("{\"a\":1}"));
        assert_eq!(reader.read_line().await.unwrap().as_deref(), Some("{\"b\":2}"));
        assert_eq!(reader.read_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn writer_appends_single_newline() {
        let mut writer = LineWriter::new(Vec::new());
        writer.write_line("hello").await.unwrap();
        assert_eq!(writer.into_inner(), b"hello\n");
    }
}
