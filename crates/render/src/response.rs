//! Responses ready to be written to a client.

use crate::error::{ErrorKind, Result};
use crate::page::ErrorPage;
use exn::ResultExt;
use std::fmt;
use std::pin::Pin;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub type BoxReader = Pin<Box<dyn AsyncRead + Send + 'static>>;

const CHUNK_SIZE: usize = 64 * 1024;

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_CSV: &str = "text/csv";
pub const CONTENT_TYPE_SQLITE: &str = "application/x-sqlite3";
pub const CONTENT_TYPE_TEXT: &str = "text/plain; charset=utf-8";

/// Query-escape a filename for a `Content-Disposition` header.
///
/// Spaces become `+`; anything outside the unreserved set is
/// percent-encoded.
pub fn escape_filename(name: &str) -> String {
    url::form_urlencoded::byte_serialize(name.as_bytes()).collect()
}

fn attachment(filename: &str) -> String {
    format!("attachment; filename={filename}")
}

pub enum Body {
    Bytes(Vec<u8>),
    /// Passed through chunk by chunk, never buffered whole.
    Stream(BoxReader),
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Self::Stream(_) => f.write_str("Stream"),
        }
    }
}

#[derive(Debug)]
pub struct Response {
    pub status: u16,
    pub content_type: &'static str,
    pub content_disposition: Option<String>,
    pub body: Body,
}

/// How much of a response reached the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub bytes: u64,
    /// `false` if the sink failed before the whole body was written.
    pub complete: bool,
}

impl Response {
    pub fn json(body: Vec<u8>) -> Self {
        Self { status: 200, content_type: CONTENT_TYPE_JSON, content_disposition: None, body: Body::Bytes(body) }
    }

    /// CSV attachment named `<table>.csv`.
    pub fn csv(table: &str, body: Vec<u8>) -> Self {
        Self {
            status: 200,
            content_type: CONTENT_TYPE_CSV,
            content_disposition: Some(attachment(&format!("{}.csv", escape_filename(table)))),
            body: Body::Bytes(body),
        }
    }

    /// Raw database attachment named after the database.
    pub fn raw(database: &str, reader: BoxReader) -> Self {
        Self {
            status: 200,
            content_type: CONTENT_TYPE_SQLITE,
            content_disposition: Some(attachment(&escape_filename(database))),
            body: Body::Stream(reader),
        }
    }

    pub fn error(page: &ErrorPage) -> Self {
        Self {
            status: page.status,
            content_type: CONTENT_TYPE_TEXT,
            content_disposition: None,
            body: Body::Bytes(page.to_string().into_bytes()),
        }
    }

    /// Response body as bytes, if it isn't a stream.
    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.body {
            Body::Bytes(bytes) => Some(bytes),
            Body::Stream(_) => None,
        }
    }

    /// Write the body to `sink`.
    ///
    /// A failing sink means the client went away: it is logged and reported
    /// through [`Delivery::complete`], not as an error. Only a failure to
    /// read a streamed body is an error.
    pub async fn write_to<W: AsyncWrite + Unpin>(self, sink: &mut W) -> Result<Delivery> {
        match self.body {
            Body::Bytes(bytes) => {
                let complete = match sink.write_all(&bytes).await {
                    Ok(()) => flush(sink).await,
                    Err(err) => sink_failed(&err, 0),
                };
                let written = if complete { bytes.len() as u64 } else { 0 };
                Ok(Delivery { bytes: written, complete })
            },
            Body::Stream(mut reader) => {
                let mut buffer = vec![0u8; CHUNK_SIZE];
                let mut written = 0u64;
                loop {
                    let read = reader.read(&mut buffer).await.or_raise(|| ErrorKind::Source)?;
                    if read == 0 {
                        let complete = flush(sink).await;
                        return Ok(Delivery { bytes: written, complete });
                    }
                    if let Err(err) = sink.write_all(&buffer[..read]).await {
                        return Ok(Delivery { bytes: written, complete: sink_failed(&err, written) });
                    }
                    written += read as u64;
                }
            },
        }
    }
}

async fn flush<W: AsyncWrite + Unpin>(sink: &mut W) -> bool {
    match sink.flush().await {
        Ok(()) => true,
        Err(err) => sink_failed(&err, 0),
    }
}

fn sink_failed(err: &std::io::Error, written: u64) -> bool {
    tracing::warn!(error = %err, written, "Client stopped receiving the response");
    false
}
