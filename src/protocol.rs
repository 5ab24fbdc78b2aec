//! Newline-delimited JSON codec for the gpsd protocol
//!
//! gpsd answers every request with one JSON object per line. The traits
//! here add `read_response`/`write_request` to any buffered reader or
//! writer, blocking or async.

use crate::error::SourceError;

pub mod v3;

/// Result type of the wire layer
pub type SourceResult<T> = core::result::Result<T, SourceError>;

/// A message gpsd can send, decoded from one JSON line
pub trait GpsdJsonResponse: serde::de::DeserializeOwned {}

/// A command a client can send to gpsd
pub trait GpsdJsonRequest {
    /// Renders the request as a gpsd command, e.g. `?POLL;`
    fn to_command(&self) -> String;
}

fn decode_line<Res: GpsdJsonResponse>(line: &str) -> SourceResult<Res> {
    serde_json::from_str(line.trim_end()).map_err(SourceError::SerdeError)
}

pub trait GpsdJsonDecode: std::io::BufRead {
    /// Reads one line and decodes it; `Ok(None)` on EOF
    fn read_response<Res>(&mut self, buf: &mut String) -> SourceResult<Option<Res>>
    where
        Res: GpsdJsonResponse,
    {
        buf.clear();
        let bytes_read = self.read_line(buf).map_err(SourceError::from_io)?;
        if bytes_read == 0 {
            return Ok(None); // EOF reached
        }

        decode_line(buf).map(Some)
    }
}

impl<R: std::io::BufRead + ?Sized> GpsdJsonDecode for R {}

pub trait GpsdJsonEncode: std::io::Write {
    fn write_request(&mut self, request: &impl GpsdJsonRequest) -> SourceResult<()> {
        let cmd = request.to_command();
        tracing::trace!(command = %cmd, "sending request");
        self.write_all(cmd.as_bytes())
            .and_then(|_| self.flush())
            .map_err(SourceError::from_io)
    }
}

impl<W: std::io::Write + ?Sized> GpsdJsonEncode for W {}

pub trait GpsdJsonDecodeAsync: futures_io::AsyncBufRead + Unpin {
    /// Async counterpart of [`GpsdJsonDecode::read_response`]
    fn read_response_async<Res>(
        &mut self,
        buf: &mut String,
    ) -> impl std::future::Future<Output = SourceResult<Option<Res>>>
    where
        Res: GpsdJsonResponse,
    {
        async move {
            use futures_util::AsyncBufReadExt;

            buf.clear();
            let bytes_read = self.read_line(buf).await.map_err(SourceError::from_io)?;
            if bytes_read == 0 {
                return Ok(None);
            }

            decode_line(buf).map(Some)
        }
    }
}

impl<R: futures_io::AsyncBufRead + Unpin + ?Sized> GpsdJsonDecodeAsync for R {}

pub trait GpsdJsonEncodeAsync: futures_io::AsyncWrite + Unpin {
    fn write_request_async(
        &mut self,
        request: &impl GpsdJsonRequest,
    ) -> impl std::future::Future<Output = SourceResult<()>> {
        let cmd = request.to_command();
        async move {
            use futures_util::AsyncWriteExt;

            tracing::trace!(command = %cmd, "sending request");
            self.write_all(cmd.as_bytes())
                .await
                .map_err(SourceError::from_io)?;
            self.flush().await.map_err(SourceError::from_io)
        }
    }
}

impl<W: futures_io::AsyncWrite + Unpin + ?Sized> GpsdJsonEncodeAsync for W {}
