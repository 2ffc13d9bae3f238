use super::protocol::{HttpCodec, HttpProtocolError, RequestFrame};
use super::request::InboundRequest;
use super::response::Response;
use crate::printer::RequestPrinter;
use crate::{PrinterError, Result};
use futures_util::{SinkExt, StreamExt};
use std::io;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::Framed;
use tracing::{debug, warn};

/// Serves HTTP/1.x requests on one connection until the client goes away.
///
/// Every request is printed and answered with an empty `200 OK`. A request
/// whose body cannot be read is printed with a diagnostic and the connection
/// is dropped without a response.
pub async fn serve_connection<S>(
    stream: S,
    remote_addr: SocketAddr,
    printer: &RequestPrinter,
    buffer_size: usize,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut framed = Framed::with_capacity(stream, HttpCodec::new(remote_addr), buffer_size);

    loop {
        let head = match framed.next().await {
            None => {
                debug!(%remote_addr, "Client closed connection");
                return Ok(());
            }
            Some(Ok(RequestFrame::Head(head))) => head,
            Some(Ok(RequestFrame::Body(_))) => {
                return Err(PrinterError::Protocol("body frame without a request head".to_string()));
            }
            Some(Err(HttpProtocolError::Io(e))) => return Err(e.into()),
            Some(Err(e)) => {
                warn!(%remote_addr, error = %e, "Rejecting malformed request");
                framed.send(Response::bad_request()).await?;
                let _ = framed.get_mut().shutdown().await;
                return Err(e.into());
            }
        };

        debug!(%remote_addr, method = %head.method, path = %head.path, "Request head received");

        if head.expects_continue() {
            framed.send(Response::continue_()).await?;
        }

        let body = match framed.next().await {
            Some(Ok(RequestFrame::Body(body))) => body,
            Some(Ok(RequestFrame::Head(_))) => {
                return Err(PrinterError::Protocol("request head where a body was expected".to_string()));
            }
            Some(Err(HttpProtocolError::Io(e))) => {
                printer.print_read_failure(&head, &e);
                return Ok(());
            }
            Some(Err(e)) => {
                printer.print_read_failure(&head, &io::Error::new(io::ErrorKind::InvalidData, e));
                return Ok(());
            }
            None => {
                let e = io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed before the body");
                printer.print_read_failure(&head, &e);
                return Ok(());
            }
        };

        let response = Response::ok(&head);
        printer.print(&InboundRequest::new(head, body));
        framed.send(response).await?;

        if response.closes_connection() {
            framed.get_mut().shutdown().await?;
            return Ok(());
        }
    }
}
