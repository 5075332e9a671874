//! Transport primitives for the reconnecting socket.
//!
//! The worker thread only talks to the [`Transport`] and [`Channel`] traits.
//! [`WebSocketTransport`] is the production implementation built on
//! `tungstenite`, covering `ws://` and `wss://` (via `native-tls`) URLs.

use std::{
    borrow::Cow,
    fmt,
    io,
    net::{SocketAddr, TcpStream, ToSocketAddrs},
    time::Duration,
};

use native_tls::TlsConnector;
use tungstenite::{
    client::IntoClientRequest,
    handshake::HandshakeError,
    protocol::{CloseFrame, frame::coding::CloseCode},
    stream::MaybeTlsStream,
    Connector, Message, WebSocket,
};

use super::events::{CLOSE_NORMAL, CloseEvent};

/// Frame or state change read from an open channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Incoming {
    Text(String),
    Closed(CloseEvent),
}

/// Establishes connections for a [`ReconnectingSocket`](super::ReconnectingSocket).
pub trait Transport: Send + Sync {
    /// Open a connection to `url`, giving up after `timeout`.
    ///
    /// Timeouts must be reported with [`io::ErrorKind::TimedOut`].
    fn connect(&self, url: &str, timeout: Duration) -> io::Result<Box<dyn Channel>>;
}

/// An open, message-oriented connection.
pub trait Channel: Send {
    /// Write a text frame.
    fn send_text(&mut self, text: &str) -> io::Result<()>;

    /// Wait up to `wait` for the next inbound frame.
    ///
    /// Returns `Ok(None)` when nothing arrived in time.
    fn poll(&mut self, wait: Duration) -> io::Result<Option<Incoming>>;

    /// Send a close frame and release the connection.
    fn close(&mut self, code: u16, reason: &str) -> io::Result<()>;
}

/// TLS connection options used for `wss://` URLs.
#[derive(Clone, Debug, Default)]
pub struct TlsOptions {
    /// Skip certificate validation when true (intended for tests).
    pub insecure_skip_verify: bool,
}

impl TlsOptions {
    fn connector(&self) -> io::Result<TlsConnector> {
        let mut builder = TlsConnector::builder();
        if self.insecure_skip_verify {
            builder.danger_accept_invalid_certs(true);
            builder.danger_accept_invalid_hostnames(true);
        }
        builder.build().map_err(io::Error::other)
    }
}

/// WebSocket transport backed by `tungstenite`.
#[derive(Clone, Debug, Default)]
pub struct WebSocketTransport {
    tls: Option<TlsOptions>,
}

impl WebSocketTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use custom TLS options for secure URLs.
    pub fn with_tls(mut self, tls: TlsOptions) -> Self {
        self.tls = Some(tls);
        self
    }
}

impl Transport for WebSocketTransport {
    fn connect(&self, url: &str, timeout: Duration) -> io::Result<Box<dyn Channel>> {
        let request = url
            .into_client_request()
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;
        let uri = request.uri();
        let secure = match uri.scheme_str() {
            Some("wss") => true,
            Some("ws") => false,
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("{url} is not a ws:// or wss:// url"),
                ));
            }
        };
        let host = uri
            .host()
            .map(|host| host.trim_start_matches('[').trim_end_matches(']').to_owned())
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidInput, format!("{url} has no host"))
            })?;
        let port = uri.port_u16().unwrap_or(if secure { 443 } else { 80 });

        let stream = connect_tcp(&host, port, timeout)?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;

        let connector = match (&self.tls, secure) {
            (Some(tls), true) => Some(Connector::NativeTls(tls.connector()?)),
            _ => None,
        };
        let (socket, _response) =
            tungstenite::client_tls_with_config(request, stream, None, connector)
                .map_err(handshake_error)?;
        Ok(Box::new(WebSocketChannel { socket }))
    }
}

fn connect_tcp(host: &str, port: u16, timeout: Duration) -> io::Result<TcpStream> {
    let addrs: Vec<SocketAddr> = (host, port).to_socket_addrs()?.collect();
    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => {
                stream.set_nodelay(true)?;
                return Ok(stream);
            }
            Err(err) => last_err = Some(err),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("no addresses found for {host}:{port}"),
        )
    }))
}

fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

fn handshake_error<R>(err: HandshakeError<R>) -> io::Error
where
    R: tungstenite::handshake::HandshakeRole,
{
    match err {
        HandshakeError::Interrupted(_) => {
            io::Error::new(io::ErrorKind::TimedOut, "websocket handshake timed out")
        }
        HandshakeError::Failure(tungstenite::Error::Io(err)) if is_timeout(&err) => {
            io::Error::new(io::ErrorKind::TimedOut, err)
        }
        HandshakeError::Failure(tungstenite::Error::Io(err)) => err,
        HandshakeError::Failure(err) => io::Error::other(err),
    }
}

struct WebSocketChannel {
    socket: WebSocket<MaybeTlsStream<TcpStream>>,
}

impl WebSocketChannel {
    fn tcp(&self) -> Option<&TcpStream> {
        match self.socket.get_ref() {
            MaybeTlsStream::Plain(stream) => Some(stream),
            MaybeTlsStream::NativeTls(stream) => Some(stream.get_ref()),
            _ => None,
        }
    }
}

impl Channel for WebSocketChannel {
    fn send_text(&mut self, text: &str) -> io::Result<()> {
        self.socket
            .send(Message::text(text))
            .map_err(io::Error::other)
    }

    fn poll(&mut self, wait: Duration) -> io::Result<Option<Incoming>> {
        if let Some(stream) = self.tcp() {
            stream.set_read_timeout(Some(wait.max(Duration::from_millis(1))))?;
        }
        match self.socket.read() {
            Ok(Message::Text(text)) => Ok(Some(Incoming::Text(text))),
            Ok(Message::Binary(data)) => String::from_utf8(data)
                .map(|text| Some(Incoming::Text(text)))
                .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err)),
            Ok(Message::Close(frame)) => {
                // Pushes out the close reply queued by tungstenite.
                let _ = self.socket.flush();
                Ok(Some(Incoming::Closed(close_event(frame))))
            }
            Ok(_) => Ok(None),
            Err(tungstenite::Error::Io(err)) if is_timeout(&err) => Ok(None),
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => Ok(
                Some(Incoming::Closed(CloseEvent::new(CLOSE_NORMAL, "", true))),
            ),
            Err(tungstenite::Error::Io(err)) => Err(err),
            Err(err) => Err(io::Error::other(err)),
        }
    }

    fn close(&mut self, code: u16, reason: &str) -> io::Result<()> {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: Cow::Owned(reason.to_owned()),
        };
        match self.socket.close(Some(frame)) {
            Ok(()) => {
                let _ = self.socket.flush();
                Ok(())
            }
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(err) => Err(io::Error::other(err)),
        }
    }
}

impl fmt::Debug for WebSocketChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebSocketChannel").finish_non_exhaustive()
    }
}

fn close_event(frame: Option<CloseFrame<'_>>) -> CloseEvent {
    match frame {
        Some(frame) => CloseEvent::new(u16::from(frame.code), frame.reason.into_owned(), true),
        None => CloseEvent::new(CLOSE_NORMAL, "", true),
    }
}
