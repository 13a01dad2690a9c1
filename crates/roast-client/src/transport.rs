//! Blocking WebSocket transport with a short read timeout, so one thread
//! can interleave frame reads with terminal input.

use std::io::ErrorKind;
use std::net::TcpStream;

use smol_str::SmolStr;
use tracing::{debug, info};
use tungstenite::client::IntoClientRequest;
use tungstenite::http::HeaderValue;
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Error as WsError, Message, WebSocket};

use crate::config::ConnectionConfig;
use crate::error::ClientError;
use crate::session::{Session, SessionUpdate, Transport, TransportEvent};

pub struct WsTransport {
    socket: WebSocket<MaybeTlsStream<TcpStream>>,
    url: SmolStr,
    failed: bool,
}

impl WsTransport {
    pub fn connect(config: &ConnectionConfig) -> Result<Self, ClientError> {
        let fail = |err: WsError| transport_error(&config.url, &err);
        let mut request = config.url.as_str().into_client_request().map_err(fail)?;
        let protocol = HeaderValue::from_str(&config.subprotocol).map_err(|err| {
            let message = format!("subprotocol '{}': {err}", config.subprotocol);
            ClientError::InvalidConfig(message.into())
        })?;
        request
            .headers_mut()
            .insert("Sec-WebSocket-Protocol", protocol);
        let (mut socket, _response) = tungstenite::connect(request).map_err(fail)?;
        if let MaybeTlsStream::Plain(stream) = socket.get_mut() {
            stream
                .set_read_timeout(Some(config.read_timeout))
                .map_err(|err| ClientError::Transport(format!("read timeout: {err}").into()))?;
        }
        info!(url = %config.url, "connected");
        Ok(Self {
            socket,
            url: config.url.clone(),
            failed: false,
        })
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Reads at most one frame. `None` means nothing arrived within the read
    /// timeout, or the frame was a control frame.
    pub fn read_event(&mut self) -> Option<TransportEvent> {
        if self.failed {
            return Some(TransportEvent::Closed);
        }
        match self.socket.read() {
            Ok(Message::Text(text)) => Some(TransportEvent::Message(text.as_str().to_string())),
            Ok(Message::Binary(bytes)) => {
                debug!(len = bytes.len(), "binary frame ignored");
                None
            }
            Ok(Message::Close(frame)) => {
                debug!(?frame, "close frame");
                Some(TransportEvent::Closed)
            }
            Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => None,
            Err(WsError::Io(err)) if is_timeout(&err) => None,
            Err(err) if is_connection_closed(&err) => Some(TransportEvent::Closed),
            Err(err) => {
                // The socket is unusable after any other error.
                self.failed = true;
                Some(TransportEvent::Error(err.to_string()))
            }
        }
    }
}

impl Transport for WsTransport {
    fn send(&mut self, text: &str) -> Result<(), ClientError> {
        self.socket
            .send(Message::text(text.to_string()))
            .map_err(|err| transport_error(&self.url, &err))
    }

    fn close(&mut self) -> Result<(), ClientError> {
        match self.socket.close(None) {
            Ok(()) => Ok(()),
            Err(err) if is_connection_closed(&err) => Ok(()),
            Err(err) => Err(transport_error(&self.url, &err)),
        }
    }
}

impl Session<WsTransport> {
    /// Connects and returns an open session.
    pub fn connect(config: &ConnectionConfig) -> Result<Self, ClientError> {
        let transport = WsTransport::connect(config)?;
        let mut session = Session::new(transport);
        session.handle_event(TransportEvent::Opened);
        Ok(session)
    }

    /// Reads and routes at most one frame without blocking past the read
    /// timeout.
    pub fn poll(&mut self) -> Option<SessionUpdate> {
        if self.is_closed() {
            return None;
        }
        let event = self.transport_mut().read_event()?;
        self.handle_event(event)
    }
}

fn is_timeout(err: &std::io::Error) -> bool {
    matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

fn is_connection_closed(err: &WsError) -> bool {
    matches!(err, WsError::ConnectionClosed | WsError::AlreadyClosed)
}

fn transport_error(url: &str, err: &WsError) -> ClientError {
    ClientError::Transport(format!("{url}: {err}").into())
}
