//! # Network Module
//!
//! WebSocket plumbing between the steering executable and the driving simulator. The simulator
//! speaks a socket.io style event protocol carried in WebSocket text frames, see [`crate::sim`]
//! for the frame codec.
//!
//! The executable is the server: it listens on a TCP address and upgrades each accepted
//! connection to a WebSocket. A single simulator is served at a time, and a closed connection is
//! reported as the end of the frame stream so the caller can treat it as an episode boundary.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::net::SocketAddr;
use futures::{SinkExt, StreamExt};
use log::{debug, trace};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream,
    tungstenite::{self, Message}
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Listens for simulator connections.
pub struct WsListener {
    listener: TcpListener
}

/// An open WebSocket connection carrying text frames.
pub struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,

    /// Address of the other end
    peer: Option<SocketAddr>
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum NetError {
    #[error("Could not bind to {0}: {1}")]
    BindError(String, std::io::Error),

    #[error("Could not accept a connection: {0}")]
    AcceptError(std::io::Error),

    #[error("WebSocket handshake failed: {0}")]
    HandshakeError(tungstenite::Error),

    #[error("Could not connect to {0}: {1}")]
    ConnectError(String, tungstenite::Error),

    #[error("Could not send the frame: {0}")]
    SendError(tungstenite::Error),

    #[error("Could not recieve a frame: {0}")]
    RecvError(tungstenite::Error),

    #[error("Recieved a binary frame which is not valid UTF-8")]
    NonUtf8Frame
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl WsListener {
    /// Bind to a TCP address such as `"0.0.0.0:4567"`.
    pub async fn bind(address: &str) -> Result<Self, NetError> {
        let listener = TcpListener::bind(address)
            .await
            .map_err(|e| NetError::BindError(address.into(), e))?;

        Ok(Self { listener })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.local_addr().ok()
    }

    /// Wait for the next client and complete the WebSocket handshake.
    ///
    /// Any request path is accepted, the simulator's socket.io client asks for
    /// `/socket.io/?EIO=4&transport=websocket`.
    pub async fn accept(&self) -> Result<WsConnection, NetError> {
        let (tcp, peer) = self.listener.accept()
            .await
            .map_err(NetError::AcceptError)?;

        // Frames are small and sent once per tick
        tcp.set_nodelay(true).ok();

        let stream = tokio_tungstenite::accept_async(MaybeTlsStream::Plain(tcp))
            .await
            .map_err(NetError::HandshakeError)?;

        debug!("WebSocket client attached from {}", peer);

        Ok(WsConnection {
            stream,
            peer: Some(peer)
        })
    }
}

impl WsConnection {
    /// Connect to a WebSocket server at the given URL, e.g. `"ws://localhost:4567"`.
    pub async fn connect(url: &str) -> Result<Self, NetError> {
        let (stream, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| NetError::ConnectError(url.into(), e))?;

        Ok(Self {
            stream,
            peer: None
        })
    }

    /// Address of the other end, known for accepted connections.
    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Wait for the next text frame.
    ///
    /// Returns `None` once the connection has been closed. Control frames are handled internally
    /// and never returned.
    pub async fn recv_text(&mut self) -> Option<Result<String, NetError>> {
        loop {
            let msg = match self.stream.next().await? {
                Ok(m) => m,
                Err(tungstenite::Error::ConnectionClosed)
                | Err(tungstenite::Error::AlreadyClosed) => return None,
                Err(e) => return Some(Err(NetError::RecvError(e)))
            };

            match msg {
                Message::Text(s) => return Some(Ok(s)),
                Message::Binary(b) => {
                    return Some(String::from_utf8(b).map_err(|_| NetError::NonUtf8Frame))
                },
                Message::Close(frame) => {
                    trace!("Close frame recieved: {:?}", frame);
                    return None
                },
                _ => continue
            }
        }
    }

    /// Send a text frame.
    pub async fn send_text(&mut self, text: String) -> Result<(), NetError> {
        self.stream.send(Message::Text(text))
            .await
            .map_err(NetError::SendError)
    }

    /// Close the connection.
    pub async fn close(&mut self) -> Result<(), NetError> {
        match self.stream.close(None).await {
            Ok(()) | Err(tungstenite::Error::ConnectionClosed) => Ok(()),
            Err(e) => Err(NetError::SendError(e))
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn test_text_frames_and_close() -> Result<(), NetError> {
        let listener = WsListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr().expect("listener has no address");

        let client = tokio::spawn(async move {
            let url = format!("ws://{}/socket.io/?EIO=4&transport=websocket", addr);
            let mut conn = WsConnection::connect(&url).await?;
            conn.send_text("42[\"telemetry\",{}]".into()).await?;
            let reply = conn.recv_text().await;
            conn.close().await?;
            Ok::<_, NetError>(reply)
        });

        let mut server = listener.accept().await?;
        assert!(server.peer().is_some());

        match server.recv_text().await {
            Some(Ok(s)) => assert_eq!(s, "42[\"telemetry\",{}]"),
            other => panic!("unexpected frame {:?}", other)
        }

        server.send_text("42[\"manual\",{}]".into()).await?;

        // The client closing ends the stream
        assert!(server.recv_text().await.is_none());

        match client.await {
            Ok(Ok(Some(Ok(reply)))) => assert_eq!(reply, "42[\"manual\",{}]"),
            other => panic!("client failed: {:?}", other.map(|r| r.map(|_| ())))
        }

        Ok(())
    }
}
