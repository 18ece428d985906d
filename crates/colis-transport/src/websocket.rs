//! WebSocket transport implementation

use bytes::Bytes;
use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

use colis_core::{ColisError, ColisResult};
use colis_wire::InboundMessage;

use crate::{Connector, MessageSource};

/// Connects to a detector's WebSocket endpoint
#[derive(Clone, Debug)]
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        WsConnector { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Connector for WsConnector {
    type Source = WsSource;

    async fn connect(&self) -> ColisResult<WsSource> {
        let (stream, response) = connect_async(self.url.as_str())
            .await
            .map_err(|e| ColisError::TransportError(e.to_string()))?;

        debug!(url = %self.url, status = %response.status(), "websocket handshake complete");
        Ok(WsSource { stream })
    }

    fn endpoint(&self) -> String {
        self.url.clone()
    }
}

/// One WebSocket connection
pub struct WsSource {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl MessageSource for WsSource {
    async fn next_message(&mut self) -> Option<ColisResult<InboundMessage>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Binary(data)) => {
                    return Some(Ok(InboundMessage::Binary(Bytes::from(data))))
                }
                Ok(Message::Text(text)) => return Some(Ok(InboundMessage::Text(text))),
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "peer closed websocket");
                    return None;
                }
                // Ping/pong are answered by tungstenite itself
                Ok(other) => trace!(len = other.len(), "control frame skipped"),
                Err(e) => return Some(Err(ColisError::TransportError(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            trace!(error = %e, "websocket close");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::SinkExt;
    use tokio::net::TcpListener;

    async fn serve_once(messages: Vec<Message>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            for message in messages {
                ws.send(message).await.unwrap();
            }
            ws.close(None).await.ok();
        });

        format!("ws://{}/ws", addr)
    }

    #[tokio::test]
    async fn test_websocket_delivers_both_kinds() {
        let url = serve_once(vec![
            Message::Binary(vec![0xFF, 0xD8]),
            Message::Ping(vec![1]),
            Message::Text(r#"{"id":"1"}"#.to_string()),
        ])
        .await;

        let connector = WsConnector::new(url.clone());
        assert_eq!(connector.endpoint(), url);

        let mut source = connector.connect().await.unwrap();
        assert_eq!(
            source.next_message().await.unwrap().unwrap(),
            InboundMessage::binary(vec![0xFF, 0xD8])
        );
        assert_eq!(
            source.next_message().await.unwrap().unwrap(),
            InboundMessage::text(r#"{"id":"1"}"#)
        );
        assert!(source.next_message().await.is_none());
    }

    #[tokio::test]
    async fn test_connect_refused_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = WsConnector::new(format!("ws://{}/ws", addr))
            .connect()
            .await
            .err()
            .unwrap();
        assert!(err.is_transport());
    }
}
