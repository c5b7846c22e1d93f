use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, WebSocketStream};
use tracing::{debug, info};

use crate::config::ApiConfig;
use crate::error::{FieldcallError, FieldcallResult};

use super::frame::ChannelFrame;
use super::traits::{ChannelConnector, ChannelTransport};

/// Connects to `{ws_url}/ws/consultation/{session_id}?token=...`.
pub struct WebSocketConnector {
    ws_url: String,
    token: Option<String>,
}

impl WebSocketConnector {
    pub fn new(config: &ApiConfig, token: Option<String>) -> Self {
        Self {
            ws_url: config.ws_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    pub fn endpoint(&self, session_id: &str) -> String {
        match &self.token {
            Some(token) => format!(
                "{}/ws/consultation/{}?token={}",
                self.ws_url, session_id, token
            ),
            None => format!("{}/ws/consultation/{}", self.ws_url, session_id),
        }
    }
}

#[async_trait]
impl ChannelConnector for WebSocketConnector {
    async fn connect(&self, session_id: &str) -> FieldcallResult<Arc<dyn ChannelTransport>> {
        let url = self.endpoint(session_id);
        let (stream, response) = connect_async(url.as_str())
            .await
            .map_err(|e| FieldcallError::ChannelConnectFailed(e.to_string()))?;

        info!(
            session_id = %session_id,
            status = response.status().as_u16(),
            "WebSocket connected"
        );
        Ok(Arc::new(WebSocketTransport::new(stream)))
    }
}

/// JSON text frames over a split WebSocket stream.
pub struct WebSocketTransport<S> {
    sink: Mutex<SplitSink<WebSocketStream<S>, WsMessage>>,
    stream: Mutex<SplitStream<WebSocketStream<S>>>,
}

impl<S> WebSocketTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(ws: WebSocketStream<S>) -> Self {
        let (sink, stream) = ws.split();
        Self {
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
        }
    }
}

#[async_trait]
impl<S> ChannelTransport for WebSocketTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn send(&self, frame: &ChannelFrame) -> FieldcallResult<()> {
        let text = frame.encode()?;
        self.sink.lock().await.send(WsMessage::Text(text)).await?;
        Ok(())
    }

    async fn recv(&self) -> FieldcallResult<Option<ChannelFrame>> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(WsMessage::Text(text))) => return ChannelFrame::decode(&text).map(Some),
                Some(Ok(WsMessage::Binary(bytes))) => {
                    let text = String::from_utf8(bytes.to_vec()).map_err(|e| {
                        FieldcallError::SignalingError(format!("binary frame is not UTF-8: {}", e))
                    })?;
                    return ChannelFrame::decode(&text).map(Some);
                }
                Some(Ok(WsMessage::Close(close))) => {
                    debug!(?close, "WebSocket close frame received");
                    return Ok(None);
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(None),
            }
        }
    }

    async fn close(&self) -> FieldcallResult<()> {
        let mut sink = self.sink.lock().await;
        sink.send(WsMessage::Close(None)).await?;
        sink.close().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint() {
        let config = ApiConfig {
            ws_url: "ws://localhost:8000/".to_string(),
            ..ApiConfig::default()
        };

        let connector = WebSocketConnector::new(&config, Some("tok".to_string()));
        assert_eq!(
            connector.endpoint("abc"),
            "ws://localhost:8000/ws/consultation/abc?token=tok"
        );

        let connector = WebSocketConnector::new(&config, None);
        assert_eq!(
            connector.endpoint("abc"),
            "ws://localhost:8000/ws/consultation/abc"
        );
    }
}
