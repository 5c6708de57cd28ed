use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderValue, header::AUTHORIZATION};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::error::{ClientError, Result};

use super::transport::{Connector, InboundFrame, Link, OutboundFrame};

const LINK_BUFFER: usize = 64;

/// Websocket connector carrying the session token as a bearer header.
#[derive(Debug, Clone)]
pub struct WsConnector {
    connect_timeout: Duration,
}

impl WsConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str, token: Option<&str>) -> Result<Link> {
        let mut request = url.into_client_request()?;
        if let Some(token) = token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|err| ClientError::Auth(format!("token is not a valid header: {err}")))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        let (stream, _response) = tokio::time::timeout(self.connect_timeout, connect_async(request))
            .await
            .map_err(|_| ClientError::Network(format!("timed out connecting to {url}")))??;
        log::info!("WebSocket connected to {url}");

        let (outbound_tx, outbound_rx) = mpsc::channel(LINK_BUFFER);
        let (inbound_tx, inbound_rx) = mpsc::channel(LINK_BUFFER);
        tokio::spawn(pump(stream, outbound_rx, inbound_tx));

        Ok(Link {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}

/// Shuttle frames between the socket and the link channels until either side
/// closes.
async fn pump(
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    mut outbound: mpsc::Receiver<OutboundFrame>,
    inbound: mpsc::Sender<InboundFrame>,
) {
    let (mut sink, mut source) = stream.split();

    loop {
        tokio::select! {
            frame = outbound.recv() => match frame {
                Some(OutboundFrame::Text(text)) => {
                    if let Err(err) = sink.send(Message::text(text)).await {
                        log::warn!("WebSocket send failed: {err}");
                        let _ = inbound.send(InboundFrame::Error(err.to_string())).await;
                        break;
                    }
                }
                Some(OutboundFrame::Close) | None => {
                    if let Err(err) = sink.close().await {
                        log::debug!("WebSocket close handshake failed: {err}");
                    }
                    break;
                }
            },
            incoming = source.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    log::debug!("WebSocket frame received ({} bytes)", text.len());
                    if inbound.send(InboundFrame::Text(text.to_string())).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => {
                        if inbound.send(InboundFrame::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => log::warn!("Dropping non UTF-8 binary frame: {err}"),
                },
                Some(Ok(Message::Close(_))) | None => {
                    let _ = inbound.send(InboundFrame::Closed).await;
                    break;
                }
                // Pings are answered by tungstenite; pongs need nothing.
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    log::warn!("WebSocket read failed: {err}");
                    let _ = inbound.send(InboundFrame::Error(err.to_string())).await;
                    break;
                }
            },
        }
    }
}
