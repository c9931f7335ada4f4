//! WebSocket transport on tokio-tungstenite
//!
//! Each transport runs in its own tokio task. Outbound frames reach the task
//! over an unbounded channel; dropping the sending half closes the socket.
//! Everything the socket does is reported to the session loop as a
//! [`TransportEvent`] tagged with the transport id.

use super::client::LoopEvent;
use crate::traits::{Connector, Result, SessionError, Transport, TransportEvent, TransportId};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

/// Opens tokio-tungstenite connections to a fixed URL
pub struct WsConnector {
    url: String,
    loop_tx: UnboundedSender<LoopEvent>,
}

impl WsConnector {
    pub(crate) fn new(url: impl Into<String>, loop_tx: UnboundedSender<LoopEvent>) -> Self {
        Self {
            url: url.into(),
            loop_tx,
        }
    }
}

impl Connector for WsConnector {
    fn open(&mut self, id: TransportId) -> Result<Box<dyn Transport>> {
        if self.loop_tx.is_closed() {
            return Err(SessionError::Transport("session loop has stopped".to_string()));
        }

        let (outbound_tx, outbound_rx) = unbounded_channel();
        tokio::spawn(run_transport(
            self.url.clone(),
            id,
            outbound_rx,
            self.loop_tx.clone(),
        ));

        Ok(Box::new(WsTransport {
            id,
            outbound: Some(outbound_tx),
        }))
    }
}

/// Handle to one socket task
pub struct WsTransport {
    id: TransportId,
    outbound: Option<UnboundedSender<String>>,
}

impl Transport for WsTransport {
    fn send(&mut self, frame: String) -> Result<()> {
        let outbound = self
            .outbound
            .as_ref()
            .ok_or_else(|| SessionError::ConnectionClosed(format!("{} is closed", self.id)))?;

        outbound
            .send(frame)
            .map_err(|_| SessionError::ConnectionClosed(format!("{} socket task has exited", self.id)))
    }

    fn close(&mut self) {
        // Dropping the sender ends the socket task's write loop
        self.outbound.take();
    }
}

async fn run_transport(
    url: String,
    id: TransportId,
    mut outbound_rx: UnboundedReceiver<String>,
    loop_tx: UnboundedSender<LoopEvent>,
) {
    let report = |event: TransportEvent| {
        let _ = loop_tx.send(LoopEvent::Transport(id, event));
    };

    // Nothing is queued before Opened, so a recv here only ever sees the drop
    let connected = tokio::select! {
        result = connect_async(url.as_str()) => result,
        None = outbound_rx.recv() => {
            debug!("{} abandoned before open", id);
            return;
        }
    };

    let ws_stream = match connected {
        Ok((ws_stream, _)) => ws_stream,
        Err(e) => {
            warn!("{} failed to connect to {}: {}", id, url, e);
            report(TransportEvent::Closed(format!("connect failed: {}", e)));
            return;
        }
    };

    info!("{} connected to {}", id, url);
    report(TransportEvent::Opened);

    let (mut write, mut read) = ws_stream.split();

    let reason = loop {
        tokio::select! {
            outbound = outbound_rx.recv() => {
                match outbound {
                    Some(frame) => {
                        if let Err(e) = write.send(Message::Text(frame)).await {
                            break format!("write failed: {}", e);
                        }
                    }
                    None => {
                        debug!("{} closed locally", id);
                        let _ = write.close().await;
                        return;
                    }
                }
            }

            inbound = read.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => report(TransportEvent::Frame(text)),
                    Some(Ok(Message::Binary(data))) => match String::from_utf8(data) {
                        Ok(text) => report(TransportEvent::Frame(text)),
                        Err(_) => warn!("{} dropping non UTF-8 binary frame", id),
                    },
                    Some(Ok(Message::Close(frame))) => {
                        break frame
                            .map(|f| format!("closed by peer ({}): {}", u16::from(f.code), f.reason))
                            .unwrap_or_else(|| "closed by peer".to_string());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break format!("read failed: {}", e),
                    None => break "stream ended".to_string(),
                }
            }
        }
    };

    warn!("{} lost: {}", id, reason);
    report(TransportEvent::Closed(reason));
}
