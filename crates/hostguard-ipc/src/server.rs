//! IPC server
//!
//! Each connection gets a reader task that decodes requests and forwards
//! them to the service, and a writer task that drains the client's
//! outgoing queue plus the event broadcast. A line that does not decode
//! is answered with `InvalidRequest` and the connection stays open.

use hostguard_api::{ClientInfo, Command, ErrorCode, ErrorInfo, Event, Request, Response};
use hostguard_util::ClientId;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{debug, error, info, warn};

use crate::registry::ClientRegistry;
use crate::{IpcError, IpcResult};

const EVENT_BUFFER: usize = 100;

/// Message from a connection to the service
pub enum ServerMessage {
    Request {
        client_id: ClientId,
        request: Request,
    },
    ClientConnected {
        client_id: ClientId,
        info: ClientInfo,
    },
    ClientDisconnected {
        client_id: ClientId,
    },
}

/// Unix socket server for hostguardd
pub struct IpcServer {
    socket_path: PathBuf,
    listener: Option<UnixListener>,
    registry: Arc<ClientRegistry>,
    events: broadcast::Sender<Event>,
    inbox_tx: mpsc::UnboundedSender<ServerMessage>,
    inbox_rx: Mutex<Option<mpsc::UnboundedReceiver<ServerMessage>>>,
}

impl IpcServer {
    pub fn new(socket_path: impl AsRef<Path>) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();

        Self {
            socket_path: socket_path.as_ref().to_path_buf(),
            listener: None,
            registry: Arc::new(ClientRegistry::default()),
            events,
            inbox_tx,
            inbox_rx: Mutex::new(Some(inbox_rx)),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Bind the socket, replacing a stale one, with mode 0660
    pub async fn start(&mut self) -> IpcResult<()> {
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)?;
        }
        if let Some(parent) = self.socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let listener = UnixListener::bind(&self.socket_path)?;
        std::fs::set_permissions(&self.socket_path, std::fs::Permissions::from_mode(0o660))?;

        info!(path = %self.socket_path.display(), "IPC server listening");
        self.listener = Some(listener);
        Ok(())
    }

    /// Receiver for requests and connection notices. Can be taken once.
    pub async fn take_message_receiver(&self) -> Option<mpsc::UnboundedReceiver<ServerMessage>> {
        self.inbox_rx.lock().await.take()
    }

    /// Accept connections until the listener fails fatally
    pub async fn run(&self) -> IpcResult<()> {
        let listener = self.listener.as_ref().ok_or(IpcError::NotListening)?;

        loop {
            let stream = match listener.accept().await {
                Ok((stream, _)) => stream,
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                    continue;
                }
            };

            let client_id = ClientId::new();
            let uid = peer_uid(&stream);
            let mut info = match uid {
                Some(uid) => ClientInfo::new().with_uid(uid),
                None => ClientInfo::new(),
            };
            info.client_id = client_id.clone();
            debug!(client_id = %client_id, uid = ?uid, "Accepted connection");

            self.attach(stream, client_id, info).await;
        }
    }

    async fn attach(&self, stream: UnixStream, client_id: ClientId, info: ClientInfo) {
        let (read_half, write_half) = stream.into_split();
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();

        self.registry
            .insert(client_id.clone(), info.clone(), outgoing_tx)
            .await;
        let _ = self.inbox_tx.send(ServerMessage::ClientConnected {
            client_id: client_id.clone(),
            info,
        });

        tokio::spawn(read_requests(
            read_half,
            client_id.clone(),
            self.registry.clone(),
            self.inbox_tx.clone(),
        ));
        tokio::spawn(write_outgoing(
            write_half,
            client_id,
            self.registry.clone(),
            outgoing_rx,
            self.events.subscribe(),
        ));
    }

    /// Queue a response for one client
    pub async fn send_response(&self, client_id: &ClientId, response: Response) -> IpcResult<()> {
        let line = serde_json::to_string(&response)?;
        if self.registry.queue(client_id, line).await {
            Ok(())
        } else {
            Err(IpcError::ConnectionClosed)
        }
    }

    /// Send an event to every subscribed client
    pub fn broadcast_event(&self, event: Event) {
        // No receivers just means no clients are connected
        let _ = self.events.send(event);
    }

    pub async fn get_client_info(&self, client_id: &ClientId) -> Option<ClientInfo> {
        self.registry.info(client_id).await
    }

    pub async fn client_count(&self) -> usize {
        self.registry.len().await
    }

    pub async fn subscriber_count(&self) -> usize {
        self.registry.subscribed_len().await
    }

    /// Remove the socket file
    pub fn shutdown(&self) {
        if self.socket_path.exists() {
            let _ = std::fs::remove_file(&self.socket_path);
        }
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn read_requests(
    read_half: OwnedReadHalf,
    client_id: ClientId,
    registry: Arc<ClientRegistry>,
    inbox: mpsc::UnboundedSender<ServerMessage>,
) {
    let mut lines = BufReader::new(read_half).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!(client_id = %client_id, "Client disconnected (EOF)");
                break;
            }
            Err(e) => {
                debug!(client_id = %client_id, error = %e, "Read error");
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let request = match serde_json::from_str::<Request>(line) {
            Ok(request) => request,
            Err(e) => {
                warn!(client_id = %client_id, error = %e, "Undecodable request");
                let response = Response::error(
                    0,
                    ErrorInfo::new(ErrorCode::InvalidRequest, format!("invalid request: {}", e)),
                );
                if let Ok(json) = serde_json::to_string(&response) {
                    registry.queue(&client_id, json).await;
                }
                continue;
            }
        };

        // Flip the flag before the service answers so no event is missed
        match request.command {
            Command::SubscribeEvents => registry.set_subscribed(&client_id, true).await,
            Command::UnsubscribeEvents => registry.set_subscribed(&client_id, false).await,
            _ => {}
        }

        if inbox
            .send(ServerMessage::Request {
                client_id: client_id.clone(),
                request,
            })
            .is_err()
        {
            break;
        }
    }

    registry.remove(&client_id).await;
    let _ = inbox.send(ServerMessage::ClientDisconnected { client_id });
}

async fn write_outgoing(
    mut write_half: OwnedWriteHalf,
    client_id: ClientId,
    registry: Arc<ClientRegistry>,
    mut outgoing: mpsc::UnboundedReceiver<String>,
    mut events: broadcast::Receiver<Event>,
) {
    loop {
        let mut line = tokio::select! {
            queued = outgoing.recv() => match queued {
                Some(line) => line,
                None => break,
            },

            event = events.recv() => match event {
                Ok(event) => {
                    if !registry.is_subscribed(&client_id).await {
                        continue;
                    }
                    match serde_json::to_string(&event) {
                        Ok(json) => json,
                        Err(e) => {
                            warn!(error = %e, "Failed to encode event");
                            continue;
                        }
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(client_id = %client_id, skipped, "Slow subscriber, events dropped");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        };

        line.push('\n');
        if let Err(e) = write_half.write_all(line.as_bytes()).await {
            debug!(client_id = %client_id, error = %e, "Write error");
            break;
        }
    }
}

/// Peer UID of a Unix socket connection, via SO_PEERCRED
fn peer_uid(stream: &UnixStream) -> Option<u32> {
    use nix::sys::socket::{getsockopt, sockopt::PeerCredentials};
    use std::os::unix::io::AsFd;

    getsockopt(&stream.as_fd(), PeerCredentials)
        .ok()
        .map(|cred| cred.uid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IpcClient;
    use hostguard_api::{EventPayload, ResponsePayload, ResponseResult};
    use std::time::Duration;
    use tempfile::tempdir;
    use tokio::io::AsyncReadExt;

    async fn serve_pong(socket_path: &Path) -> Arc<IpcServer> {
        let mut server = IpcServer::new(socket_path);
        server.start().await.unwrap();
        let server = Arc::new(server);
        let mut inbox = server.take_message_receiver().await.unwrap();

        let accept = server.clone();
        tokio::spawn(async move {
            let _ = accept.run().await;
        });

        let responder = server.clone();
        tokio::spawn(async move {
            while let Some(msg) = inbox.recv().await {
                if let ServerMessage::Request { client_id, request } = msg {
                    let payload = match request.command {
                        Command::SubscribeEvents => ResponsePayload::Subscribed {
                            client_id: client_id.clone(),
                        },
                        _ => ResponsePayload::Pong,
                    };
                    let response = Response::success(request.request_id, payload);
                    let _ = responder.send_response(&client_id, response).await;
                }
            }
        });

        server
    }

    #[tokio::test]
    async fn test_socket_permissions() {
        let dir = tempdir().unwrap();
        let socket_path = dir.path().join("run").join("test.sock");

        let mut server = IpcServer::new(&socket_path);
        server.start().await.unwrap();

        let mode = std::fs::metadata(&socket_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o660);
    }

    #[tokio::test]
    async fn test_run_before_start_fails() {
        let server = IpcServer::new("/nonexistent/test.sock");
        assert!(matches!(server.run().await, Err(IpcError::NotListening)));
    }

    #[tokio::test]
    async fn test_request_ids_correlate() {
        let dir = tempdir().unwrap();
        let socket_path = dir.path().join("test.sock");
        let _server = serve_pong(&socket_path).await;

        let mut client = IpcClient::connect(&socket_path).await.unwrap();
        let first = client.send(Command::Ping).await.unwrap();
        let second = client.send(Command::GetStatus).await.unwrap();

        assert_eq!(first.request_id, 1);
        assert_eq!(second.request_id, 2);
        assert!(matches!(first.result, ResponseResult::Ok(ResponsePayload::Pong)));
    }

    #[tokio::test]
    async fn test_garbage_line_gets_invalid_request() {
        let dir = tempdir().unwrap();
        let socket_path = dir.path().join("test.sock");
        let _server = serve_pong(&socket_path).await;

        let mut stream = UnixStream::connect(&socket_path).await.unwrap();
        stream.write_all(b"this is not json\n").await.unwrap();

        let mut buf = vec![0u8; 1024];
        let n = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut buf))
            .await
            .unwrap()
            .unwrap();
        let response: Response = serde_json::from_slice(buf[..n].trim_ascii_end()).unwrap();

        match response.result {
            ResponseResult::Err(e) => assert_eq!(e.code, ErrorCode::InvalidRequest),
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_only_subscribers_get_events() {
        let dir = tempdir().unwrap();
        let socket_path = dir.path().join("test.sock");
        let server = serve_pong(&socket_path).await;

        let mut plain = IpcClient::connect(&socket_path).await.unwrap();
        plain.send(Command::Ping).await.unwrap();

        let mut events = IpcClient::connect(&socket_path)
            .await
            .unwrap()
            .subscribe()
            .await
            .unwrap();
        assert_eq!(server.subscriber_count().await, 1);
        assert_eq!(server.client_count().await, 2);

        server.broadcast_event(Event::new(EventPayload::Shutdown));

        let event = tokio::time::timeout(Duration::from_secs(5), events.next())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(event.payload, EventPayload::Shutdown));

        // The unsubscribed client still only sees its own responses
        let response = plain.send(Command::Ping).await.unwrap();
        assert_eq!(response.request_id, 2);
    }
}
