//! Line-delimited JSON over TCP.
//!
//! Every connection gets a player identity and two tasks: a read pump that
//! parses one [`Request`] per line and hands it to the hub, and a write
//! pump that drains the player's mailbox and writes one [`Notification`]
//! per line. The hub and the matches never see the socket.

use log::{debug, error, info, warn};
use shared::{Notification, Request};
use std::net::SocketAddr;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};

use crate::hub::{HubCommand, HubHandle};
use crate::mailbox::{mailbox, Mailbox};

/// Accepts connections and wires each one to the hub.
pub struct Server {
    listener: TcpListener,
    hub: HubHandle,
    send_buffer: usize,
}

impl Server {
    pub async fn bind(
        addr: &str,
        hub: HubHandle,
        send_buffer: usize,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(addr).await?;
        info!("Server listening on {}", listener.local_addr()?);
        Ok(Server {
            listener,
            hub,
            send_buffer,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept loop. Only returns on a listener failure.
    pub async fn run(self) -> std::io::Result<()> {
        loop {
            let (stream, peer) = self.listener.accept().await?;
            let hub = self.hub.clone();
            let send_buffer = self.send_buffer;
            tokio::spawn(async move {
                serve_connection(stream, peer, hub, send_buffer).await;
            });
        }
    }
}

async fn serve_connection(stream: TcpStream, peer: SocketAddr, hub: HubHandle, send_buffer: usize) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!("Could not disable Nagle for {}: {}", peer, e);
    }
    let (reader, writer) = stream.into_split();
    let (address, outbox) = mailbox(send_buffer);
    let player = hub.new_player(address);
    let uuid = player.uuid().to_string();
    info!("Connection from {} is player {}", peer, uuid);

    let writer_task = tokio::spawn(write_pump(writer, outbox, uuid.clone()));
    if hub.notify(HubCommand::Register { player }).await.is_err() {
        error!("Hub is gone, closing connection from {}", peer);
        writer_task.abort();
        return;
    }

    read_pump(reader, &hub, &uuid).await;

    if hub
        .notify(HubCommand::Unregister { uuid: uuid.clone() })
        .await
        .is_err()
    {
        warn!("Hub is gone, could not unregister {}", uuid);
    }
    writer_task.abort();
}

async fn read_pump(reader: OwnedReadHalf, hub: &HubHandle, uuid: &str) {
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                match Request::from_line(&line) {
                    Ok(request) => {
                        let command = HubCommand::Request {
                            uuid: uuid.to_string(),
                            request,
                        };
                        if hub.notify(command).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => warn!("Dropping malformed request from {}: {}", uuid, e),
                }
            }
            Ok(None) => {
                info!("Player {} closed the connection", uuid);
                return;
            }
            Err(e) => {
                warn!("Read error from {}: {}", uuid, e);
                return;
            }
        }
    }
}

async fn write_pump(mut writer: OwnedWriteHalf, mut outbox: Mailbox<Notification>, uuid: String) {
    while let Some(notification) = outbox.recv().await {
        let line = match notification.to_line() {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to encode notification for {}: {}", uuid, e);
                continue;
            }
        };
        if let Err(e) = writer.write_all(line.as_bytes()).await {
            debug!("Write to {} failed: {}", uuid, e);
            break;
        }
    }
}
