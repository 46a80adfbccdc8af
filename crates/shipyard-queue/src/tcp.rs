//! TCP transport between app writers and a worker process.
//!
//! Each message is one line of JSON. Producers open a short connection per
//! publish; the listener merges every connection into one [`Subscription`].

use std::io::Write;
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream as AsyncTcpStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{QueueError, QueueResult};
use crate::message::Message;
use crate::transport::{Dialer, Publisher, Subscription};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Dials queue servers over blocking TCP.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpDialer;

impl Dialer for TcpDialer {
    fn dial(&self, address: &str) -> QueueResult<Box<dyn Publisher>> {
        let connect = |addr: &SocketAddr| TcpStream::connect_timeout(addr, CONNECT_TIMEOUT);
        let addrs = std::net::ToSocketAddrs::to_socket_addrs(address).map_err(|e| {
            warn!(address, error = %e, "queue address did not resolve");
            QueueError::Connect(address.to_string())
        })?;
        let mut last_err = None;
        for addr in addrs {
            match connect(&addr) {
                Ok(stream) => {
                    debug!(address, %addr, "queue connection opened");
                    return Ok(Box::new(TcpPublisher { stream }));
                }
                Err(e) => last_err = Some(e),
            }
        }
        if let Some(e) = last_err {
            warn!(address, error = %e, "queue connection failed");
        }
        Err(QueueError::Connect(address.to_string()))
    }
}

struct TcpPublisher {
    stream: TcpStream,
}

impl Publisher for TcpPublisher {
    fn publish(&self, msg: &Message) -> QueueResult<()> {
        let mut line = msg.encode()?;
        line.push(b'\n');
        (&self.stream)
            .write_all(&line)
            .and_then(|()| (&self.stream).flush())
            .map_err(|e| QueueError::Publish(e.to_string()))
    }
}

/// Accept producers on `address` and feed their messages into one
/// subscription. Returns the bound address, which differs from `address`
/// when it asks for port 0.
///
/// The accept loop stops once the subscription is dropped.
pub async fn listen(address: &str) -> QueueResult<(SocketAddr, Subscription)> {
    let listener = TcpListener::bind(address).await.map_err(|e| {
        warn!(address, error = %e, "queue bind failed");
        QueueError::Listen(address.to_string())
    })?;
    let local = listener
        .local_addr()
        .map_err(|_| QueueError::Listen(address.to_string()))?;
    info!(addr = %local, "queue listening");

    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(accept_loop(listener, tx));
    Ok((local, Subscription::new(rx)))
}

async fn accept_loop(listener: TcpListener, tx: mpsc::UnboundedSender<Vec<u8>>) {
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!(%peer, "queue producer connected");
                    tokio::spawn(read_lines(stream, tx.clone()));
                }
                Err(e) => warn!(error = %e, "queue accept failed"),
            },
            _ = tx.closed() => {
                debug!("subscription dropped, queue listener stopping");
                break;
            }
        }
    }
}

async fn read_lines(stream: AsyncTcpStream, tx: mpsc::UnboundedSender<Vec<u8>>) {
    let mut lines = BufReader::new(stream).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => {}
            Ok(Some(line)) => {
                if tx.send(line.into_bytes()).is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "queue connection read failed");
                break;
            }
        }
    }
}
