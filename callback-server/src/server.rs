//! Blocking HTTP listener for UPnP event notifications.

use std::io::{BufReader, ErrorKind};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream, UdpSocket};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use soap_client::http::{HttpRequest, HttpResponse, Status, CLOSE, CONNECTION, CONTENT_LENGTH};
use soap_client::SoapError;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::notify::handle_request;
use crate::router::EventRouter;

/// How often the accept loop checks for shutdown while idle
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Connection handler threads per server
pub const MAX_CONNECTIONS: usize = 8;

/// Accepted connections waiting for a free handler; beyond this they get 503
pub const CONNECTION_BACKLOG: usize = 16;

const REJECT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("no available port in range {start}-{end}")]
    NoAvailablePort { start: u16, end: u16 },

    #[error("listener I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// HTTP callback server for receiving UPnP event notifications.
///
/// Binds the first free port of a range and accepts one connection per
/// notification. Connections are served by a fixed pool of
/// [`MAX_CONNECTIONS`] threads; once [`CONNECTION_BACKLOG`] more are waiting,
/// new ones are answered `503 Service Unavailable`. Accepted events go
/// through the [`EventRouter`]. Dropping the server stops it.
///
/// ```no_run
/// use std::time::Duration;
/// use crossbeam::channel::unbounded;
/// use callback_server::{CallbackServer, EventRouter};
///
/// let (tx, rx) = unbounded();
/// let router = EventRouter::new(tx, |_sid| true);
/// let server = CallbackServer::bind((3400, 3500), Duration::from_secs(5), router)?;
/// println!("listening on port {}", server.port());
///
/// for notification in rx.iter() {
///     println!("{}: {:?}", notification.subscription_id, notification.properties);
/// }
/// # Ok::<(), callback_server::ServerError>(())
/// ```
#[derive(Debug)]
pub struct CallbackServer {
    port: u16,
    shutdown_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl CallbackServer {
    /// Bind within `port_range` (inclusive) and start accepting.
    ///
    /// The range `(0, 0)` binds an ephemeral port. `read_timeout` bounds how
    /// long a connection may take to deliver its request.
    pub fn bind(
        port_range: (u16, u16),
        read_timeout: Duration,
        router: EventRouter,
    ) -> Result<Self, ServerError> {
        let (start, end) = port_range;
        let listener = (start..=end)
            .find_map(|port| {
                TcpListener::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port)).ok()
            })
            .ok_or(ServerError::NoAvailablePort { start, end })?;
        listener.set_nonblocking(true)?;
        let port = listener.local_addr()?.port();

        let (conn_tx, conn_rx) = bounded::<(TcpStream, SocketAddr)>(CONNECTION_BACKLOG);
        for id in 0..MAX_CONNECTIONS {
            spawn_handler(id, conn_rx.clone(), read_timeout, router.clone())?;
        }
        drop(conn_rx);

        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
        let handle = thread::Builder::new()
            .name(format!("upnp-callback-{port}"))
            .spawn(move || {
                info!("callback server listening on port {}", port);
                loop {
                    match listener.accept() {
                        Ok(connection) => match conn_tx.try_send(connection) {
                            Ok(()) => {}
                            Err(TrySendError::Full((stream, peer))) => {
                                warn!("all callback handlers busy, rejecting {}", peer);
                                reject_busy(stream);
                            }
                            Err(TrySendError::Disconnected(_)) => {
                                error!("callback handlers gone, stopping listener");
                                break;
                            }
                        },
                        Err(e) => {
                            if e.kind() != ErrorKind::WouldBlock {
                                warn!("accept failed: {}", e);
                            }
                            match shutdown_rx.recv_timeout(ACCEPT_POLL_INTERVAL) {
                                Err(RecvTimeoutError::Timeout) => {}
                                _ => break,
                            }
                        }
                    }
                }
                info!("callback server on port {} stopped", port);
            })?;

        Ok(Self {
            port,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// The port the server is bound to
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Callback URL advertised to devices, as `http://host:port/`
    pub fn callback_url(&self, host: IpAddr) -> String {
        format!("http://{}/", SocketAddr::new(host, self.port))
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop accepting and release the port; returns once the accept loop
    /// has exited
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for CallbackServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Handler threads exit once the accept loop drops its sender
fn spawn_handler(
    id: usize,
    connections: Receiver<(TcpStream, SocketAddr)>,
    read_timeout: Duration,
    router: EventRouter,
) -> std::io::Result<()> {
    thread::Builder::new()
        .name(format!("upnp-callback-conn-{id}"))
        .spawn(move || {
            for (stream, peer) in connections.iter() {
                if let Err(e) = serve_connection(stream, read_timeout, &router) {
                    debug!("connection from {} dropped: {}", peer, e);
                }
            }
        })?;
    Ok(())
}

fn reject_busy(stream: TcpStream) {
    let mut response = HttpResponse::new(Status::ServiceUnavailable);
    response.set_header(CONTENT_LENGTH, "0");
    response.set_header(CONNECTION, CLOSE);
    let written = stream
        .set_nonblocking(false)
        .and_then(|_| stream.set_write_timeout(Some(REJECT_WRITE_TIMEOUT)))
        .and_then(|_| response.write_to(&mut &stream));
    if let Err(e) = written {
        debug!("cannot send 503: {}", e);
    }
}

fn serve_connection(
    stream: TcpStream,
    read_timeout: Duration,
    router: &EventRouter,
) -> Result<(), SoapError> {
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(read_timeout))?;
    stream.set_write_timeout(Some(read_timeout))?;

    let response = match HttpRequest::read_from(&mut BufReader::new(&stream)) {
        Ok(request) => handle_request(&request, router),
        Err(SoapError::Parse(msg)) => {
            warn!("malformed callback request: {}", msg);
            let mut response = HttpResponse::new(Status::BadRequest);
            response.set_header(CONTENT_LENGTH, "0");
            response
        }
        Err(e) => return Err(e),
    };
    let mut writer = &stream;
    response.write_to(&mut writer)?;
    Ok(())
}

/// Local interface address that routes towards `target`.
///
/// Uses a connected UDP socket; nothing is sent.
pub fn local_ip_for(target: IpAddr) -> Option<IpAddr> {
    let bind_addr: SocketAddr = match target {
        IpAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        IpAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
    };
    let socket = UdpSocket::bind(bind_addr).ok()?;
    socket.connect((target, 1900)).ok()?;
    let ip = socket.local_addr().ok()?.ip();
    (!ip.is_unspecified()).then_some(ip)
}
