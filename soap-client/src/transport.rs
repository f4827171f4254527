//! Blocking HTTP transport: one connection per call

use std::io::{BufReader, ErrorKind};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::debug;

use crate::http::{HttpRequest, HttpResponse};
use crate::SoapError;

/// Connect and read timeouts applied to every call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportConfig {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(10),
        }
    }
}

/// Sends a request to the authority named by its `Host` header and reads
/// back the response. Status codes are not interpreted here.
#[derive(Debug, Clone, Default)]
pub struct HttpClient {
    config: TransportConfig,
}

impl HttpClient {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn post(&self, request: &HttpRequest) -> Result<HttpResponse, SoapError> {
        let authority = request
            .authority()
            .ok_or_else(|| SoapError::InvalidArgument("request has no Host header".to_string()))?;
        let stream = self.connect(authority)?;
        stream.set_read_timeout(Some(self.config.read_timeout))?;
        stream.set_write_timeout(Some(self.config.read_timeout))?;

        debug!(
            "{} {} -> {}",
            request.method(),
            request.uri(),
            authority
        );
        let mut writer = &stream;
        request.write_to(&mut writer).map_err(transport_error)?;

        let mut reader = BufReader::new(&stream);
        let response = HttpResponse::read_from(&mut reader).map_err(|e| match e {
            SoapError::Transport(msg) => SoapError::Transport(format!("{authority}: {msg}")),
            other => other,
        })?;
        debug!("{} <- {}", response.status(), authority);
        Ok(response)
    }

    fn connect(&self, authority: &str) -> Result<TcpStream, SoapError> {
        let addrs: Vec<SocketAddr> = authority
            .to_socket_addrs()
            .map_err(|e| SoapError::Transport(format!("cannot resolve {authority}: {e}")))?
            .collect();

        let mut last_error = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.config.connect_timeout) {
                Ok(stream) => return Ok(stream),
                Err(e) => last_error = Some(e),
            }
        }
        Err(match last_error {
            Some(e) => SoapError::Transport(format!("connect to {authority} failed: {}", describe(&e))),
            None => SoapError::Transport(format!("no address for {authority}")),
        })
    }
}

fn transport_error(e: std::io::Error) -> SoapError {
    SoapError::Transport(describe(&e))
}

fn describe(e: &std::io::Error) -> String {
    match e.kind() {
        ErrorKind::WouldBlock | ErrorKind::TimedOut => format!("timed out ({e})"),
        _ => e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{Status, HOST, POST};
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;
    use std::time::Instant;

    fn quick_client() -> HttpClient {
        HttpClient::new(TransportConfig {
            connect_timeout: Duration::from_millis(500),
            read_timeout: Duration::from_millis(300),
        })
    }

    fn request_to(addr: SocketAddr) -> HttpRequest {
        let mut request = HttpRequest::new(POST, "/ctl");
        request.set_header(HOST, addr.to_string());
        request.set_body("ping", true);
        request
    }

    #[test]
    fn test_post_reads_response() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            let mut buf = [0u8; 512];
            let n = socket.read(&mut buf).unwrap();
            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 4\r\n\r\npong")
                .unwrap();
            String::from_utf8_lossy(&buf[..n]).into_owned()
        });

        let response = quick_client().post(&request_to(addr)).unwrap();
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(response.body().as_deref(), Some("pong"));

        let received = server.join().unwrap();
        assert!(received.starts_with("POST /ctl HTTP/1.1\r\n"));
        assert!(received.ends_with("\r\n\r\nping"));
    }

    #[test]
    fn test_connection_refused_is_transport_error() {
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };
        let err = quick_client().post(&request_to(addr)).unwrap_err();
        assert!(matches!(err, SoapError::Transport(_)));
    }

    #[test]
    fn test_silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let started = Instant::now();
        let err = quick_client().post(&request_to(addr)).unwrap_err();
        assert!(matches!(err, SoapError::Transport(_)));
        assert!(started.elapsed() < Duration::from_secs(5));
        drop(listener);
    }

    #[test]
    fn test_missing_host_is_rejected() {
        let request = HttpRequest::new(POST, "/ctl");
        assert!(matches!(
            quick_client().post(&request),
            Err(SoapError::InvalidArgument(_))
        ));
    }
}
