use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;

use super::Transport;
use crate::error::{TraceError, TraceResult};
use crate::http;

/// Largest UDP packet the agent accepts.
pub(crate) const DEFAULT_UDP_MAX_PACKET_SIZE: usize = 65_000;
/// Largest batch posted to the collector.
pub(crate) const DEFAULT_HTTP_MAX_PACKET_SIZE: usize = 1024 * 1024;

/// Sends each batch as one UDP datagram to the agent.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    agent: SocketAddr,
    max_packet_size: usize,
}

impl UdpTransport {
    /// Create a transport for the agent at `host_port`, e.g. `127.0.0.1:6831`.
    pub fn new(host_port: &str) -> TraceResult<Self> {
        Self::with_max_packet_size(host_port, DEFAULT_UDP_MAX_PACKET_SIZE)
    }

    /// Create a transport whose batches are at most `max_packet_size` bytes.
    /// Zero selects the default of 65000 bytes.
    pub fn with_max_packet_size(host_port: &str, max_packet_size: usize) -> TraceResult<Self> {
        let agent = host_port
            .to_socket_addrs()
            .map_err(|err| TraceError::Config(format!("invalid agent address {host_port}: {err}")))?
            .next()
            .ok_or_else(|| TraceError::Config(format!("agent address {host_port} did not resolve")))?;
        let local: SocketAddr = if agent.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(local)?;
        socket.connect(agent)?;
        let max_packet_size = if max_packet_size == 0 {
            DEFAULT_UDP_MAX_PACKET_SIZE
        } else {
            max_packet_size
        };
        Ok(UdpTransport {
            socket,
            agent,
            max_packet_size,
        })
    }

    /// The agent's address.
    pub fn agent_addr(&self) -> SocketAddr {
        self.agent
    }
}

impl Transport for UdpTransport {
    fn max_packet_size(&self) -> usize {
        self.max_packet_size
    }

    fn emit_batch(&mut self, batch: &[u8]) -> TraceResult<()> {
        if batch.len() > self.max_packet_size {
            return Err(TraceError::Other(
                format!(
                    "batch of {} bytes does not fit in one UDP packet of {} bytes",
                    batch.len(),
                    self.max_packet_size
                )
                .into(),
            ));
        }
        let written = self.socket.send(batch)?;
        if written != batch.len() {
            return Err(TraceError::Other(
                format!("wrote {written} of {} bytes", batch.len()).into(),
            ));
        }
        Ok(())
    }
}

/// Posts each batch to the collector's HTTP endpoint.
#[derive(Debug)]
pub struct HttpTransport {
    endpoint: String,
    client: Client,
    max_packet_size: usize,
}

impl HttpTransport {
    /// Create a transport posting to `endpoint`, e.g.
    /// `http://collector:14268/api/traces`.
    pub fn new(endpoint: impl Into<String>) -> TraceResult<Self> {
        let endpoint = endpoint.into();
        url::Url::parse(&endpoint)
            .map_err(|err| TraceError::Config(format!("invalid collector endpoint {endpoint}: {err}")))?;
        Ok(HttpTransport {
            endpoint,
            client: http::build_client(http::DEFAULT_REQUEST_TIMEOUT)?,
            max_packet_size: DEFAULT_HTTP_MAX_PACKET_SIZE,
        })
    }
}

impl Transport for HttpTransport {
    fn max_packet_size(&self) -> usize {
        self.max_packet_size
    }

    fn emit_batch(&mut self, batch: &[u8]) -> TraceResult<()> {
        let query_error = |message: String| TraceError::RemoteQuery {
            endpoint: self.endpoint.clone(),
            message,
        };
        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .body(batch.to_vec())
            .send()
            .map_err(|err| query_error(err.to_string()))?;
        if !response.status().is_success() {
            return Err(query_error(format!("received HTTP status {}", response.status())));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn udp_transport_sends_datagrams() {
        let agent = UdpSocket::bind("127.0.0.1:0").unwrap();
        agent.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        let address = agent.local_addr().unwrap().to_string();

        let mut transport = UdpTransport::new(&address).unwrap();
        assert_eq!(transport.max_packet_size(), DEFAULT_UDP_MAX_PACKET_SIZE);
        transport.emit_batch(b"{\"spans\":[]}").unwrap();

        let mut buf = [0u8; 64];
        let received = agent.recv(&mut buf).unwrap();
        assert_eq!(&buf[..received], b"{\"spans\":[]}");
    }

    #[test]
    fn udp_transport_rejects_oversized_batches() {
        let agent = UdpSocket::bind("127.0.0.1:0").unwrap();
        let address = agent.local_addr().unwrap().to_string();
        let mut transport = UdpTransport::with_max_packet_size(&address, 4).unwrap();
        assert!(transport.emit_batch(b"too large").is_err());
    }

    #[test]
    fn rejects_invalid_addresses() {
        assert!(matches!(UdpTransport::new("not an address"), Err(TraceError::Config(_))));
        assert!(matches!(HttpTransport::new("not a url"), Err(TraceError::Config(_))));
    }
}
