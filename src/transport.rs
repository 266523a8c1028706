// transport.rs - the client-side UDP exchange loop.
//
// A bare-bones request/response correlator: send, wait up to the socket
// timeout, retry on timeout only. Framing and authenticator failures are
// never retried - they mean the reply we got doesn't belong to us.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::packet::{Packet, MAX_PACKET_LEN};

/// Where to send requests and how long to wait for replies.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub server_addr: SocketAddr,
    pub retry_count: u32,
    pub socket_timeout_ms: u64,
}

impl TransportConfig {
    pub fn new(server_addr: SocketAddr) -> Self {
        Self {
            server_addr,
            retry_count: 3,
            socket_timeout_ms: 2000,
        }
    }
}

/// A client-side RADIUS UDP transport bound to one server endpoint.
///
/// One socket per `RadiusClient`; callers wanting concurrent exchanges to
/// different servers construct multiple clients.
pub struct RadiusClient {
    socket: UdpSocket,
    config: TransportConfig,
}

impl RadiusClient {
    /// Binds an ephemeral local UDP socket for talking to `config.server_addr`.
    pub async fn connect(config: TransportConfig) -> Result<Self> {
        let bind_addr: SocketAddr = if config.server_addr.is_ipv6() {
            "[::]:0".parse().unwrap()
        } else {
            "0.0.0.0:0".parse().unwrap()
        };
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(config.server_addr).await?;
        Ok(Self { socket, config })
    }

    /// Sends `packet` (already authenticator-signed) and waits for a reply
    /// whose identifier matches, retrying up to `retry_count` times on
    /// timeout. A reply with a mismatched identifier does not consume a
    /// retry or trigger a retransmission - it isn't an answer to this
    /// request, so we keep listening within the same timeout window in case
    /// the real reply is still in flight. The caller is responsible for
    /// authenticator verification of the returned packet - this only
    /// correlates identifiers.
    pub async fn send(&self, packet: &Packet) -> Result<Packet> {
        let encoded = packet.encode()?;
        let window = Duration::from_millis(self.config.socket_timeout_ms);
        let mut attempts = 0;
        let mut buf = vec![0u8; MAX_PACKET_LEN];

        loop {
            attempts += 1;
            debug!(identifier = packet.identifier, attempt = attempts, "sending RADIUS request");
            self.socket.send(&encoded).await?;

            let deadline = time::Instant::now() + window;
            loop {
                match time::timeout_at(deadline, self.socket.recv(&mut buf)).await {
                    Ok(Ok(n)) => {
                        let reply = Packet::decode(&buf[..n])?;
                        if reply.identifier != packet.identifier {
                            warn!(
                                expected = packet.identifier,
                                got = reply.identifier,
                                "dropping reply with mismatched identifier, still waiting on this window"
                            );
                            continue;
                        }
                        return Ok(reply);
                    }
                    Ok(Err(io_err)) => return Err(Error::Io(io_err)),
                    Err(_elapsed) => break,
                }
            }

            if attempts > self.config.retry_count {
                return Err(Error::TransportTimeout { attempts });
            }
            warn!(attempt = attempts, "RADIUS request timed out, retrying");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::Attribute;
    use crate::authenticator;
    use crate::dictionary::STANDARD_VENDOR;
    use crate::packet::PacketCode;
    use tokio::net::UdpSocket as TokioUdpSocket;

    async fn spawn_echo_server(reply_code: u8, secret: &'static [u8]) -> SocketAddr {
        let socket = TokioUdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        tokio::spawn(async move {
            let mut buf = vec![0u8; MAX_PACKET_LEN];
            loop {
                let (n, peer) = match socket.recv_from(&mut buf).await {
                    Ok(v) => v,
                    Err(_) => return,
                };
                let request = match Packet::decode(&buf[..n]) {
                    Ok(p) => p,
                    Err(_) => continue,
                };
                let mut response = request.create_response(reply_code);
                authenticator::sign_response(&mut response, &request.authenticator, secret).unwrap();
                let encoded = response.encode().unwrap();
                let _ = socket.send_to(&encoded, peer).await;
            }
        });
        addr
    }

    #[tokio::test]
    async fn send_receives_matching_reply() {
        let secret: &'static [u8] = b"xyzzy5461";
        let addr = spawn_echo_server(PacketCode::AccessAccept.as_u8(), secret).await;

        let client = RadiusClient::connect(TransportConfig::new(addr)).await.unwrap();
        let mut request = Packet::outbound(PacketCode::AccessRequest.as_u8());
        authenticator::sign_access_request(&mut request, secret);
        request.add_attribute(Attribute::raw(1, STANDARD_VENDOR, b"nemo".to_vec()));

        let reply = client.send(&request).await.unwrap();
        assert_eq!(reply.identifier, request.identifier);
        authenticator::verify_response(&reply, &request.authenticator, secret).unwrap();
    }

    #[tokio::test]
    async fn send_times_out_with_no_server() {
        let addr: SocketAddr = "127.0.0.1:1".parse().unwrap();
        let mut config = TransportConfig::new(addr);
        config.socket_timeout_ms = 50;
        config.retry_count = 1;
        let client = RadiusClient::connect(config).await.unwrap();
        let request = Packet::outbound(PacketCode::AccessRequest.as_u8());

        let err = client.send(&request).await.unwrap_err();
        assert!(matches!(err, Error::TransportTimeout { .. } | Error::Io(_)));
    }
}
