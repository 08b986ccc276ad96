//! # UDP Transport
//!
//! Every exchange opens its own socket, paces, sends one datagram, waits for
//! one answer and drops the socket again, so no socket outlives an exchange.
//!
//! Binding walks upwards from the configured local port until a port is free
//! or the protocol's port ceiling is reached. Binding goes through the
//! [`SocketBinder`] trait so the fallback can be exercised without occupying
//! real ports.

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use async_trait::async_trait;
use log::debug;
use tokio::net::{lookup_host, UdpSocket};
use tokio::sync::watch;

use crate::config::Options;
use crate::constants::DEFAULT_LOCAL_ADDRESS;
use crate::error::PbmError;
use crate::logging::log_frame;
use crate::transport::{Transport, TransportConfig};

/// The operations the transport needs from a bound datagram socket.
#[async_trait]
pub trait DatagramSocket: Send + Sync {
    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> io::Result<usize>;
    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;
}

/// Opens datagram sockets on a given local address.
#[async_trait]
pub trait SocketBinder: Send + Sync {
    type Socket: DatagramSocket;

    async fn bind(&self, addr: SocketAddr) -> io::Result<Self::Socket>;
}

#[async_trait]
impl DatagramSocket for UdpSocket {
    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> io::Result<usize> {
        UdpSocket::send_to(self, buf, target).await
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        UdpSocket::recv_from(self, buf).await
    }
}

/// Binds real tokio UDP sockets.
///
/// `UdpSocket::bind` never sets `SO_REUSEADDR`, so a port held by another
/// process is reported as busy instead of being shared.
#[derive(Debug, Default, Clone, Copy)]
pub struct UdpBinder;

#[async_trait]
impl SocketBinder for UdpBinder {
    type Socket = UdpSocket;

    async fn bind(&self, addr: SocketAddr) -> io::Result<UdpSocket> {
        let socket = UdpSocket::bind(addr).await?;
        socket.set_broadcast(false)?;
        Ok(socket)
    }
}

/// Binds the first free port in `start..=ceiling` and returns the socket
/// together with the port it was bound to.
pub async fn bind_local_port<B: SocketBinder>(
    binder: &B,
    ip: IpAddr,
    start: u16,
    ceiling: u16,
) -> Result<(B::Socket, u16), PbmError> {
    let mut port = start;
    loop {
        match binder.bind(SocketAddr::new(ip, port)).await {
            Ok(socket) => {
                if port != start {
                    debug!("Local port {start} unavailable, bound {port} instead");
                }
                return Ok((socket, port));
            }
            Err(e) => {
                if port >= ceiling {
                    return Err(PbmError::UnableToBindLocalPort {
                        first: start,
                        last: port,
                    });
                }
                debug!("Unable to bind local port {port}: {e}");
                port += 1;
            }
        }
    }
}

/// Resolves the local address to bind to. `Options` already mapped the
/// loopback spellings to the wildcard address.
async fn resolve_local_ip(address: &str) -> Result<IpAddr, PbmError> {
    if address == DEFAULT_LOCAL_ADDRESS {
        return Ok(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    }
    if let Ok(ip) = address.parse::<IpAddr>() {
        return Ok(ip);
    }
    lookup_host((address, 0))
        .await
        .ok()
        .and_then(|mut addrs| addrs.next())
        .map(|addr| addr.ip())
        .ok_or_else(|| PbmError::UnknownLocalHost(address.to_string()))
}

async fn resolve_remote(address: &str, port: u16) -> Result<SocketAddr, PbmError> {
    lookup_host((address, port))
        .await
        .ok()
        .and_then(|mut addrs| addrs.next())
        .ok_or_else(|| PbmError::UnknownRemoteHost(format!("{address}:{port}")))
}

/// Resolves to `true` once shutdown is requested, and never resolves if the
/// sender is dropped without requesting it.
pub(crate) async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) -> bool {
    loop {
        if *shutdown.borrow_and_update() {
            return true;
        }
        if shutdown.changed().await.is_err() {
            return false;
        }
    }
}

/// UDP session with a single controller.
pub struct UdpTransport<B: SocketBinder = UdpBinder> {
    options: Options,
    config: TransportConfig,
    binder: B,
    /// Port to try first; the last port that bound successfully.
    next_port: u16,
    shutdown: Option<watch::Receiver<bool>>,
}

impl UdpTransport<UdpBinder> {
    pub fn new(options: Options, config: TransportConfig) -> Self {
        Self::with_binder(options, config, UdpBinder)
    }
}

impl<B: SocketBinder> UdpTransport<B> {
    pub fn with_binder(options: Options, config: TransportConfig, binder: B) -> Self {
        let next_port = options.local_port();
        UdpTransport {
            options,
            config,
            binder,
            next_port,
            shutdown: None,
        }
    }

    /// Lets a shutdown request cut the pacing delay short.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Local port the next exchange starts binding at.
    pub fn local_port(&self) -> u16 {
        self.next_port
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    async fn pace(&mut self) -> Result<(), PbmError> {
        let delay = self.config.pacing_delay;
        match self.shutdown.as_mut() {
            Some(shutdown) => {
                if *shutdown.borrow() {
                    return Err(PbmError::SleepInterrupted);
                }
                tokio::select! {
                    _ = tokio::time::sleep(delay) => Ok(()),
                    true = shutdown_requested(shutdown) => Err(PbmError::SleepInterrupted),
                }
            }
            None => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
        }
    }
}

#[async_trait]
impl<B: SocketBinder> Transport for UdpTransport<B> {
    async fn exchange(&mut self, request: &[u8]) -> Result<Vec<u8>, PbmError> {
        self.pace().await?;

        let local_ip = resolve_local_ip(self.options.local_address()).await?;
        let (socket, port) = bind_local_port(
            &self.binder,
            local_ip,
            self.next_port,
            self.config.local_port_ceiling,
        )
        .await?;
        self.next_port = port;

        let remote =
            resolve_remote(self.options.remote_address(), self.options.remote_port()).await?;

        log_frame("Request", request);
        socket
            .send_to(request, remote)
            .await
            .map_err(|e| PbmError::ErrorSending(e.to_string()))?;

        let mut buf = vec![0u8; self.config.receive_buffer_size];
        let received =
            tokio::time::timeout(self.config.receive_timeout, socket.recv_from(&mut buf)).await;
        let (len, sender) = match received {
            Err(_) => return Err(PbmError::Timeout),
            Ok(Err(e))
                if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) =>
            {
                return Err(PbmError::Timeout)
            }
            Ok(Err(e)) => return Err(PbmError::ErrorReceiving(e.to_string())),
            Ok(Ok(received)) => received,
        };

        debug!("Received {len} bytes from {sender} on local port {port}");
        buf.truncate(len);
        log_frame("Response", &buf);
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ProtocolId;
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Socket that is never used for traffic.
    struct IdleSocket;

    #[async_trait]
    impl DatagramSocket for IdleSocket {
        async fn send_to(&self, buf: &[u8], _target: SocketAddr) -> io::Result<usize> {
            Ok(buf.len())
        }

        async fn recv_from(&self, _buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
            std::future::pending().await
        }
    }

    /// Reports a fixed set of ports as in use and records every attempt.
    #[derive(Default)]
    struct BusyPorts {
        busy: HashSet<u16>,
        attempts: Mutex<Vec<u16>>,
    }

    impl BusyPorts {
        fn new(busy: impl IntoIterator<Item = u16>) -> Self {
            BusyPorts {
                busy: busy.into_iter().collect(),
                attempts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SocketBinder for BusyPorts {
        type Socket = IdleSocket;

        async fn bind(&self, addr: SocketAddr) -> io::Result<IdleSocket> {
            self.attempts.lock().unwrap().push(addr.port());
            if self.busy.contains(&addr.port()) {
                Err(io::Error::new(io::ErrorKind::AddrInUse, "in use"))
            } else {
                Ok(IdleSocket)
            }
        }
    }

    fn any_ip() -> IpAddr {
        IpAddr::V4(Ipv4Addr::UNSPECIFIED)
    }

    fn options(local_port: u16, remote_port: u16) -> Options {
        Options::new(
            "127.0.0.1",
            local_port,
            "127.0.0.1",
            remote_port,
            ProtocolId::NbeV13_1005,
            "12345",
            "",
        )
        .unwrap()
    }

    /// Binds sockets whose sends always fail.
    struct Unreachable;

    struct UnreachableSocket;

    #[async_trait]
    impl DatagramSocket for UnreachableSocket {
        async fn send_to(&self, _buf: &[u8], _target: SocketAddr) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::NetworkUnreachable, "network is unreachable"))
        }

        async fn recv_from(&self, _buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
            std::future::pending().await
        }
    }

    #[async_trait]
    impl SocketBinder for Unreachable {
        type Socket = UnreachableSocket;

        async fn bind(&self, _addr: SocketAddr) -> io::Result<UnreachableSocket> {
            Ok(UnreachableSocket)
        }
    }

    fn quick() -> TransportConfig {
        TransportConfig {
            pacing_delay: Duration::ZERO,
            receive_timeout: Duration::from_millis(20),
            ..TransportConfig::default()
        }
    }

    fn addressed(local: &str, remote: &str) -> Options {
        Options::new(local, 8483, remote, 8483, ProtocolId::NbeV13_1005, "12345", "").unwrap()
    }

    #[tokio::test]
    async fn test_port_fallback_skips_busy_ports() {
        let binder = BusyPorts::new(8483..=8485);
        let (_socket, port) = bind_local_port(&binder, any_ip(), 8483, 9999).await.unwrap();
        assert_eq!(port, 8486);
        assert_eq!(*binder.attempts.lock().unwrap(), vec![8483, 8484, 8485, 8486]);
    }

    #[tokio::test]
    async fn test_port_fallback_stops_at_ceiling() {
        let binder = BusyPorts::new(9990..=9999);
        let err = bind_local_port(&binder, any_ip(), 9990, 9999).await.err().unwrap();
        assert_eq!(
            err,
            PbmError::UnableToBindLocalPort {
                first: 9990,
                last: 9999
            }
        );
        assert_eq!(binder.attempts.lock().unwrap().len(), 10);
    }

    #[tokio::test]
    async fn test_port_above_ceiling_is_tried_once() {
        let binder = BusyPorts::new([12000]);
        let err = bind_local_port(&binder, any_ip(), 12000, 9999).await.err().unwrap();
        assert_eq!(err.kind(), crate::error::ErrorKind::UnableToBindLocalPort);
        assert_eq!(*binder.attempts.lock().unwrap(), vec![12000]);
    }

    #[tokio::test]
    async fn test_transport_remembers_bound_port() {
        let binder = Arc::new(BusyPorts::new(8483..=8484));
        let config = TransportConfig {
            pacing_delay: Duration::ZERO,
            receive_timeout: Duration::from_millis(20),
            ..TransportConfig::default()
        };

        struct Shared(Arc<BusyPorts>);

        #[async_trait]
        impl SocketBinder for Shared {
            type Socket = IdleSocket;

            async fn bind(&self, addr: SocketAddr) -> io::Result<IdleSocket> {
                self.0.bind(addr).await
            }
        }

        let mut transport =
            UdpTransport::with_binder(options(8483, 8483), config, Shared(binder.clone()));
        let err = transport.exchange(b"ping").await.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(transport.local_port(), 8485);

        transport.exchange(b"ping").await.unwrap_err();
        assert_eq!(*binder.attempts.lock().unwrap(), vec![8483, 8484, 8485, 8485]);
    }

    #[tokio::test]
    async fn test_loopback_exchange() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let server_port = server.local_addr().unwrap().port();
        tokio::spawn(async move {
            let mut buf = [0u8; 64];
            let (len, peer) = server.recv_from(&mut buf).await.unwrap();
            let mut answer = b"echo:".to_vec();
            answer.extend_from_slice(&buf[..len]);
            server.send_to(&answer, peer).await.unwrap();
        });

        let config = TransportConfig {
            pacing_delay: Duration::ZERO,
            local_port_ceiling: u16::MAX,
            ..TransportConfig::default()
        };
        let mut transport = UdpTransport::new(options(41483, server_port), config);
        let response = transport.exchange(b"hello").await.unwrap();
        assert_eq!(response, b"echo:hello".to_vec());
    }

    #[tokio::test]
    async fn test_silent_remote_times_out() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let server_port = server.local_addr().unwrap().port();

        let config = TransportConfig {
            pacing_delay: Duration::ZERO,
            receive_timeout: Duration::from_millis(50),
            local_port_ceiling: u16::MAX,
            ..TransportConfig::default()
        };
        let mut transport = UdpTransport::new(options(42483, server_port), config);
        assert_eq!(transport.exchange(b"hello").await.unwrap_err(), PbmError::Timeout);
        drop(server);
    }

    #[tokio::test]
    async fn test_unknown_remote_host() {
        let mut transport = UdpTransport::with_binder(
            addressed("", "no.such.host.invalid"),
            quick(),
            BusyPorts::default(),
        );
        let err = transport.exchange(b"ping").await.unwrap_err();
        assert_eq!(err, PbmError::UnknownRemoteHost("no.such.host.invalid:8483".into()));
    }

    #[tokio::test]
    async fn test_unknown_local_host() {
        let binder = BusyPorts::default();
        let mut transport = UdpTransport::with_binder(
            addressed("no.such.host.invalid", "127.0.0.1"),
            quick(),
            binder,
        );
        let err = transport.exchange(b"ping").await.unwrap_err();
        assert_eq!(err, PbmError::UnknownLocalHost("no.such.host.invalid".into()));
    }

    #[tokio::test]
    async fn test_send_failure_is_error_sending() {
        let mut transport =
            UdpTransport::with_binder(addressed("", "127.0.0.1"), quick(), Unreachable);
        let err = transport.exchange(b"ping").await.unwrap_err();
        assert!(matches!(err, PbmError::ErrorSending(reason) if reason.contains("unreachable")));
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_pacing() {
        let (tx, rx) = watch::channel(false);
        let config = TransportConfig {
            pacing_delay: Duration::from_secs(3600),
            ..TransportConfig::default()
        };
        let mut transport = UdpTransport::with_binder(
            options(8483, 8483),
            config,
            BusyPorts::default(),
        )
        .with_shutdown(rx);

        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            tx.send(true).unwrap();
            tx
        });
        let err = transport.exchange(b"ping").await.unwrap_err();
        assert_eq!(err, PbmError::SleepInterrupted);
        let _tx = stopper.await.unwrap();

        // Already requested: fails before sleeping at all
        let err = transport.exchange(b"ping").await.unwrap_err();
        assert_eq!(err, PbmError::SleepInterrupted);
    }
}
