//! TCP transport
//!
//! Framing: one JSON command per line out, one JSON reply per line back,
//! UTF-8 only. Connect, read and write are each bounded by a timeout; a
//! read that runs out of time is an `OperationTimeout`.

use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use super::command::{AdminCommand, CommandReply};
use super::errors::{ConnectorError, ConnectorResult};
use super::{connect_replica_set, AdminSession, ClusterConnector, ConnectTarget};

/// Timeouts applied to every session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectorSettings {
    pub connect_timeout: Duration,
    pub op_timeout: Duration,
}

impl Default for ConnectorSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            op_timeout: Duration::from_secs(5),
        }
    }
}

/// Connector over plain TCP.
#[derive(Debug, Clone, Default)]
pub struct TcpConnector {
    settings: ConnectorSettings,
}

impl TcpConnector {
    pub fn new(settings: ConnectorSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> ConnectorSettings {
        self.settings
    }

    fn resolve(address: &str) -> ConnectorResult<Vec<SocketAddr>> {
        let addrs: Vec<SocketAddr> = address
            .to_socket_addrs()
            .map_err(|e| ConnectorError::connection_failed(format!("{}: {}", address, e)))?
            .collect();
        if addrs.is_empty() {
            return Err(ConnectorError::connection_failed(format!(
                "{}: no addresses resolved",
                address
            )));
        }
        Ok(addrs)
    }

    fn open(&self, address: &str) -> ConnectorResult<TcpSession> {
        let mut last_error = None;
        for addr in Self::resolve(address)? {
            match TcpStream::connect_timeout(&addr, self.settings.connect_timeout) {
                Ok(stream) => return TcpSession::new(address, stream, self.settings.op_timeout),
                Err(e) => last_error = Some(e),
            }
        }
        let reason = last_error.map_or_else(|| "unreachable".to_string(), |e| e.to_string());
        Err(ConnectorError::connection_failed(format!("{}: {}", address, reason)))
    }
}

impl ClusterConnector for TcpConnector {
    fn connect(&self, target: &ConnectTarget) -> ConnectorResult<Box<dyn AdminSession>> {
        match target {
            ConnectTarget::Single(address) => Ok(Box::new(self.open(address)?)),
            ConnectTarget::ReplicaSet(hosts) => connect_replica_set(hosts, |host| {
                self.open(host).map(|s| Box::new(s) as Box<dyn AdminSession>)
            }),
        }
    }
}

/// One TCP connection. Closed when dropped.
pub struct TcpSession {
    address: String,
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl TcpSession {
    fn new(address: &str, stream: TcpStream, op_timeout: Duration) -> ConnectorResult<Self> {
        let io_err = |e: std::io::Error| ConnectorError::from_io(address, &e);
        stream.set_read_timeout(Some(op_timeout)).map_err(io_err)?;
        stream.set_write_timeout(Some(op_timeout)).map_err(io_err)?;
        stream.set_nodelay(true).map_err(io_err)?;
        let writer = stream.try_clone().map_err(io_err)?;
        Ok(Self {
            address: address.to_string(),
            reader: BufReader::new(stream),
            writer,
        })
    }
}

impl AdminSession for TcpSession {
    fn address(&self) -> &str {
        &self.address
    }

    fn run_command(&mut self, command: &AdminCommand) -> ConnectorResult<CommandReply> {
        let mut request = serde_json::to_string(command)
            .map_err(|e| ConnectorError::protocol(format!("encode {}: {}", command.name(), e)))?;
        request.push('\n');

        self.writer
            .write_all(request.as_bytes())
            .and_then(|_| self.writer.flush())
            .map_err(|e| ConnectorError::from_io(&self.address, &e))?;

        let mut line = String::new();
        let read = self
            .reader
            .read_line(&mut line)
            .map_err(|e| ConnectorError::from_io(&self.address, &e))?;
        if read == 0 {
            return Err(ConnectorError::connection_failed(format!(
                "{}: connection closed during {}",
                self.address,
                command.name()
            )));
        }

        serde_json::from_str(line.trim_end()).map_err(|e| {
            ConnectorError::protocol(format!(
                "{}: invalid reply to {}: {}",
                self.address,
                command.name(),
                e
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    fn serve_once(reply: &'static str) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            let mut stream = stream;
            stream.write_all(reply.as_bytes()).unwrap();
            line
        });
        (address, handle)
    }

    #[test]
    fn test_round_trip_over_tcp() {
        let (address, handle) = serve_once("{\"ok\":1,\"shardAdded\":\"rs_a\"}\n");
        let connector = TcpConnector::default();
        let mut session = connector.connect(&ConnectTarget::Single(address)).unwrap();

        let reply = session
            .run_command(&AdminCommand::AddShard {
                shard: "rs_a/h1:27017".to_string(),
            })
            .unwrap();
        assert!(reply.is_ok());

        let request = handle.join().unwrap();
        let sent: serde_json::Value = serde_json::from_str(&request).unwrap();
        assert_eq!(sent["command"], "addShard");
        assert_eq!(sent["shard"], "rs_a/h1:27017");
    }

    #[test]
    fn test_closed_connection_is_connection_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            drop(stream);
        });
        let connector = TcpConnector::default();
        let mut session = connector.connect(&ConnectTarget::Single(address)).unwrap();
        handle.join().unwrap();

        let err = session.run_command(&AdminCommand::Hello).unwrap_err();
        assert!(err.is_connection_failure());
    }

    #[test]
    fn test_garbage_reply_is_protocol_error() {
        let (address, handle) = serve_once("not json\n");
        let connector = TcpConnector::default();
        let mut session = connector.connect(&ConnectTarget::Single(address)).unwrap();

        let err = session.run_command(&AdminCommand::Hello).unwrap_err();
        handle.join().unwrap();
        assert_eq!(err.kind, super::super::ConnectorErrorKind::Protocol);
    }

    #[test]
    fn test_silent_peer_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let connector = TcpConnector::new(ConnectorSettings {
            connect_timeout: Duration::from_millis(500),
            op_timeout: Duration::from_millis(100),
        });
        let mut session = connector.connect(&ConnectTarget::Single(address)).unwrap();
        // Accepted by the kernel backlog, never answered.
        let err = session.run_command(&AdminCommand::Hello).unwrap_err();
        assert!(err.is_timeout());
        drop(listener);
    }

    #[test]
    fn test_refused_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = TcpConnector::default()
            .connect(&ConnectTarget::Single(address))
            .err()
            .unwrap();
        assert!(err.is_connection_failure());
    }
}
