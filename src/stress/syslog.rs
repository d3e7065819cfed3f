//! Local syslog socket

use async_trait::async_trait;
use std::io;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tokio::net::{UnixDatagram, UnixStream};

use super::StressError;

/// Well-known syslog socket locations, tried in order
pub const SYSLOG_PATHS: [&str; 3] = ["/dev/log", "/var/run/syslog", "/var/run/log"];

/// Destination for generated messages
#[async_trait]
pub trait MessageSink: Send {
    async fn send(&mut self, message: &[u8]) -> io::Result<()>;
}

/// Connection to the local syslog daemon
#[derive(Debug)]
pub enum SyslogSink {
    Datagram(UnixDatagram),
    Stream(UnixStream),
}

impl SyslogSink {
    /// Connect to the first reachable well-known socket
    ///
    /// Datagram sockets are preferred over stream sockets.
    pub async fn connect() -> Result<Self, StressError> {
        Self::connect_any(&SYSLOG_PATHS).await
    }

    /// Connect to the first reachable socket among `paths`
    pub async fn connect_any<P: AsRef<Path>>(paths: &[P]) -> Result<Self, StressError> {
        for path in paths {
            if let Ok(sink) = Self::connect_datagram(path.as_ref()) {
                return Ok(sink);
            }
        }

        for path in paths {
            if let Ok(stream) = UnixStream::connect(path.as_ref()).await {
                tracing::debug!(path = %path.as_ref().display(), "Connected to syslog stream socket");
                return Ok(Self::Stream(stream));
            }
        }

        Err(StressError::NoSyslog {
            tried: paths
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect(),
        })
    }

    fn connect_datagram(path: &Path) -> io::Result<Self> {
        let socket = UnixDatagram::unbound()?;
        socket.connect(path)?;
        tracing::debug!(path = %path.display(), "Connected to syslog datagram socket");
        Ok(Self::Datagram(socket))
    }
}

#[async_trait]
impl MessageSink for SyslogSink {
    async fn send(&mut self, message: &[u8]) -> io::Result<()> {
        match self {
            Self::Datagram(socket) => {
                socket.send(message).await?;
                Ok(())
            }
            // Stream sockets need a frame delimiter
            Self::Stream(stream) => {
                stream.write_all(message).await?;
                stream.write_all(b"\n").await
            }
        }
    }
}
