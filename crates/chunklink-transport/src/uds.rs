use std::os::fd::AsRawFd;
use std::os::unix::fs::FileTypeExt;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::fd;
use crate::stream::LinkStream;
use crate::traits::Link;

/// Unix-socket stand-in for a serial line.
///
/// Lets a sender and a receiver on the same host exercise the protocol
/// without hardware. The receiving side binds, the sending side connects.
pub struct SocketListener {
    listener: UnixListener,
    path: PathBuf,
}

impl SocketListener {
    /// `sockaddr_un.sun_path` is 108 bytes on Linux, 104 elsewhere.
    #[cfg(target_os = "linux")]
    const MAX_PATH_LEN: usize = 108;
    #[cfg(not(target_os = "linux"))]
    const MAX_PATH_LEN: usize = 104;

    /// Bind a listening socket at `path`, replacing a stale socket file.
    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let len = path.as_os_str().len();
        if len >= Self::MAX_PATH_LEN {
            return Err(TransportError::PathTooLong {
                path,
                len,
                max: Self::MAX_PATH_LEN,
            });
        }

        if let Ok(metadata) = std::fs::symlink_metadata(&path) {
            if !metadata.file_type().is_socket() {
                return Err(TransportError::Bind {
                    path,
                    source: std::io::Error::new(
                        std::io::ErrorKind::AlreadyExists,
                        "existing path is not a unix socket",
                    ),
                });
            }
            debug!(?path, "removing stale socket");
            std::fs::remove_file(&path).map_err(|source| TransportError::Bind {
                path: path.clone(),
                source,
            })?;
        }

        let listener = UnixListener::bind(&path).map_err(|source| TransportError::Bind {
            path: path.clone(),
            source,
        })?;

        info!(?path, "listening for link connection");
        Ok(Self { listener, path })
    }

    /// Accept one connection (blocking).
    pub fn accept(&self) -> Result<LinkStream> {
        let (stream, _addr) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(path = ?self.path, "link connection accepted");
        Ok(LinkStream::from_unix(stream))
    }

    /// Accept one connection, waiting at most `timeout` for a peer.
    pub fn accept_timeout(&self, timeout: Duration) -> Result<Option<LinkStream>> {
        if !fd::wait_readable(self.listener.as_raw_fd(), timeout)? {
            return Ok(None);
        }
        self.accept().map(Some)
    }

    /// The path this listener is bound to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SocketListener {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Connect to a [`SocketListener`] at `path`.
pub fn connect(path: impl AsRef<Path>) -> Result<LinkStream> {
    let path = path.as_ref();
    let stream = UnixStream::connect(path).map_err(|source| TransportError::Connect {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(?path, "connected to link socket");
    Ok(LinkStream::from_unix(stream))
}

impl Link for UnixStream {
    fn bytes_available(&self) -> Result<usize> {
        fd::bytes_available(self.as_raw_fd())
    }

    fn wait_readable(&self, timeout: Duration) -> Result<bool> {
        fd::wait_readable(self.as_raw_fd(), timeout)
    }

    fn wait_writable(&self, timeout: Duration) -> Result<bool> {
        fd::wait_writable(self.as_raw_fd(), timeout)
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        // A zero duration is rejected by the socket API.
        let timeout = timeout.map(|t| t.max(Duration::from_millis(1)));
        UnixStream::set_read_timeout(self, timeout).map_err(Into::into)
    }

    fn duplicate(&self) -> Result<Self> {
        self.try_clone().map_err(Into::into)
    }
}
