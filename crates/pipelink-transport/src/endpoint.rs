use std::io;
use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};

use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, info};

use crate::error::{Result, TransportError};

/// `(dev, ino)` pair identifying the socket file this endpoint created.
type FileId = (u64, u64);

/// Listening end of a local named pipe.
///
/// Backed by a filesystem-path Unix domain socket. Binding creates the
/// socket file; dropping the endpoint unlinks it again, but only while the
/// path still names the very file this endpoint created.
#[derive(Debug)]
pub struct PipeEndpoint {
    listener: UnixListener,
    path: PathBuf,
    owned_file: Option<FileId>,
}

impl PipeEndpoint {
    /// Default permission mode for created socket paths.
    pub const DEFAULT_SOCKET_MODE: u32 = 0o600;
    /// Longest path the kernel accepts in a local socket address.
    #[cfg(target_os = "linux")]
    const MAX_PATH_LEN: usize = 108;
    #[cfg(not(target_os = "linux"))]
    const MAX_PATH_LEN: usize = 104;

    /// Bind and listen on a pipe path with [`Self::DEFAULT_SOCKET_MODE`].
    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        Self::bind_with_mode(path, Self::DEFAULT_SOCKET_MODE)
    }

    /// Bind and listen on a pipe path with an explicit permission mode.
    ///
    /// A socket file left behind by an earlier run is unlinked before
    /// binding. Anything else already sitting at the path aborts the bind,
    /// so a mistyped path cannot clobber a regular file.
    pub fn bind_with_mode(path: impl AsRef<Path>, mode: u32) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        check_path_len(&path)?;

        let bind_err = |source| TransportError::Bind {
            path: path.clone(),
            source,
        };

        unlink_stale_socket(&path).map_err(bind_err)?;
        let listener = UnixListener::bind(&path).map_err(bind_err)?;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode))
            .map_err(bind_err)?;
        let owned_file = file_id(&path).map_err(bind_err)?;

        info!(?path, "listening on pipe endpoint");
        Ok(Self {
            listener,
            path,
            owned_file: Some(owned_file),
        })
    }

    /// Wait for the next incoming connection.
    pub async fn accept(&self) -> Result<UnixStream> {
        let (stream, _addr) = self.listener.accept().await.map_err(TransportError::Accept)?;
        debug!("accepted connection");
        Ok(stream)
    }

    /// Connect to a listening pipe endpoint.
    pub async fn connect(path: impl AsRef<Path>) -> Result<UnixStream> {
        let path = path.as_ref();
        let stream = UnixStream::connect(path)
            .await
            .map_err(|e| TransportError::Connect {
                path: path.to_path_buf(),
                source: e,
            })?;
        debug!(?path, "connected to pipe endpoint");
        Ok(stream)
    }

    /// The path this endpoint is bound to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PipeEndpoint {
    fn drop(&mut self) {
        let Some(owned) = self.owned_file else {
            return;
        };
        // Unlink only the exact file this endpoint created. If the path now
        // names a different inode, someone replaced it and it is theirs.
        if matches!(file_id(&self.path), Ok(current) if current == owned) {
            debug!(path = ?self.path, "removing socket file");
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

fn check_path_len(path: &Path) -> Result<()> {
    let len = path.as_os_str().len();
    if len >= PipeEndpoint::MAX_PATH_LEN {
        return Err(TransportError::PathTooLong {
            path: path.to_path_buf(),
            len,
            max: PipeEndpoint::MAX_PATH_LEN,
        });
    }
    Ok(())
}

/// Unlink the path if it holds a socket from a previous run; refuse to
/// touch anything that is not a socket.
fn unlink_stale_socket(path: &Path) -> io::Result<()> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_socket() => {
            debug!(?path, "unlinking stale socket");
            std::fs::remove_file(path)
        }
        Ok(_) => Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            "path exists and is not a unix socket",
        )),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

fn file_id(path: &Path) -> io::Result<FileId> {
    let meta = std::fs::symlink_metadata(path)?;
    Ok((meta.dev(), meta.ino()))
}
