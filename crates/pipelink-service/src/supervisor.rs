use std::path::{Path, PathBuf};

use pipelink_frame::{DuplexChannel, Frame};
use pipelink_transport::PipeEndpoint;
use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::service::{drive_channel, LoopEnd, ServiceConfig};
use crate::source::FrameSource;

/// Initiating (client) side of the pipe service.
///
/// Owns the reconnect policy: connect attempts are retried until the
/// listener appears or shutdown is requested, and a finished connection
/// cycle leads straight back into connecting. Transient connect failures
/// are never surfaced to the host.
pub struct Initiator {
    path: PathBuf,
    config: ServiceConfig,
    source: Box<dyn FrameSource>,
    events: mpsc::Sender<Frame>,
}

impl Initiator {
    /// Create an initiator for a pipe path, returning it together with the
    /// receiver for inbound frames.
    pub fn new(
        path: impl AsRef<Path>,
        config: ServiceConfig,
        source: Box<dyn FrameSource>,
    ) -> (Self, mpsc::Receiver<Frame>) {
        let (events, receiver) = mpsc::channel(config.event_capacity);
        (
            Self {
                path: path.as_ref().to_path_buf(),
                config,
                source,
                events,
            },
            receiver,
        )
    }

    /// Run connection cycles until shutdown.
    ///
    /// Each cycle holds exactly one live channel; the connection is dropped
    /// on every exit path before the next cycle begins.
    pub async fn run(mut self, cancel: &CancellationToken) -> Result<()> {
        while !cancel.is_cancelled() {
            let Some(stream) = self.await_connection(cancel).await else {
                break;
            };
            info!(path = %self.path.display(), "connected to listener");

            let end = drive_channel(
                DuplexChannel::new(stream),
                &self.events,
                self.source.as_mut(),
                self.config.cadence,
                cancel,
            )
            .await;
            info!(?end, "connection cycle ended");

            if matches!(end, LoopEnd::Cancelled | LoopEnd::ConsumerGone) {
                break;
            }
        }
        info!("initiator stopped");
        Ok(())
    }

    /// Connect, retrying on transient failure, until cancelled.
    async fn await_connection(&self, cancel: &CancellationToken) -> Option<UnixStream> {
        loop {
            if cancel.is_cancelled() {
                return None;
            }
            match PipeEndpoint::connect(&self.path).await {
                Ok(stream) => return Some(stream),
                Err(err) => {
                    debug!(path = %self.path.display(), %err, "connect attempt failed; retrying");
                    tokio::select! {
                        () = cancel.cancelled() => return None,
                        () = tokio::time::sleep(self.config.retry_delay) => {}
                    }
                }
            }
        }
    }
}

/// Listening (server) side of the pipe service.
///
/// Serves exactly one peer at a time: accept, drive the service loop until
/// the peer disconnects or the channel breaks, release the connection,
/// accept the next. There is no fan-out.
pub struct Listener {
    endpoint: PipeEndpoint,
    config: ServiceConfig,
    source: Box<dyn FrameSource>,
    events: mpsc::Sender<Frame>,
}

impl Listener {
    /// Bind the pipe path, returning the listener together with the
    /// receiver for inbound frames.
    ///
    /// A bind failure is an unrecoverable startup error and is surfaced to
    /// the host rather than retried.
    pub fn bind(
        path: impl AsRef<Path>,
        config: ServiceConfig,
        source: Box<dyn FrameSource>,
    ) -> Result<(Self, mpsc::Receiver<Frame>)> {
        let endpoint = PipeEndpoint::bind(path)?;
        let (events, receiver) = mpsc::channel(config.event_capacity);
        Ok((
            Self {
                endpoint,
                config,
                source,
                events,
            },
            receiver,
        ))
    }

    /// The path this listener is bound to.
    pub fn path(&self) -> &Path {
        self.endpoint.path()
    }

    /// Run accept/serve cycles until shutdown.
    ///
    /// Accept failures are transient: logged and retried after the
    /// configured delay. The bound socket path is released when the
    /// listener is dropped, so the same name can be re-bound afterwards.
    pub async fn run(mut self, cancel: &CancellationToken) -> Result<()> {
        while !cancel.is_cancelled() {
            info!(path = %self.endpoint.path().display(), "waiting for connection");
            let stream = tokio::select! {
                () = cancel.cancelled() => break,
                accepted = self.endpoint.accept() => match accepted {
                    Ok(stream) => stream,
                    Err(err) => {
                        warn!(%err, "accept failed; retrying");
                        tokio::select! {
                            () = cancel.cancelled() => break,
                            () = tokio::time::sleep(self.config.retry_delay) => {}
                        }
                        continue;
                    }
                },
            };
            info!("peer connected");

            let end = drive_channel(
                DuplexChannel::new(stream),
                &self.events,
                self.source.as_mut(),
                self.config.cadence,
                cancel,
            )
            .await;
            info!(?end, "peer session ended");

            if matches!(end, LoopEnd::Cancelled | LoopEnd::ConsumerGone) {
                break;
            }
        }
        info!("listener stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::source::{SequenceSource, StaticSource};

    fn make_temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "plk-sup-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
        dir
    }

    fn quick_config() -> ServiceConfig {
        ServiceConfig {
            cadence: Duration::from_millis(20),
            retry_delay: Duration::from_millis(25),
            ..ServiceConfig::default()
        }
    }

    #[tokio::test]
    async fn listener_serves_sequential_peers() {
        let dir = make_temp_dir("sequential");
        let sock_path = dir.join("svc.sock");
        let cancel = CancellationToken::new();

        let (listener, mut rx) = Listener::bind(
            &sock_path,
            quick_config(),
            Box::new(StaticSource::new("Title2", "Message2")),
        )
        .expect("listener should bind");

        let cancel_clone = cancel.clone();
        let runner = tokio::spawn(async move { listener.run(&cancel_clone).await });

        for tag in ["peer1", "peer2"] {
            let stream = PipeEndpoint::connect(&sock_path)
                .await
                .expect("client should connect");
            let (mut reader, mut writer) = DuplexChannel::new(stream).split();

            // The listener's demo traffic starts as soon as we connect.
            let frame = reader.read_frame(&cancel).await.expect("client read should succeed");
            assert_eq!(frame, Frame::new("Title2", "Message2"));

            writer
                .write_frame(&Frame::new(tag, "hello"), &cancel)
                .await
                .expect("client write should succeed");
            let got = rx.recv().await.expect("listener should surface the frame");
            assert_eq!(got, Frame::new(tag, "hello"));
            // Dropping the halves disconnects; the listener re-enters accept.
        }

        cancel.cancel();
        runner
            .await
            .expect("runner task should finish")
            .expect("listener run should succeed");

        // Shutdown released the socket path; the same name binds again.
        let rebound = PipeEndpoint::bind(&sock_path);
        assert!(rebound.is_ok(), "socket path should be re-bindable after stop");

        drop(rebound);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn initiator_retries_until_listener_appears() {
        let dir = make_temp_dir("late-listener");
        let sock_path = dir.join("svc.sock");
        let cancel = CancellationToken::new();

        let (initiator, _rx) = Initiator::new(
            &sock_path,
            quick_config(),
            Box::new(SequenceSource::new("Title1")),
        );
        let cancel_clone = cancel.clone();
        let runner = tokio::spawn(async move { initiator.run(&cancel_clone).await });

        // No listener yet: the initiator must keep retrying, not terminate.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!runner.is_finished());

        let endpoint = PipeEndpoint::bind(&sock_path).expect("listener should bind");
        let stream = endpoint.accept().await.expect("accept should succeed");
        let (mut reader, _writer) = DuplexChannel::new(stream).split();

        let frame = reader.read_frame(&cancel).await.expect("server read should succeed");
        assert_eq!(frame, Frame::new("Title1", "Message > 0"));

        cancel.cancel();
        runner
            .await
            .expect("runner task should finish")
            .expect("initiator run should succeed");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn initiator_reconnects_after_peer_disconnect() {
        let dir = make_temp_dir("reconnect");
        let sock_path = dir.join("svc.sock");
        let cancel = CancellationToken::new();
        let endpoint = PipeEndpoint::bind(&sock_path).expect("listener should bind");

        let (initiator, _rx) = Initiator::new(
            &sock_path,
            quick_config(),
            Box::new(SequenceSource::new("Title1")),
        );
        let cancel_clone = cancel.clone();
        let runner = tokio::spawn(async move { initiator.run(&cancel_clone).await });

        for _ in 0..2 {
            let stream = endpoint.accept().await.expect("accept should succeed");
            let (mut reader, _writer) = DuplexChannel::new(stream).split();
            let frame = reader.read_frame(&cancel).await.expect("server read should succeed");
            assert_eq!(frame.title, "Title1");
            // Dropping the connection forces the initiator back to connecting.
        }

        cancel.cancel();
        runner
            .await
            .expect("runner task should finish")
            .expect("initiator run should succeed");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn cancelled_before_connect_stops_promptly() {
        let dir = make_temp_dir("precancel");
        let sock_path = dir.join("svc.sock");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let (initiator, _rx) = Initiator::new(
            &sock_path,
            quick_config(),
            Box::new(StaticSource::new("t", "m")),
        );
        initiator
            .run(&cancel)
            .await
            .expect("initiator run should succeed");
        let _ = std::fs::remove_dir_all(&dir);
    }
}
