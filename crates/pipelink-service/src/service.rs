use std::time::Duration;

use pipelink_frame::{DuplexChannel, Frame, FrameError, FrameReader, FrameWriter};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::source::FrameSource;

/// Default capacity of the inbound event queue.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Default delay between the initiator's connect attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Tuning for a supervisor and its service loops.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Delay between outbound frames. Zero means back-to-back.
    pub cadence: Duration,
    /// Capacity of the inbound event queue. A full queue stalls further
    /// reads until the consumer catches up; nothing is dropped.
    pub event_capacity: usize,
    /// Delay between reconnect attempts (initiator) and between accept
    /// retries after an accept failure (listener).
    pub retry_delay: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            cadence: Duration::from_secs(1),
            event_capacity: DEFAULT_EVENT_CAPACITY,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// Why a connection's service loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopEnd {
    /// The peer closed the connection (cleanly or mid-frame).
    PeerClosed,
    /// An I/O failure broke the channel.
    ChannelBroken,
    /// The shutdown signal fired.
    Cancelled,
    /// The event queue's consumer went away.
    ConsumerGone,
}

/// Drive one connected channel until either direction finishes.
///
/// Runs the receive loop and the send loop concurrently against the two
/// halves of the channel. First-to-finish semantics: when one loop ends the
/// channel is no longer usable, so the other is unwound with it and the
/// supervisor starts its next cycle.
pub async fn drive_channel<S>(
    channel: DuplexChannel<S>,
    events: &mpsc::Sender<Frame>,
    source: &mut dyn FrameSource,
    cadence: Duration,
    cancel: &CancellationToken,
) -> LoopEnd
where
    S: AsyncRead + AsyncWrite,
{
    let (mut reader, mut writer) = channel.split();

    tokio::select! {
        end = receive_loop(&mut reader, events, cancel) => end,
        end = send_loop(&mut writer, source, cadence, cancel) => end,
    }
}

/// Consume decoded frames and hand them to the event queue.
///
/// The queue is bounded: a slow consumer exerts backpressure on the wire
/// instead of dropping frames.
async fn receive_loop<R>(
    reader: &mut FrameReader<R>,
    events: &mpsc::Sender<Frame>,
    cancel: &CancellationToken,
) -> LoopEnd
where
    R: AsyncRead + Unpin,
{
    loop {
        match reader.read_frame(cancel).await {
            Ok(frame) => {
                debug!(title = %frame.title, "frame received");
                if events.send(frame).await.is_err() {
                    warn!("event consumer dropped; stopping receive loop");
                    return LoopEnd::ConsumerGone;
                }
            }
            Err(FrameError::ConnectionClosed) => {
                info!("peer closed the connection");
                return LoopEnd::PeerClosed;
            }
            // Already logged by the reader; the partial tail is gone.
            Err(FrameError::Truncated { .. }) => return LoopEnd::PeerClosed,
            Err(FrameError::Cancelled) => return LoopEnd::Cancelled,
            Err(err) => {
                error!(%err, "read from pipe failed");
                return LoopEnd::ChannelBroken;
            }
        }
    }
}

/// Emit one frame from the source per cadence tick.
async fn send_loop<W>(
    writer: &mut FrameWriter<W>,
    source: &mut dyn FrameSource,
    cadence: Duration,
    cancel: &CancellationToken,
) -> LoopEnd
where
    W: AsyncWrite + Unpin,
{
    loop {
        let frame = source.next_frame();
        match writer.write_frame(&frame, cancel).await {
            Ok(()) => debug!(title = %frame.title, "frame sent"),
            Err(FrameError::Cancelled) => return LoopEnd::Cancelled,
            Err(err) => {
                error!(%err, "write to pipe failed");
                return LoopEnd::ChannelBroken;
            }
        }

        if cadence.is_zero() {
            // Back-to-back traffic still has to let the receive loop run.
            tokio::task::yield_now().await;
            if cancel.is_cancelled() {
                return LoopEnd::Cancelled;
            }
        } else {
            tokio::select! {
                () = cancel.cancelled() => return LoopEnd::Cancelled,
                () = tokio::time::sleep(cadence) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{SequenceSource, StaticSource};
    use pipelink_frame::Frame;
    use tokio::io::AsyncWriteExt;

    const IDLE: Duration = Duration::from_secs(3600);

    #[tokio::test]
    async fn frames_reach_consumer_in_order_until_peer_closes() {
        let (mut peer, local) = tokio::io::duplex(4096);
        let (events, mut rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let mut source = StaticSource::new("t", "m");

        let driver = tokio::spawn(async move {
            drive_channel(
                DuplexChannel::new(local),
                &events,
                &mut source,
                IDLE,
                &cancel,
            )
            .await
        });

        peer.write_all(b"a,1\nb,2\nc,3\n").await.expect("peer write should succeed");
        drop(peer);

        assert_eq!(rx.recv().await, Some(Frame::new("a", "1")));
        assert_eq!(rx.recv().await, Some(Frame::new("b", "2")));
        assert_eq!(rx.recv().await, Some(Frame::new("c", "3")));

        let end = driver.await.expect("driver task should finish");
        assert_eq!(end, LoopEnd::PeerClosed);
    }

    #[tokio::test]
    async fn slow_consumer_loses_nothing() {
        let (mut peer, local) = tokio::io::duplex(4096);
        let (events, mut rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let mut source = StaticSource::new("t", "m");

        let driver = tokio::spawn(async move {
            drive_channel(
                DuplexChannel::new(local),
                &events,
                &mut source,
                IDLE,
                &cancel,
            )
            .await
        });

        for i in 0..5 {
            peer.write_all(format!("seq,{i}\n").as_bytes())
                .await
                .expect("peer write should succeed");
        }
        drop(peer);

        for i in 0..5 {
            tokio::time::sleep(Duration::from_millis(5)).await;
            let frame = rx.recv().await.expect("frame should arrive");
            assert_eq!(frame, Frame::new("seq", i.to_string()));
        }

        let end = driver.await.expect("driver task should finish");
        assert_eq!(end, LoopEnd::PeerClosed);
    }

    #[tokio::test]
    async fn dropped_consumer_ends_the_loop() {
        let (mut peer, local) = tokio::io::duplex(4096);
        let (events, rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let mut source = StaticSource::new("t", "m");
        drop(rx);

        let driver = tokio::spawn(async move {
            drive_channel(
                DuplexChannel::new(local),
                &events,
                &mut source,
                IDLE,
                &cancel,
            )
            .await
        });

        peer.write_all(b"a,1\n").await.expect("peer write should succeed");

        let end = driver.await.expect("driver task should finish");
        assert_eq!(end, LoopEnd::ConsumerGone);
    }

    #[tokio::test]
    async fn cancellation_unwinds_both_tasks() {
        let (peer, local) = tokio::io::duplex(4096);
        let (events, _rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let mut source = StaticSource::new("t", "m");
        let _keep_open = peer;

        let cancel_clone = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel_clone.cancel();
        });

        let end = drive_channel(
            DuplexChannel::new(local),
            &events,
            &mut source,
            IDLE,
            &cancel,
        )
        .await;
        assert_eq!(end, LoopEnd::Cancelled);
    }

    #[tokio::test]
    async fn cadenced_send_emits_sequenced_frames() {
        let (peer, local) = tokio::io::duplex(4096);
        let (events, _rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let mut source = SequenceSource::new("Title1");

        let cancel_clone = cancel.clone();
        let driver = tokio::spawn(async move {
            drive_channel(
                DuplexChannel::new(local),
                &events,
                &mut source,
                Duration::from_millis(10),
                &cancel_clone,
            )
            .await
        });

        let (mut peer_reader, _peer_writer) = DuplexChannel::new(peer).split();
        for i in 0..3 {
            let frame = peer_reader
                .read_frame(&cancel)
                .await
                .expect("peer read should succeed");
            assert_eq!(frame, Frame::new("Title1", format!("Message > {i}")));
        }

        cancel.cancel();
        let end = driver.await.expect("driver task should finish");
        assert_eq!(end, LoopEnd::Cancelled);
    }

    #[tokio::test]
    async fn zero_cadence_sends_back_to_back() {
        let (peer, local) = tokio::io::duplex(4096);
        let (events, _rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let mut source = SequenceSource::new("Title1");

        let cancel_clone = cancel.clone();
        let driver = tokio::spawn(async move {
            drive_channel(
                DuplexChannel::new(local),
                &events,
                &mut source,
                Duration::ZERO,
                &cancel_clone,
            )
            .await
        });

        let (mut peer_reader, _peer_writer) = DuplexChannel::new(peer).split();
        for i in 0..20 {
            let frame = peer_reader
                .read_frame(&cancel)
                .await
                .expect("peer read should succeed");
            assert_eq!(frame, Frame::new("Title1", format!("Message > {i}")));
        }

        cancel.cancel();
        let end = driver.await.expect("driver task should finish");
        assert_eq!(end, LoopEnd::Cancelled);
    }
}
