//! Message-driven telemetry service.
//!
//! The cache is deliberately driven by exactly one consuming loop: commands
//! arrive over an mpsc channel and are processed sequentially, so frame
//! writes, catch-up reads, and cache resets are trivially mutually exclusive
//! and a reset is atomic with respect to reads. Read replies travel back
//! through oneshot channels embedded in the command.
//!
//! ```text
//! transport / web tier                 service task
//! --------------------                 ------------
//! 1. create command (with oneshot)
//! 2. send via mpsc channel      ------>
//!                                      3. decode -> merge -> write,
//!                                         or answer the read
//! 4. await oneshot receiver     <------ 5. send reply
//! ```
//!
//! Recoverable pipeline errors (malformed frames, merge inconsistencies) are
//! logged and the frame dropped; the loop keeps running. The loop ends when
//! every [`TelemetryHandle`] has been dropped.

use crate::config::Settings;
use crate::data::cache::{CacheReply, DataCache};
use crate::decoder::{self, DecoderConfig, RawFrame};
use crate::error::{TelemetryError, TelemetryResult};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Commands consumed by the telemetry service loop.
#[derive(Debug)]
pub enum TelemetryCommand {
    /// A raw measurement frame from the publish/subscribe transport.
    Frame(RawFrame),
    /// Catch-up read request from a web client.
    Read {
        /// Reference timestamp, milliseconds since the epoch.
        time_reference: f64,
        /// Maximum number of samples in the reply, `0` for unbounded.
        limit: usize,
        /// Reply channel.
        reply: oneshot::Sender<CacheReply>,
    },
    /// Rebuild the cache on the next frame, e.g. on measurement restart.
    Reset,
}

/// Cloneable front end for submitting commands to the service loop.
#[derive(Debug, Clone)]
pub struct TelemetryHandle {
    commands: mpsc::Sender<TelemetryCommand>,
}

impl TelemetryHandle {
    /// Forward one raw frame to the decode pipeline.
    pub async fn publish_frame(&self, frame: RawFrame) -> TelemetryResult<()> {
        self.commands
            .send(TelemetryCommand::Frame(frame))
            .await
            .map_err(|_| TelemetryError::ServiceUnavailable)
    }

    /// Request everything cached at or after `time_reference`, bounded to the
    /// most recent `limit` samples when `limit > 0`.
    pub async fn read(&self, time_reference: f64, limit: usize) -> TelemetryResult<CacheReply> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(TelemetryCommand::Read {
                time_reference,
                limit,
                reply,
            })
            .await
            .map_err(|_| TelemetryError::ServiceUnavailable)?;
        rx.await.map_err(|_| TelemetryError::ServiceUnavailable)
    }

    /// Request a cache rebuild on the next frame.
    pub async fn reset(&self) -> TelemetryResult<()> {
        self.commands
            .send(TelemetryCommand::Reset)
            .await
            .map_err(|_| TelemetryError::ServiceUnavailable)
    }
}

/// Single-consumer service owning the data cache.
#[derive(Debug)]
pub struct TelemetryService {
    cache: DataCache,
    decoder: DecoderConfig,
    commands: mpsc::Receiver<TelemetryCommand>,
}

impl TelemetryService {
    /// Command channel capacity; one frame per publish interval means modest
    /// buffering suffices.
    pub const COMMAND_CAPACITY: usize = 32;

    /// Build the service and its submission handle from settings.
    pub fn new(settings: &Settings) -> (Self, TelemetryHandle) {
        let (tx, rx) = mpsc::channel(Self::COMMAND_CAPACITY);
        let service = Self {
            cache: DataCache::new(settings.cache_config()),
            decoder: settings.decoder_config(),
            commands: rx,
        };
        (service, TelemetryHandle { commands: tx })
    }

    /// Consume commands until all handles are dropped.
    pub async fn run(mut self) {
        info!("telemetry service started");
        while let Some(command) = self.commands.recv().await {
            self.handle(command);
        }
        info!("telemetry service stopped");
    }

    fn handle(&mut self, command: TelemetryCommand) {
        match command {
            TelemetryCommand::Frame(frame) => match decoder::decode_frame(&frame, &self.decoder)
            {
                Ok(message) => self.cache.write(&message),
                Err(err) => warn!(error = %err, "dropping undecodable frame"),
            },
            TelemetryCommand::Read {
                time_reference,
                limit,
                reply,
            } => {
                if reply.send(self.cache.read(time_reference, limit)).is_err() {
                    debug!("read reply receiver dropped");
                }
            }
            TelemetryCommand::Reset => self.cache.request_reset(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use tokio_test::assert_ok;

    fn spawn_service() -> TelemetryHandle {
        let (service, handle) = TelemetryService::new(&Settings::default());
        tokio::spawn(service.run());
        handle
    }

    #[tokio::test]
    async fn frames_become_readable_history() {
        let handle = spawn_service();

        for i in 0..3i64 {
            let frame = testing::frame_builder()
                .epoch(100 + i, 0)
                .voltage("V1", &[100_000_000 * (i as i32 + 1)])
                .digital_masks(&[0])
                .build();
            handle.publish_frame(frame).await.unwrap();
        }

        let reply = handle.read(100_500.0, 0).await.unwrap();
        assert_eq!(reply.time.as_deref(), Some(&[101_000.0, 102_000.0][..]));
        assert_eq!(reply.data["V1"], vec![2.0, 3.0]);
    }

    #[tokio::test]
    async fn malformed_frames_do_not_stop_the_loop() {
        let handle = spawn_service();

        assert_ok!(
            handle
                .publish_frame(vec![bytes::Bytes::from_static(b"garbage")])
                .await
        );

        let frame = testing::frame_builder()
            .epoch(100, 0)
            .voltage("V1", &[100_000_000])
            .digital_masks(&[0])
            .build();
        handle.publish_frame(frame).await.unwrap();

        let reply = handle.read(0.0, 0).await.unwrap();
        assert_eq!(reply.data["V1"], vec![1.0]);
    }

    #[tokio::test]
    async fn reset_command_rebuilds_on_next_frame() {
        let handle = spawn_service();

        let frame = testing::frame_builder()
            .epoch(100, 0)
            .voltage("V1", &[100_000_000])
            .digital_masks(&[0])
            .build();
        handle.publish_frame(frame).await.unwrap();

        handle.reset().await.unwrap();

        let frame = testing::frame_builder()
            .epoch(200, 0)
            .voltage("V2", &[200_000_000])
            .digital_masks(&[0])
            .build();
        handle.publish_frame(frame).await.unwrap();

        let reply = handle.read(0.0, 0).await.unwrap();
        assert_eq!(reply.time.as_deref(), Some(&[200_000.0][..]));
        assert!(reply.data.contains_key("V2"));
        assert!(!reply.data.contains_key("V1"));
    }
}
