//! Real-time device streaming
//!
//! A background task paces the synthetic device against the wall clock and
//! broadcasts chunks of multiplexed samples, the way a headset link delivers
//! packets. Commands arrive over an mpsc channel; dropping every command
//! sender stops the task.

use crate::device::{DeviceConfig, SyntheticDevice};
use crate::rhythm::RhythmProfile;
use mindwave_core::{MindwaveError, MindwaveResult, RawSample};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, Instant};
use tracing::{debug, info, warn};

/// Configuration for real-time streaming
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Synthetic device configuration
    pub device: DeviceConfig,
    /// Chunk duration in seconds (e.g., 0.05 for 50ms chunks)
    pub chunk_duration: f32,
    /// Broadcast capacity in chunks
    pub buffer_size: usize,
    /// Update rate in Hz (how often to send new data)
    pub update_rate: f32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            device: DeviceConfig::default(),
            chunk_duration: 0.05,
            buffer_size: 64,
            update_rate: 20.0,
        }
    }
}

impl StreamConfig {
    pub fn validate(&self) -> MindwaveResult<()> {
        if !(self.chunk_duration > 0.0 && self.update_rate > 0.0) {
            return Err(MindwaveError::InvalidConfig {
                reason: "chunk_duration and update_rate must be positive".to_string(),
            });
        }
        if self.buffer_size == 0 {
            return Err(MindwaveError::InvalidConfig {
                reason: "buffer_size must be at least 1".to_string(),
            });
        }
        self.device.validate()
    }
}

/// Commands for controlling the stream
#[derive(Debug, Clone, PartialEq)]
pub enum StreamCommand {
    /// Start a fresh session: counter and clock restart at zero
    Connect,
    Disconnect,
    Pause,
    Resume,
    SetProfile(RhythmProfile),
    SetPacketLoss(f32),
}

/// Stream statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamStats {
    pub is_streaming: bool,
    pub chunks_sent: u64,
    pub samples_sent: u64,
    pub samples_lost: u64,
    pub elapsed_secs: f64,
    /// Time spent generating the last chunk
    pub last_chunk_micros: u64,
}

/// Real-time device stream
pub struct DeviceStream {
    config: StreamConfig,
    device: SyntheticDevice,
    data_sender: broadcast::Sender<Vec<RawSample>>,
    control_receiver: mpsc::Receiver<StreamCommand>,
    stats: watch::Sender<StreamStats>,
    streaming: bool,
}

/// Handles to a stream running in the background
pub struct StreamHandle {
    pub data: broadcast::Receiver<Vec<RawSample>>,
    pub control: mpsc::Sender<StreamCommand>,
    pub stats: watch::Receiver<StreamStats>,
    pub task: JoinHandle<()>,
}

impl DeviceStream {
    /// Create the stream and the sender that controls it
    pub fn new(config: StreamConfig) -> MindwaveResult<(Self, mpsc::Sender<StreamCommand>)> {
        config.validate()?;
        let device = SyntheticDevice::new(config.device.clone())?;
        let (data_sender, _) = broadcast::channel(config.buffer_size);
        let (control_sender, control_receiver) = mpsc::channel(32);
        let (stats, _) = watch::channel(StreamStats::default());

        let stream = DeviceStream {
            config,
            device,
            data_sender,
            control_receiver,
            stats,
            streaming: false,
        };
        Ok((stream, control_sender))
    }

    /// Get a receiver for data updates
    pub fn subscribe(&self) -> broadcast::Receiver<Vec<RawSample>> {
        self.data_sender.subscribe()
    }

    pub fn watch_stats(&self) -> watch::Receiver<StreamStats> {
        self.stats.subscribe()
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Run until every command sender is dropped
    pub async fn run(&mut self) {
        let mut ticker = interval(Duration::from_secs_f32(1.0 / self.config.update_rate));

        info!(
            update_rate = self.config.update_rate,
            chunk_ms = self.config.chunk_duration * 1000.0,
            profile = %self.device.profile(),
            "device stream ready"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.streaming {
                        self.emit_chunk();
                    }
                }

                command = self.control_receiver.recv() => match command {
                    Some(command) => self.apply(command),
                    None => {
                        debug!("device stream control channel closed");
                        break;
                    }
                },
            }
        }

        self.streaming = false;
        self.stats.send_modify(|s| s.is_streaming = false);
    }

    fn emit_chunk(&mut self) {
        let started = Instant::now();
        let chunk = self.device.generate_chunk(self.config.chunk_duration);
        let generation_time = started.elapsed();

        let delivered = chunk.len() as u64;
        let elapsed = self.device.elapsed_secs();
        let lost = self.device.samples_lost();
        self.stats.send_modify(|s| {
            s.chunks_sent += 1;
            s.samples_sent += delivered;
            s.samples_lost = lost;
            s.elapsed_secs = elapsed;
            s.last_chunk_micros = generation_time.as_micros() as u64;
        });

        if generation_time.as_secs_f32() > self.config.chunk_duration {
            warn!(
                generation_ms = generation_time.as_millis() as u64,
                chunk_ms = self.config.chunk_duration * 1000.0,
                "chunk generation slower than real time"
            );
        }

        if !chunk.is_empty() {
            // No receivers is fine
            let _ = self.data_sender.send(chunk);
        }
    }

    fn apply(&mut self, command: StreamCommand) {
        match command {
            StreamCommand::Connect => {
                self.device.reset();
                self.streaming = true;
                self.stats.send_replace(StreamStats {
                    is_streaming: true,
                    ..Default::default()
                });
                info!(profile = %self.device.profile(), "device connected");
            }
            StreamCommand::Disconnect => {
                self.streaming = false;
                self.device.reset();
                self.stats.send_modify(|s| s.is_streaming = false);
                info!("device disconnected");
            }
            StreamCommand::Pause => {
                self.streaming = false;
                self.stats.send_modify(|s| s.is_streaming = false);
                info!("device stream paused");
            }
            StreamCommand::Resume => {
                self.streaming = true;
                self.stats.send_modify(|s| s.is_streaming = true);
                info!("device stream resumed");
            }
            StreamCommand::SetProfile(profile) => {
                self.device.set_profile(profile);
                self.config.device.profile = profile;
                info!(%profile, description = profile.description(), "device profile updated");
            }
            StreamCommand::SetPacketLoss(probability) => match self.device.set_packet_loss(probability) {
                Ok(()) => {
                    self.config.device.packet_loss = probability;
                    info!(probability, "packet loss updated");
                }
                Err(e) => warn!(error = %e, "packet loss rejected"),
            },
        }
    }
}

/// Helper function to create and start a stream in the background
pub fn start_device_stream(config: StreamConfig) -> MindwaveResult<StreamHandle> {
    let (mut stream, control) = DeviceStream::new(config)?;
    let data = stream.subscribe();
    let stats = stream.watch_stats();

    let task = tokio::spawn(async move {
        stream.run().await;
    });

    Ok(StreamHandle {
        data,
        control,
        stats,
        task,
    })
}
