//! Monitor session: device stream -> pipeline -> dashboard and recorder

use crate::render::ConsoleRenderer;
use anyhow::{Context, Result};
use mindwave_core::Goal;
use mindwave_processing::{AnalysisConfig, Pipeline, PipelineBuilder, PipelineEvent, SessionRecorder, SessionSummary};
use mindwave_simulation::{start_device_stream, StreamCommand, StreamConfig};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

/// How often the dashboard is refreshed
const RENDER_INTERVAL: Duration = Duration::from_secs(1);

/// Everything a monitor run needs
#[derive(Debug, Clone)]
pub struct MonitorOptions {
    pub analysis: AnalysisConfig,
    pub stream: StreamConfig,
    pub goal: Goal,
    /// Stop after this long; run until Ctrl-C when absent
    pub duration: Option<Duration>,
    pub export: Option<PathBuf>,
}

pub struct MonitorApp {
    options: MonitorOptions,
    pipeline: Pipeline,
    recorder: SessionRecorder,
    renderer: ConsoleRenderer,
}

impl MonitorApp {
    pub fn new(options: MonitorOptions) -> Result<Self> {
        let pipeline = PipelineBuilder::new(options.analysis.clone())
            .goal(options.goal)
            .build()
            .context("invalid analysis configuration")?;

        Ok(Self {
            options,
            pipeline,
            recorder: SessionRecorder::new(),
            renderer: ConsoleRenderer::new(RENDER_INTERVAL),
        })
    }

    fn handle_event(&mut self, event: &PipelineEvent) {
        self.recorder.handle(event);
        self.renderer.handle(event, Instant::now());
    }

    /// Run one device session to completion and return its summary
    pub async fn run(mut self) -> Result<SessionSummary> {
        let mut stream = start_device_stream(self.options.stream.clone()).context("failed to start device stream")?;
        let mut events = self.pipeline.subscribe();

        let session_id = self.pipeline.connect().await.context("failed to connect pipeline")?;
        self.recorder.start();
        stream
            .control
            .send(StreamCommand::Connect)
            .await
            .context("device stream stopped before connect")?;
        info!(
            session = %session_id,
            profile = %self.options.stream.device.profile,
            goal = %self.options.goal,
            "monitoring started"
        );

        let duration = self.options.duration;
        let deadline = async move {
            match duration {
                Some(duration) => tokio::time::sleep(duration).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(deadline);

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                _ = &mut deadline => {
                    info!("session duration reached");
                    break;
                }

                signal = &mut ctrl_c => {
                    if let Err(e) = signal {
                        warn!(error = %e, "failed to listen for Ctrl-C");
                    }
                    info!("interrupted");
                    break;
                }

                chunk = stream.data.recv() => match chunk {
                    Ok(samples) => self
                        .pipeline
                        .push_samples(&samples)
                        .context("pipeline rejected device samples")?,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "device chunks dropped before ingestion");
                    }
                    Err(RecvError::Closed) => {
                        warn!("device stream ended");
                        break;
                    }
                },

                event = events.recv() => match event {
                    Ok(event) => self.handle_event(&event),
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "dashboard lagged behind pipeline events");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }

        if stream.control.send(StreamCommand::Disconnect).await.is_err() {
            debug!("device stream already stopped");
        }
        self.pipeline.disconnect().await;
        self.drain(&mut events);

        drop(stream.control);
        if let Err(e) = stream.task.await {
            warn!(error = %e, "device stream task failed");
        }

        let summary = self.recorder.summary();
        self.renderer.render_summary(&summary, &self.pipeline.ingest_stats());

        if let Some(path) = &self.options.export {
            self.recorder
                .export_json(path)
                .with_context(|| format!("failed to export session to {}", path.display()))?;
        }

        Ok(summary)
    }

    /// Consume events published up to and including `Disconnected`
    fn drain(&mut self, events: &mut broadcast::Receiver<PipelineEvent>) {
        loop {
            match events.try_recv() {
                Ok(event) => {
                    let done = matches!(event, PipelineEvent::Disconnected { .. });
                    self.handle_event(&event);
                    if done {
                        break;
                    }
                }
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    debug!(skipped, "dropped events during teardown");
                }
                Err(_) => break,
            }
        }
    }
}
