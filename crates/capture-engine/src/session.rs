//! Real-time recording session.
//!
//! Drives a [`CaptureController`] from one task. Three timers race: the
//! display-rate frame tick, the progress monitor, and a safety sleep set to
//! the trim duration plus a margin. Whichever stop trigger fires first wins;
//! the other becomes a no-op.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use vivitag_common::config::CaptureDefaults;
use vivitag_common::error::{VivitagError, VivitagResult};

use crate::controller::{
    CaptureController, CaptureState, FrameOutcome, MonitorOutcome, ProjectHost, RecordingPlan,
    StopReason,
};
use crate::deliver::{deliver, Delivery, DeliveryTargets};
use crate::media::MediaElement;
use crate::sink::{CaptureStats, EncodingSink};

/// Progress notifications emitted while recording.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RecordingEvent {
    Started {
        format: Option<String>,
        audio: bool,
    },
    Progress {
        percent: f64,
    },
    Stopped {
        reason: StopReason,
        position_secs: f64,
    },
    Delivered {
        delivery: Delivery,
    },
    Failed {
        message: String,
    },
}

/// Summary of a finished recording.
#[derive(Debug, Clone, Serialize)]
pub struct RecordingReport {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: usize,
    pub stop_reason: StopReason,

    /// How far past the trim end playback was when the recording stopped.
    pub drift_ms: f64,

    pub delivery: Delivery,

    #[serde(skip)]
    pub stats: CaptureStats,
}

/// Cancels a running recording or preview from elsewhere.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Re-arm the handle for the next run.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Runs recordings and previews in real time.
pub struct RecordingSession {
    defaults: CaptureDefaults,
    queued: bool,
    events: Option<mpsc::UnboundedSender<RecordingEvent>>,
    stop: StopHandle,
}

impl RecordingSession {
    pub fn new(defaults: CaptureDefaults) -> Self {
        Self {
            defaults,
            queued: false,
            events: None,
            stop: StopHandle::new(),
        }
    }

    /// Mark recordings as items of a batch queue. The host is notified after
    /// each one is delivered.
    pub fn queued(mut self, queued: bool) -> Self {
        self.queued = queued;
        self
    }

    /// Subscribe to progress events.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<RecordingEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.events = Some(tx);
        rx
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    fn emit(&self, event: RecordingEvent) {
        if let Some(tx) = &self.events {
            // A dropped receiver only means nobody is listening.
            let _ = tx.send(event);
        }
    }

    /// Record the host's active project through the trim window and deliver
    /// the clip.
    ///
    /// A queued session notifies the host after the grace delay once a
    /// started recording ends, whether or not it produced a file, so the
    /// queue always advances.
    pub async fn record<H, M, S>(
        &self,
        host: &mut H,
        controller: &mut CaptureController<M, S>,
        targets: &DeliveryTargets,
    ) -> VivitagResult<RecordingReport>
    where
        H: ProjectHost + ?Sized,
        M: MediaElement,
        S: EncodingSink,
    {
        self.stop.reset();
        let plan = match controller.start_recording(host) {
            Ok(plan) => plan,
            Err(e) => {
                self.fail(&e);
                return Err(e);
            }
        };
        self.emit(RecordingEvent::Started {
            format: plan.format.as_ref().map(|f| f.mime.clone()),
            audio: plan.audio,
        });

        let result = self.capture(&*host, controller, targets, &plan).await;
        if let Err(e) = &result {
            self.fail(e);
        }

        if self.queued {
            tokio::time::sleep(self.defaults.batch_grace()).await;
            tracing::debug!(ok = result.is_ok(), "Batch item complete");
            host.on_batch_item_complete();
        }
        result
    }

    fn fail(&self, error: &VivitagError) {
        tracing::error!(error = %error, "Recording failed");
        self.emit(RecordingEvent::Failed {
            message: error.to_string(),
        });
    }

    async fn capture<H, M, S>(
        &self,
        host: &H,
        controller: &mut CaptureController<M, S>,
        targets: &DeliveryTargets,
        plan: &RecordingPlan,
    ) -> VivitagResult<RecordingReport>
    where
        H: ProjectHost + ?Sized,
        M: MediaElement,
        S: EncodingSink,
    {
        let safety_after = Duration::from_secs_f64(
            plan.window.duration_secs() + self.defaults.safety_margin_secs.max(0.0),
        );
        let mut frames = tokio::time::interval(self.defaults.frame_interval());
        frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut monitor = tokio::time::interval(self.defaults.monitor_interval());
        monitor.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let safety = tokio::time::sleep(safety_after);
        tokio::pin!(safety);

        loop {
            if self.stop.is_stopped() {
                controller.stop(StopReason::Cancelled);
                break;
            }
            tokio::select! {
                _ = frames.tick() => {
                    if controller.render_tick(host) == FrameOutcome::Stopped {
                        tracing::trace!("Render loop idle while recording");
                    }
                }
                _ = monitor.tick() => match controller.monitor_tick() {
                    MonitorOutcome::Progress(percent) => {
                        self.emit(RecordingEvent::Progress { percent });
                    }
                    MonitorOutcome::Stopped(_) | MonitorOutcome::Inactive => break,
                },
                _ = &mut safety => {
                    controller.safety_timeout();
                    break;
                }
            }
        }

        let stopped = controller
            .stop_record()
            .ok_or_else(|| VivitagError::capture("Recording ended without a stop"))?;
        self.emit(RecordingEvent::Stopped {
            reason: stopped.reason,
            position_secs: stopped.drift.actual_secs,
        });

        let file = controller.finalize(host)?;
        let delivered = deliver(&file, targets).await;
        controller.complete();
        let delivery = delivered?;
        self.emit(RecordingEvent::Delivered {
            delivery: delivery.clone(),
        });

        Ok(RecordingReport {
            file_name: file.file_name,
            mime_type: file.mime_type,
            bytes: file.bytes.len(),
            stop_reason: stopped.reason,
            drift_ms: stopped.drift.drift_ms(),
            delivery,
            stats: controller.stats().clone(),
        })
    }

    /// Loop the preview until playback pauses or the stop handle fires.
    ///
    /// Returns the number of frames drawn.
    pub async fn preview<H, M, S>(
        &self,
        host: &mut H,
        controller: &mut CaptureController<M, S>,
    ) -> VivitagResult<u64>
    where
        H: ProjectHost + ?Sized,
        M: MediaElement,
        S: EncodingSink,
    {
        self.stop.reset();
        controller.play(host)?;
        let mut frames = tokio::time::interval(self.defaults.frame_interval());
        frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut drawn = 0;
        while !self.stop.is_stopped() {
            frames.tick().await;
            match controller.render_tick(&*host) {
                FrameOutcome::Rendered { .. } => drawn += 1,
                FrameOutcome::Skipped => {}
                FrameOutcome::Stopped => break,
            }
        }
        if controller.state() == CaptureState::Previewing {
            controller.pause();
        }
        tracing::debug!(frames = drawn, "Preview loop ended");
        Ok(drawn)
    }
}
