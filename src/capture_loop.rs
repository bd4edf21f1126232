// capture_loop.rs — Orchestrates the capture → classify → decide → schedule loop.
//
// One tokio task per run. Each cycle takes a photo, waits for the classifier,
// looks the outcome up in the decision policy, plays the scheduled cues and
// sleeps until the next capture. The whole cycle future is raced against the
// run's cancellation token, so `stop()` drops every pending step at once.

use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::{broadcast, Mutex as TokioMutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::ai::{AiError, ClassificationResult, ImageClassifier, VibeSummary};
use crate::audio::CuePlayer;
use crate::capture::{clamp_focus, clamp_zoom, Camera, CaptureError};
use crate::policy::{DecisionPolicy, Outcome, Schedule};
use crate::settings::ConfigError;

type SharedCamera = Arc<TokioMutex<Box<dyn Camera>>>;

#[derive(Debug, thiserror::Error)]
pub enum LoopError {
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("HTTP client setup failed: {0}")]
    Client(AiError),
    #[error("Capture loop halted: {0}")]
    Halted(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LoopPhase {
    Idle,
    Capturing,
    Classifying,
    Deciding,
    Scheduled,
    Halted,
}

/// Loop progress. Reset on every `start()`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopState {
    pub phase: LoopPhase,
    pub cycle: u64,
    pub last_outcome: Option<Outcome>,
    pub last_decision: Option<ClassificationResult>,
    #[serde(skip)]
    pub next_capture_deadline: Option<Instant>,
    pub halted_reason: Option<String>,
}

impl Default for LoopState {
    fn default() -> Self {
        Self {
            phase: LoopPhase::Idle,
            cycle: 0,
            last_outcome: None,
            last_decision: None,
            next_capture_deadline: None,
            halted_reason: None,
        }
    }
}

/// Emitted on the controller's broadcast channel. `generation` identifies the run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum LoopEvent {
    PhaseChanged {
        generation: u64,
        phase: LoopPhase,
    },
    CaptureCompleted {
        generation: u64,
        cycle: u64,
        bytes: usize,
    },
    Decision {
        generation: u64,
        cycle: u64,
        outcome: Outcome,
        justification: Option<String>,
    },
    CuePlayed {
        generation: u64,
        cycle: u64,
        cue: String,
    },
    Halted {
        generation: u64,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub policy: DecisionPolicy,
    pub classify_timeout: Duration,
    pub archive_dir: Option<PathBuf>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            policy: DecisionPolicy::default(),
            classify_timeout: Duration::from_secs(45),
            archive_dir: None,
        }
    }
}

struct RunHandle {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct LoopController {
    camera: SharedCamera,
    classifier: Arc<dyn ImageClassifier>,
    cues: Arc<dyn CuePlayer>,
    config: LoopConfig,
    vibe: Arc<RwLock<Option<VibeSummary>>>,
    state: Arc<Mutex<LoopState>>,
    run: TokioMutex<Option<RunHandle>>,
    generation: AtomicU64,
    events: broadcast::Sender<LoopEvent>,
}

impl LoopController {
    pub fn new(
        camera: Box<dyn Camera>,
        classifier: Arc<dyn ImageClassifier>,
        cues: Arc<dyn CuePlayer>,
        config: LoopConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            camera: Arc::new(TokioMutex::new(camera)),
            classifier,
            cues,
            config,
            vibe: Arc::new(RwLock::new(None)),
            state: Arc::new(Mutex::new(LoopState::default())),
            run: TokioMutex::new(None),
            generation: AtomicU64::new(0),
            events,
        }
    }

    /// Vibe used for subsequent classifications; `None` means the default question.
    pub fn set_vibe(&self, vibe: Option<VibeSummary>) {
        *self.vibe.write().unwrap() = vibe;
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LoopEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> LoopState {
        self.state.lock().unwrap().clone()
    }

    /// Run counter; bumped on every `start()` that launches a new run.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub async fn is_running(&self) -> bool {
        self.run
            .lock()
            .await
            .as_ref()
            .map(|r| !r.handle.is_finished())
            .unwrap_or(false)
    }

    /// Start the camera session and the loop task. No-op while a run is active.
    pub async fn start(&self) -> Result<(), LoopError> {
        let mut run = self.run.lock().await;
        if let Some(active) = run.as_ref() {
            if !active.handle.is_finished() {
                log::debug!("Capture loop already running");
                return Ok(());
            }
        }
        if let Some(halted) = run.take() {
            let _ = halted.handle.await;
            self.camera.lock().await.stop_session().await;
        }

        self.camera.lock().await.start_session().await?;

        *self.state.lock().unwrap() = LoopState::default();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let token = CancellationToken::new();

        let runner = Runner {
            generation,
            camera: Arc::clone(&self.camera),
            classifier: Arc::clone(&self.classifier),
            cues: Arc::clone(&self.cues),
            config: self.config.clone(),
            vibe: Arc::clone(&self.vibe),
            state: Arc::clone(&self.state),
            events: self.events.clone(),
        };
        let handle = tokio::spawn(runner.run(token.clone()));
        *run = Some(RunHandle { token, handle });
        log::info!("Capture loop started (generation {})", generation);
        Ok(())
    }

    /// Cancel the run, wait for its task and stop the camera session.
    pub async fn stop(&self) {
        let mut run = self.run.lock().await;
        let Some(active) = run.take() else {
            return;
        };
        active.token.cancel();
        if let Err(e) = active.handle.await {
            log::error!("Capture loop task failed: {}", e);
        }
        self.camera.lock().await.stop_session().await;

        {
            let mut state = self.state.lock().unwrap();
            state.phase = LoopPhase::Idle;
            state.next_capture_deadline = None;
        }
        emit(
            &self.events,
            LoopEvent::PhaseChanged {
                generation: self.generation(),
                phase: LoopPhase::Idle,
            },
        );
        log::info!("Capture loop stopped");
    }

    /// Set the zoom factor, clamped to the device range. Returns the applied factor.
    /// Waits for any capture in progress.
    pub async fn set_zoom(&self, factor: f32) -> Result<f32, CaptureError> {
        let mut camera = self.camera.lock().await;
        let applied = clamp_zoom(factor, camera.max_zoom());
        camera.set_zoom(applied).await?;
        log::info!("Zoom set to {:.2}x (requested {:.2}x)", applied, factor);
        Ok(applied)
    }

    /// Set the focus point in normalized coordinates. Waits for any capture in progress.
    pub async fn set_focus_point(&self, x: f32, y: f32) -> Result<(), CaptureError> {
        let mut camera = self.camera.lock().await;
        camera.set_focus_point(clamp_focus(x), clamp_focus(y)).await
    }
}

/// Everything one run's task owns.
struct Runner {
    generation: u64,
    camera: SharedCamera,
    classifier: Arc<dyn ImageClassifier>,
    cues: Arc<dyn CuePlayer>,
    config: LoopConfig,
    vibe: Arc<RwLock<Option<VibeSummary>>>,
    state: Arc<Mutex<LoopState>>,
    events: broadcast::Sender<LoopEvent>,
}

impl Runner {
    async fn run(self, token: CancellationToken) {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                log::debug!("Capture loop generation {} cancelled", self.generation);
            }
            err = self.cycles() => {
                log::error!("Capture loop halted: {}", err);
                {
                    let mut state = self.state.lock().unwrap();
                    state.phase = LoopPhase::Halted;
                    state.next_capture_deadline = None;
                    state.halted_reason = Some(err.to_string());
                }
                self.emit(LoopEvent::Halted {
                    generation: self.generation,
                    reason: err.to_string(),
                });
            }
        }
    }

    /// Runs cycles until the camera fails.
    async fn cycles(&self) -> CaptureError {
        loop {
            let cycle = {
                let mut state = self.state.lock().unwrap();
                state.cycle += 1;
                state.next_capture_deadline = None;
                state.cycle
            };
            self.set_phase(LoopPhase::Capturing);

            let image = {
                let mut camera = self.camera.lock().await;
                match camera.capture_photo().await {
                    Ok(image) => image,
                    Err(e) => return e,
                }
            };
            self.emit(LoopEvent::CaptureCompleted {
                generation: self.generation,
                cycle,
                bytes: image.len(),
            });
            self.archive(&image, cycle).await;

            self.set_phase(LoopPhase::Classifying);
            let classified = self.classify(&image).await;
            drop(image);

            self.set_phase(LoopPhase::Deciding);
            let outcome = match &classified {
                Some(result) => Outcome::from(result),
                None => Outcome::Error,
            };
            log::info!(
                "Cycle {}: {:?}{}",
                cycle,
                outcome,
                classified
                    .as_ref()
                    .and_then(|r| r.justification.as_deref())
                    .map(|j| format!(" ({})", j))
                    .unwrap_or_default()
            );
            self.emit(LoopEvent::Decision {
                generation: self.generation,
                cycle,
                outcome,
                justification: classified.as_ref().and_then(|r| r.justification.clone()),
            });

            let schedule = self.config.policy.schedule_for(outcome).clone();
            {
                let mut state = self.state.lock().unwrap();
                state.last_outcome = Some(outcome);
                state.last_decision = classified;
                state.next_capture_deadline = Some(Instant::now() + schedule.total());
            }
            self.set_phase(LoopPhase::Scheduled);
            self.play_schedule(&schedule, cycle).await;
        }
    }

    /// `None` on any classifier failure, including the loop-level timeout.
    async fn classify(&self, image: &[u8]) -> Option<ClassificationResult> {
        let vibe = self.vibe.read().unwrap().clone();
        match tokio::time::timeout(
            self.config.classify_timeout,
            self.classifier.classify(image, vibe.as_ref()),
        )
        .await
        {
            Ok(Ok(result)) => Some(result),
            Ok(Err(e)) => {
                log::warn!("Classifier {} failed: {}", self.classifier.name(), e);
                None
            }
            Err(_) => {
                log::warn!(
                    "Classifier {} timed out after {:?}",
                    self.classifier.name(),
                    self.config.classify_timeout
                );
                None
            }
        }
    }

    async fn play_schedule(&self, schedule: &Schedule, cycle: u64) {
        for step in &schedule.cues {
            if !step.delay().is_zero() {
                tokio::time::sleep(step.delay()).await;
            }
            self.cues.play_cue(&step.cue);
            self.emit(LoopEvent::CuePlayed {
                generation: self.generation,
                cycle,
                cue: step.cue.clone(),
            });
        }
        tokio::time::sleep(schedule.next_capture_delay()).await;
    }

    async fn archive(&self, image: &[u8], cycle: u64) {
        let Some(dir) = &self.config.archive_dir else {
            return;
        };
        let path = dir.join(format!("capture-{}-{:05}.jpg", self.generation, cycle));
        let result = match tokio::fs::create_dir_all(dir).await {
            Ok(()) => tokio::fs::write(&path, image).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            log::warn!("Failed to archive capture to {}: {}", path.display(), e);
        }
    }

    fn set_phase(&self, phase: LoopPhase) {
        self.state.lock().unwrap().phase = phase;
        self.emit(LoopEvent::PhaseChanged {
            generation: self.generation,
            phase,
        });
    }

    fn emit(&self, event: LoopEvent) {
        emit(&self.events, event);
    }
}

fn emit(events: &broadcast::Sender<LoopEvent>, event: LoopEvent) {
    log_event_for_testing(&event);
    // No subscribers is fine.
    let _ = events.send(event);
}

/// When `WARMR_TEST_LOG` is set, append the event as a JSONL line to the specified file.
/// No-op when the env var is absent.
fn log_event_for_testing(event: &LoopEvent) {
    if let Ok(path) = std::env::var("WARMR_TEST_LOG") {
        use std::io::Write;
        if let Ok(mut file) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
        {
            let json = serde_json::to_string(event).unwrap_or_default();
            let _ = writeln!(
                file,
                r#"{{"timestampMs":{},"event":{}}}"#,
                unix_millis(),
                json
            );
        }
    }
}

fn unix_millis() -> u128 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}
