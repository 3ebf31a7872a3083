//! Audio processing pipeline.
//!
//! Completed recordings are normalized, spilled to a scratch WAV for
//! forensics, transcribed by the resident engine, and the resulting text
//! is handed to the typist. Jobs run on a single-worker runtime and a
//! collector drains them in submission order, so the engine is never
//! entered twice at once and transcripts come out in the order they were
//! spoken.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::Sender;
use std::time::Instant;

use anyhow::Context;
use parking_lot::RwLock;
use sotto_audio::Recording;
use sotto_core::{APP_NAME, Config, MicState};
use sotto_transcribe::{EngineHost, Transcriber, WhisperEngine, WhisperModel, ensure_model};
use tokio::runtime::Runtime;
use tokio::sync::mpsc::{UnboundedSender, unbounded_channel};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::event::{EventSink, SottoEvent};
use crate::notify::Alerts;

/// Counter for unique spill file names within this process.
static SPILL_SEQ: AtomicU64 = AtomicU64::new(0);

/// What the pipeline did with a submitted recording.
#[derive(Debug)]
pub enum SubmitResult {
    /// A transcription job was dispatched
    Sent,
    /// The capture was empty and skipped
    Discarded,
}

enum JobResult {
    Text(String),
    Failed,
}

type TranscriptionTask = JoinHandle<JobResult>;

/// Processing pipeline for completed recordings.
pub struct TranscribePipeline {
    runtime: Runtime,
    host: Arc<EngineHost>,
    config: Arc<RwLock<Config>>,
    alerts: Arc<dyn Alerts>,
    jobs: UnboundedSender<TranscriptionTask>,
}

impl TranscribePipeline {
    /// Builds the pipeline: spins up the runtime, makes sure the
    /// configured model is on disk (downloading it on first run), loads
    /// it, and starts the results collector.
    ///
    /// Failure here is fatal; the application cannot start without a
    /// resident engine.
    pub fn new(
        config: Arc<RwLock<Config>>,
        alerts: Arc<dyn Alerts>,
        events: Box<dyn EventSink>,
        typist: Sender<String>,
    ) -> anyhow::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .context("Failed to build the pipeline runtime")?;

        let model_name = config.read().model.clone();
        let model = WhisperModel::from_name(&model_name)
            .with_context(|| format!("Unknown model {model_name:?} in config"))?;
        let path = runtime.block_on(ensure_model(model, download_progress(model)))?;
        let engine = WhisperEngine::load(model, &path)?;
        let host = Arc::new(EngineHost::new(Arc::new(engine)));

        Ok(Self::assemble(runtime, host, config, alerts, events, typist))
    }

    /// Pipeline over an already resident engine.
    #[cfg(test)]
    pub(crate) fn with_host(
        config: Arc<RwLock<Config>>,
        alerts: Arc<dyn Alerts>,
        host: Arc<EngineHost>,
        events: Box<dyn EventSink>,
        typist: Sender<String>,
    ) -> Self {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .expect("Failed to build the pipeline runtime");
        Self::assemble(runtime, host, config, alerts, events, typist)
    }

    fn assemble(
        runtime: Runtime,
        host: Arc<EngineHost>,
        config: Arc<RwLock<Config>>,
        alerts: Arc<dyn Alerts>,
        events: Box<dyn EventSink>,
        typist: Sender<String>,
    ) -> Self {
        let jobs = start_results_collector(&runtime, events, typist);
        Self {
            runtime,
            host,
            config,
            alerts,
            jobs,
        }
    }

    /// Submits one completed recording. Non-blocking. An empty capture is
    /// discarded here and never reaches the engine.
    pub fn submit(&self, recording: Recording) -> anyhow::Result<SubmitResult> {
        info!(
            samples = recording.sample_count(),
            sample_rate = recording.sample_rate(),
            length_seconds = recording.duration().as_secs_f64(),
            "audio submitted"
        );

        if recording.is_empty() {
            warn!("No audio captured, skipping transcription");
            return Ok(SubmitResult::Discarded);
        }

        // The engine and language are bound at submission time; a model
        // switch or config change applies to the next utterance.
        let engine = self.host.active();
        let language = self.config.read().language.clone();

        let handle = self.runtime.spawn(transcribe_job(engine, recording, language));
        self.jobs.send(handle)?;
        Ok(SubmitResult::Sent)
    }

    /// Switches the resident model asynchronously.
    ///
    /// The model is downloaded if needed and installed only once it has
    /// loaded; on failure the current engine keeps serving. Overlapping
    /// switch requests are refused by the host.
    pub fn switch_model(&self, model: WhisperModel) {
        if !self.host.begin_switch() {
            return;
        }

        let host = self.host.clone();
        let alerts = self.alerts.clone();
        self.runtime.spawn(async move {
            info!(model = %model, "Switching transcription model");
            match load_engine(model).await {
                Ok(engine) => {
                    host.install(Arc::new(engine));
                    alerts.notify(
                        "Model changed",
                        &format!("Now transcribing with {} ({})", model, model.size_human()),
                    );
                }
                Err(e) => {
                    host.abort_switch();
                    error!("Failed to switch model to {}: {:#}", model, e);
                }
            }
        });
    }
}

async fn load_engine(model: WhisperModel) -> anyhow::Result<WhisperEngine> {
    let path = ensure_model(model, download_progress(model)).await?;
    Ok(WhisperEngine::load(model, &path)?)
}

/// Progress logger for model downloads, roughly one line per 10%.
fn download_progress(model: WhisperModel) -> impl Fn(u64, u64) + Send + 'static {
    let last_decile = AtomicU64::new(0);
    move |downloaded, total| {
        let decile = downloaded * 10 / total.max(1);
        if decile > last_decile.swap(decile, Ordering::Relaxed) {
            info!(model = %model, "Download progress: {}%", decile * 10);
        }
    }
}

fn start_results_collector(
    runtime: &Runtime,
    events: Box<dyn EventSink>,
    typist: Sender<String>,
) -> UnboundedSender<TranscriptionTask> {
    let (task_sender, mut task_receiver) = unbounded_channel::<TranscriptionTask>();

    runtime.spawn(async move {
        while let Some(task) = task_receiver.recv().await {
            match task.await {
                Ok(JobResult::Text(text)) if !text.is_empty() => {
                    info!("Transcription: {}", text);
                    if typist.send(text).is_err() {
                        error!("Typist thread is gone, dropping transcript");
                    }
                }
                Ok(JobResult::Text(_)) => {
                    info!("Transcription produced no text");
                }
                Ok(JobResult::Failed) => {
                    // Already logged by the job, the session just ends
                    // with nothing typed
                }
                Err(e) => {
                    error!("Error joining transcription job: {:?}", e);
                }
            }
            events.emit(SottoEvent::StateChanged(MicState::Idle));
        }

        error!("Results collector task ended unexpectedly");
    });

    task_sender
}

/// One transcription job: normalize, spill, infer, clean up.
async fn transcribe_job(
    engine: Arc<dyn Transcriber>,
    recording: Recording,
    language: Option<String>,
) -> JobResult {
    let sample_rate = recording.sample_rate();
    let samples = recording.into_samples();

    // Keep a copy of exactly what the model heard until the job is done;
    // that is what makes a bad transcript debuggable after the fact.
    let spill = match write_spill(&samples, sample_rate) {
        Ok(path) => path,
        Err(e) => {
            error!("Failed to write audio spill file: {:#}", e);
            return JobResult::Failed;
        }
    };

    let started = Instant::now();
    let result = engine.transcribe(&samples, language.as_deref()).await;
    remove_spill(&spill);

    match result {
        Ok(text) => {
            let text = text.trim().to_string();
            info!(
                duration = ?started.elapsed(),
                chars = text.chars().count(),
                "transcription completed"
            );
            JobResult::Text(text)
        }
        Err(e) => {
            error!("Transcription failed: {}", e);
            JobResult::Failed
        }
    }
}

/// Writes the normalized samples as a WAV in the scratch directory and
/// returns its path. Nothing is left behind on failure.
fn write_spill(samples: &[f32], sample_rate: u32) -> anyhow::Result<PathBuf> {
    let seq = SPILL_SEQ.fetch_add(1, Ordering::Relaxed);
    let path = std::env::temp_dir().join(format!(
        "{}-{}-{}.wav",
        APP_NAME,
        std::process::id(),
        seq
    ));

    if let Err(e) = write_wav(&path, samples, sample_rate) {
        let _ = fs::remove_file(&path);
        return Err(e);
    }

    debug!(path = %path.display(), "Spill file written");
    Ok(path)
}

fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> anyhow::Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };

    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize().context("Failed to finalize WAV file")?;
    Ok(())
}

fn remove_spill(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        warn!(path = %path.display(), "Failed to delete spill file: {}", e);
    }
}
