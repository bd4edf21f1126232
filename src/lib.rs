pub mod ai;
pub mod audio;
pub mod capture;
pub mod capture_loop;
pub mod context;
pub mod policy;
pub mod settings;

use std::sync::Arc;
use std::time::Duration;

use ai::chat::ChatClient;
use ai::classifier::VisionClassifier;
use ai::summarizer::VibeSummarizer;
use capture::folder::FolderCamera;
use capture_loop::{LoopConfig, LoopController, LoopError, LoopEvent};
use context::{ContextStore, FileStore};
use settings::{ConfigError, EnvSecretStore, Settings};

const DEFAULT_MAX_ZOOM: f32 = 5.0;

/// Set up `env_logger`, honouring `RUST_LOG` and defaulting to `info`.
/// Safe to call more than once.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}

/// Desktop host: load settings and context, resolve the vibe, then run the
/// loop on the folder camera until Ctrl-C or a camera failure.
pub async fn run() -> Result<(), LoopError> {
    let settings_path = Settings::default_path();
    let settings = Settings::load(&settings_path)?;
    let api_key = settings.api_key(&EnvSecretStore)?;

    let store = ContextStore::new(FileStore::new(&settings.context_path));
    let (context, _) = store.load()?;
    let context = context.ok_or(ConfigError::MissingField(
        "business context (run `warmr context <BUSINESS> <CUSTOMER>` first)",
    ))?;

    let chat = Arc::new(
        ChatClient::new(&settings.api_base, api_key, settings.request_timeout_secs)
            .map_err(LoopError::Client)?,
    );

    let summarizer = VibeSummarizer::new(Arc::clone(&chat), settings.summarizer.clone());
    let vibe = match store.resolve_vibe(&context, &summarizer).await {
        Ok(vibe) => Some(vibe),
        Err(e) => {
            log::warn!("No vibe summary ({}), classifying with the default question", e);
            None
        }
    };

    let classifier = VisionClassifier::new(
        chat,
        settings.classifier.clone(),
        settings.default_question.clone(),
    )
    .with_image_limits(settings.max_image_width, settings.jpeg_quality);

    let camera = FolderCamera::new(
        &settings.capture_dir,
        settings.max_zoom.unwrap_or(DEFAULT_MAX_ZOOM),
    );

    let controller = LoopController::new(
        Box::new(camera),
        Arc::new(classifier),
        Arc::new(audio::LogCuePlayer),
        LoopConfig {
            policy: settings.policy.clone(),
            classify_timeout: Duration::from_secs(settings.classify_timeout_secs),
            archive_dir: settings.archive_dir.clone(),
        },
    );
    controller.set_vibe(vibe);

    let mut events = controller.subscribe();
    controller.start().await?;

    let halted = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                log::info!("Ctrl-C received, stopping");
                break None;
            }
            event = events.recv() => match event {
                Ok(LoopEvent::Halted { reason, .. }) => break Some(reason),
                Ok(_) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    log::debug!("Event listener lagged by {} events", n);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break None,
            }
        }
    };

    controller.stop().await;
    match halted {
        Some(reason) => Err(LoopError::Halted(reason)),
        None => Ok(()),
    }
}

/// Store a new business context, dropping any vibe cached for the old one.
pub fn save_context(business: &str, customer: &str) -> Result<(), ConfigError> {
    let settings = Settings::load(&Settings::default_path())?;
    let context = context::BusinessContext::new(business, customer)?;
    ContextStore::new(FileStore::new(&settings.context_path)).save_context(&context)?;
    println!("Business context saved to {}", settings.context_path.display());
    Ok(())
}
