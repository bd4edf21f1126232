// context.rs — The user's business context and the vibe summary derived
// from it, persisted through a key-value collaborator.
//
// The cached vibe is stored next to a copy of the context it was derived
// from, so editing the context invalidates the cache.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::ai::{AiError, Summarizer, VibeSummary};
use crate::settings::ConfigError;

const KEY_BUSINESS: &str = "businessInfo";
const KEY_CUSTOMER: &str = "idealCustomerInfo";
const KEY_VIBE: &str = "vibeSummary";
const KEY_VIBE_SOURCE: &str = "vibeSource";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessContext {
    business_description: String,
    ideal_customer_description: String,
}

impl BusinessContext {
    pub fn new(
        business_description: impl Into<String>,
        ideal_customer_description: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let business_description = business_description.into();
        let ideal_customer_description = ideal_customer_description.into();
        if business_description.trim().is_empty() {
            return Err(ConfigError::MissingField("business description"));
        }
        if ideal_customer_description.trim().is_empty() {
            return Err(ConfigError::MissingField("ideal customer description"));
        }
        Ok(Self {
            business_description,
            ideal_customer_description,
        })
    }

    pub fn business_description(&self) -> &str {
        &self.business_description
    }

    pub fn ideal_customer_description(&self) -> &str {
        &self.ideal_customer_description
    }

    fn source_key(&self) -> Result<String, ConfigError> {
        serde_json::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

/// Persistence collaborator: string values by string key.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, ConfigError>;
    fn set(&self, key: &str, value: &str) -> Result<(), ConfigError>;
    fn remove(&self, key: &str) -> Result<(), ConfigError>;
}

#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, ConfigError> {
        Ok(self.values.lock().unwrap().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), ConfigError> {
        self.values.lock().unwrap().remove(key);
        Ok(())
    }
}

/// A flat TOML table on disk, rewritten on every change.
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, ConfigError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&self.path).map_err(|source| self.io_error(source))?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    fn write_all(&self, values: &BTreeMap<String, String>) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(values).map_err(|e| ConfigError::Parse(e.to_string()))?;
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|source| self.io_error(source))?;
        }
        fs::write(&self.path, content).map_err(|source| self.io_error(source))
    }

    fn io_error(&self, source: std::io::Error) -> ConfigError {
        ConfigError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, ConfigError> {
        let _guard = self.lock.lock().unwrap();
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ConfigError> {
        let _guard = self.lock.lock().unwrap();
        let mut values = self.read_all()?;
        values.insert(key.to_string(), value.to_string());
        self.write_all(&values)
    }

    fn remove(&self, key: &str) -> Result<(), ConfigError> {
        let _guard = self.lock.lock().unwrap();
        let mut values = self.read_all()?;
        if values.remove(key).is_some() {
            self.write_all(&values)?;
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Summarizer failed: {0}")]
    Summarizer(#[from] AiError),
}

pub struct ContextStore<S: KeyValueStore> {
    store: S,
}

impl<S: KeyValueStore> ContextStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Stored context and, if it was derived from that context, the cached vibe.
    pub fn load(&self) -> Result<(Option<BusinessContext>, Option<VibeSummary>), ConfigError> {
        let business = self.store.get(KEY_BUSINESS)?;
        let customer = self.store.get(KEY_CUSTOMER)?;
        let context = match (business, customer) {
            (Some(b), Some(c)) => BusinessContext::new(b, c).ok(),
            _ => None,
        };

        let vibe = match &context {
            Some(ctx) => self.cached_vibe_for(ctx)?,
            None => None,
        };
        Ok((context, vibe))
    }

    pub fn save(&self, context: &BusinessContext, vibe: &VibeSummary) -> Result<(), ConfigError> {
        self.write_context(context)?;
        self.store.set(KEY_VIBE, vibe.as_str())?;
        self.store.set(KEY_VIBE_SOURCE, &context.source_key()?)?;
        log::info!("Business context and vibe summary saved");
        Ok(())
    }

    /// Store `context`; a cached vibe derived from other text is dropped.
    pub fn save_context(&self, context: &BusinessContext) -> Result<(), ConfigError> {
        self.write_context(context)?;
        if self.cached_vibe_for(context)?.is_none() {
            self.store.remove(KEY_VIBE)?;
            self.store.remove(KEY_VIBE_SOURCE)?;
            log::info!("Business context changed, cached vibe summary invalidated");
        }
        Ok(())
    }

    /// Cached vibe for `context`, or a fresh one from `summarizer` (then cached).
    pub async fn resolve_vibe(
        &self,
        context: &BusinessContext,
        summarizer: &dyn Summarizer,
    ) -> Result<VibeSummary, ContextError> {
        if let Some(vibe) = self.cached_vibe_for(context)? {
            log::info!("Using cached vibe summary");
            return Ok(vibe);
        }
        let vibe = summarizer.summarize(context).await?;
        self.save(context, &vibe)?;
        Ok(vibe)
    }

    fn write_context(&self, context: &BusinessContext) -> Result<(), ConfigError> {
        self.store.set(KEY_BUSINESS, context.business_description())?;
        self.store.set(KEY_CUSTOMER, context.ideal_customer_description())
    }

    fn cached_vibe_for(&self, context: &BusinessContext) -> Result<Option<VibeSummary>, ConfigError> {
        let source = self.store.get(KEY_VIBE_SOURCE)?;
        if source.as_deref() != Some(context.source_key()?.as_str()) {
            return Ok(None);
        }
        Ok(self.store.get(KEY_VIBE)?.map(VibeSummary::new))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSummarizer {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Summarizer for CountingSummarizer {
        async fn summarize(&self, context: &BusinessContext) -> Result<VibeSummary, AiError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(VibeSummary::new(format!(
                "vibe #{} for {}",
                n,
                context.business_description()
            )))
        }
    }

    struct FailingSummarizer;

    #[async_trait]
    impl Summarizer for FailingSummarizer {
        async fn summarize(&self, _context: &BusinessContext) -> Result<VibeSummary, AiError> {
            Err(AiError::ConnectionError("offline".into()))
        }
    }

    fn counting() -> CountingSummarizer {
        CountingSummarizer {
            calls: AtomicUsize::new(0),
        }
    }

    #[test]
    fn empty_fields_are_rejected() {
        assert!(matches!(
            BusinessContext::new("  ", "families"),
            Err(ConfigError::MissingField(_))
        ));
        assert!(BusinessContext::new("bakery", "").is_err());
    }

    #[test]
    fn first_run_loads_nothing() {
        let store = ContextStore::new(MemoryStore::new());
        let (ctx, vibe) = store.load().unwrap();
        assert!(ctx.is_none());
        assert!(vibe.is_none());
    }

    #[test]
    fn save_then_load() {
        let store = ContextStore::new(MemoryStore::new());
        let ctx = BusinessContext::new("bakery", "families with young children").unwrap();
        store.save(&ctx, &VibeSummary::new("cozy")).unwrap();

        let (loaded_ctx, loaded_vibe) = store.load().unwrap();
        assert_eq!(loaded_ctx, Some(ctx));
        assert_eq!(loaded_vibe, Some(VibeSummary::new("cozy")));
    }

    #[tokio::test]
    async fn resolve_vibe_summarizes_once() {
        let store = ContextStore::new(MemoryStore::new());
        let summarizer = counting();
        let ctx = BusinessContext::new("bakery", "families with young children").unwrap();

        let first = store.resolve_vibe(&ctx, &summarizer).await.unwrap();
        let second = store.resolve_vibe(&ctx, &summarizer).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(summarizer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn editing_context_invalidates_vibe() {
        let store = ContextStore::new(MemoryStore::new());
        let summarizer = counting();
        let bakery = BusinessContext::new("bakery", "families").unwrap();
        store.resolve_vibe(&bakery, &summarizer).await.unwrap();

        let gym = BusinessContext::new("gym", "early risers").unwrap();
        store.save_context(&gym).unwrap();
        let (_, cached) = store.load().unwrap();
        assert!(cached.is_none());

        let vibe = store.resolve_vibe(&gym, &summarizer).await.unwrap();
        assert_eq!(vibe.as_str(), "vibe #2 for gym");
        assert_eq!(summarizer.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn resaving_same_context_keeps_vibe() {
        let store = ContextStore::new(MemoryStore::new());
        let summarizer = counting();
        let ctx = BusinessContext::new("bakery", "families").unwrap();
        store.resolve_vibe(&ctx, &summarizer).await.unwrap();

        store.save_context(&ctx).unwrap();
        let (_, cached) = store.load().unwrap();
        assert_eq!(cached, Some(VibeSummary::new("vibe #1 for bakery")));
    }

    #[tokio::test]
    async fn summarizer_failure_is_not_cached() {
        let store = ContextStore::new(MemoryStore::new());
        let ctx = BusinessContext::new("bakery", "families").unwrap();
        let err = store.resolve_vibe(&ctx, &FailingSummarizer).await.unwrap_err();
        assert!(matches!(err, ContextError::Summarizer(_)));
        let (_, cached) = store.load().unwrap();
        assert!(cached.is_none());
    }

    #[test]
    fn file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("context.toml");
        let ctx = BusinessContext::new("bakery", "families with \"young\" children").unwrap();

        ContextStore::new(FileStore::new(&path))
            .save(&ctx, &VibeSummary::new("warm\nand bright"))
            .unwrap();

        let (loaded_ctx, loaded_vibe) = ContextStore::new(FileStore::new(&path)).load().unwrap();
        assert_eq!(loaded_ctx, Some(ctx));
        assert_eq!(loaded_vibe, Some(VibeSummary::new("warm\nand bright")));
    }

    #[test]
    fn file_store_remove_missing_key_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("kv.toml"));
        store.remove("nothing").unwrap();
        store.set("a", "1").unwrap();
        store.remove("a").unwrap();
        assert_eq!(store.get("a").unwrap(), None);
    }
}
