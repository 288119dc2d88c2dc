//! Shared test utilities: stub providers, an orchestrator over a temporary
//! upload directory, and polling helpers.
#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Semaphore;
use tokio::time::sleep;
use uuid::Uuid;

use resale_price_checker::app_state::AppState;
use resale_price_checker::models::item::ItemDescription;
use resale_price_checker::models::job::Job;
use resale_price_checker::services::orchestrator::{Orchestrator, OrchestratorSettings, Upload};
use resale_price_checker::services::providers::{
    IdentificationProvider, Listing, MarketLookupProvider, ProviderError,
};
use resale_price_checker::services::registry::{InMemoryJobRegistry, JobRegistry};
use resale_price_checker::services::storage::{ArtifactStore, LocalArtifactStore, StorageError};

/// Minimal PNG signature; enough for format sniffing.
pub const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13];

pub fn book_item() -> ItemDescription {
    ItemDescription {
        name: "Programming Book".to_string(),
        series: "Technical Manual".to_string(),
        year: "2022".to_string(),
        condition: "Good".to_string(),
    }
}

/// Three listings priced 350, 450 and 280 baht.
pub fn book_listings() -> Vec<Listing> {
    vec![
        Listing {
            title: "Programming Book มือสอง สภาพดี 350 ฿".to_string(),
            link: Some("https://marketplace.example/1".to_string()),
            snippet: None,
        },
        Listing {
            title: "Technical Manual Second Hand".to_string(),
            link: Some("https://shopee.example/2".to_string()),
            snippet: Some("ราคา ฿450 ส่งฟรี".to_string()),
        },
        Listing {
            title: "Educational Book มือสอง 280 ฿".to_string(),
            link: None,
            snippet: None,
        },
    ]
}

pub fn image_upload(name: &str, bytes: &[u8]) -> Upload {
    Upload {
        file_name: name.to_string(),
        content_type: Some("image/png".to_string()),
        bytes: bytes.to_vec(),
    }
}

/// Identifier returning a fixed item and recording the images it saw.
pub struct StubIdentifier {
    pub item: ItemDescription,
    pub seen: Mutex<Vec<Vec<u8>>>,
}

impl StubIdentifier {
    pub fn new(item: ItemDescription) -> Self {
        Self {
            item,
            seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl IdentificationProvider for StubIdentifier {
    async fn identify(&self, image: &[u8]) -> Result<ItemDescription, ProviderError> {
        self.seen.lock().unwrap().push(image.to_vec());
        Ok(self.item.clone())
    }
}

pub struct FailingIdentifier;

#[async_trait]
impl IdentificationProvider for FailingIdentifier {
    async fn identify(&self, _image: &[u8]) -> Result<ItemDescription, ProviderError> {
        Err(ProviderError::Status {
            status: 503,
            body: "model unavailable".to_string(),
        })
    }
}

/// Fails the first `failures` calls, then succeeds.
pub struct FlakyIdentifier {
    pub failures: usize,
    pub calls: AtomicUsize,
}

#[async_trait]
impl IdentificationProvider for FlakyIdentifier {
    async fn identify(&self, _image: &[u8]) -> Result<ItemDescription, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            Err(ProviderError::Parse("garbled reply".to_string()))
        } else {
            Ok(book_item())
        }
    }
}

/// Blocks every call until the test adds permits to `gate`. Calls are
/// released in arrival order; `entered` counts arrivals.
pub struct GatedIdentifier {
    pub gate: Arc<Semaphore>,
    pub entered: AtomicUsize,
}

impl GatedIdentifier {
    pub fn new(gate: Arc<Semaphore>) -> Self {
        Self {
            gate,
            entered: AtomicUsize::new(0),
        }
    }

    /// Poll until `n` calls have reached the gate (5 s timeout).
    pub async fn wait_for_entries(&self, n: usize) {
        for _ in 0..500 {
            if self.entered.load(Ordering::SeqCst) >= n {
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!("only {} calls reached the gate", self.entered.load(Ordering::SeqCst));
    }
}

#[async_trait]
impl IdentificationProvider for GatedIdentifier {
    async fn identify(&self, _image: &[u8]) -> Result<ItemDescription, ProviderError> {
        self.entered.fetch_add(1, Ordering::SeqCst);
        let permit = self.gate.acquire().await.expect("gate closed");
        permit.forget();
        Ok(book_item())
    }
}

/// Market returning fixed listings and recording the queries.
pub struct StubMarket {
    pub listings: Vec<Listing>,
    pub queries: Mutex<Vec<String>>,
}

impl StubMarket {
    pub fn new(listings: Vec<Listing>) -> Self {
        Self {
            listings,
            queries: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl MarketLookupProvider for StubMarket {
    async fn search(&self, query: &str) -> Result<Vec<Listing>, ProviderError> {
        self.queries.lock().unwrap().push(query.to_string());
        Ok(self.listings.clone())
    }
}

/// Never answers.
pub struct HangingMarket;

#[async_trait]
impl MarketLookupProvider for HangingMarket {
    async fn search(&self, _query: &str) -> Result<Vec<Listing>, ProviderError> {
        std::future::pending().await
    }
}

/// Store whose writes always fail.
pub struct BrokenStore;

#[async_trait]
impl ArtifactStore for BrokenStore {
    async fn save(&self, _: Uuid, _: &str, _: &[u8]) -> Result<String, StorageError> {
        Err(StorageError::Config("disk full".to_string()))
    }

    async fn read(&self, location: &str) -> Result<Vec<u8>, StorageError> {
        Err(StorageError::NotFound(location.to_string()))
    }

    async fn delete(&self, _: &str) -> Result<bool, StorageError> {
        Ok(false)
    }

    async fn delete_all(&self, _: Uuid) -> Result<bool, StorageError> {
        Ok(false)
    }

    async fn health_check(&self) -> Result<(), StorageError> {
        Err(StorageError::Config("disk full".to_string()))
    }
}

pub struct Harness {
    pub dir: TempDir,
    pub store: Arc<LocalArtifactStore>,
    pub registry: Arc<InMemoryJobRegistry>,
    pub orchestrator: Orchestrator,
}

impl Harness {
    pub fn state(&self) -> AppState {
        AppState::new(self.orchestrator.clone())
    }

    /// Number of job scopes present in the upload directory.
    pub fn stored_scopes(&self) -> usize {
        std::fs::read_dir(self.store.base_dir())
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

pub fn fast_settings() -> OrchestratorSettings {
    OrchestratorSettings {
        provider_timeout: Duration::from_secs(5),
        ..OrchestratorSettings::default()
    }
}

pub fn harness_with(
    identifier: Arc<dyn IdentificationProvider>,
    market: Arc<dyn MarketLookupProvider>,
    settings: OrchestratorSettings,
) -> Harness {
    let dir = TempDir::new().expect("temp dir");
    let store = Arc::new(LocalArtifactStore::new(dir.path().join("uploads")).expect("store"));
    let registry = Arc::new(InMemoryJobRegistry::new());
    let orchestrator = Orchestrator::new(
        registry.clone() as Arc<dyn JobRegistry>,
        store.clone() as Arc<dyn ArtifactStore>,
        identifier,
        market,
        settings,
    );
    Harness {
        dir,
        store,
        registry,
        orchestrator,
    }
}

/// Orchestrator with the book stubs: every job completes at 280-450 THB.
pub fn book_harness() -> Harness {
    harness_with(
        Arc::new(StubIdentifier::new(book_item())),
        Arc::new(StubMarket::new(book_listings())),
        fast_settings(),
    )
}

/// Poll until the job reaches a terminal state (5 s timeout).
pub async fn wait_for_terminal(orchestrator: &Orchestrator, id: Uuid) -> Job {
    for _ in 0..500 {
        let job = orchestrator.get(id).await.expect("job exists");
        if job.status.is_terminal() {
            return job;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("job {} did not reach a terminal state", id);
}

/// Poll until no background execution is scheduled or running (5 s timeout).
pub async fn wait_for_idle(orchestrator: &Orchestrator) {
    for _ in 0..500 {
        if orchestrator.in_flight() == 0 {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("background executions did not drain");
}
