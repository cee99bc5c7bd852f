//! Fetch-and-store orchestration
//!
//! For every coordinate: build the URL, acquire a token, fetch the forecast
//! with the shared client and write it to the sink. A coordinate that fails
//! at any stage is logged and skipped; the run always visits every coordinate
//! exactly once.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, instrument, warn};

use crate::auth::{MeteomaticsTokenProvider, ProviderCredentials, RunScopedTokenSource, TokenSource};
use crate::config::{IngestConfig, TokenReuse};
use crate::models::{Coordinate, ForecastArtifact};
use crate::registry::CoordinateRegistry;
use crate::storage::{AzureBlobSink, BlobSink};
use crate::weather::ForecastClient;
use crate::weather::request;

/// Source of "now" for request windows
pub type Clock = fn() -> DateTime<Utc>;

/// Per-run orchestrator over a fixed set of collaborators
pub struct ForecastIngestor {
    forecasts: ForecastClient,
    tokens: Arc<dyn TokenSource>,
    sink: Arc<dyn BlobSink>,
    container: String,
    max_concurrency: usize,
    clock: Clock,
}

impl ForecastIngestor {
    pub fn new(
        forecasts: ForecastClient,
        tokens: Arc<dyn TokenSource>,
        sink: Arc<dyn BlobSink>,
        container: impl Into<String>,
    ) -> Self {
        Self {
            forecasts,
            tokens,
            sink,
            container: container.into(),
            max_concurrency: 1,
            clock: Utc::now,
        }
    }

    /// Process up to `n` coordinates at once (minimum 1)
    #[must_use]
    pub fn with_max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n.max(1);
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Token, fetch and store for a single coordinate
    #[instrument(name = "coordinate", skip_all, fields(coordinate = %coordinate.name))]
    pub async fn process_coordinate(
        &self,
        coordinate: &Coordinate,
        credentials: &ProviderCredentials,
    ) -> crate::Result<ForecastArtifact> {
        let now = (self.clock)();
        let url = request::build_url(self.forecasts.base_url(), coordinate, now);

        let token = self.tokens.acquire_token(credentials).await?;
        let url = request::with_access_token(&url, &token);

        let content = self.forecasts.fetch(&url).await?;
        debug!(content = %content, "Received Meteomatics weather data");

        let artifact = ForecastArtifact::new(coordinate, content, now);
        self.sink
            .put(&self.container, &artifact.blob_name, &artifact.content)
            .await?;

        Ok(artifact)
    }

    /// Process every coordinate; failures are logged and never abort the batch
    pub async fn process_all(&self, coordinates: &[Coordinate], credentials: &ProviderCredentials) {
        let started = Instant::now();

        let written = stream::iter(coordinates)
            .map(|coordinate| async move {
                match self.process_coordinate(coordinate, credentials).await {
                    Ok(artifact) => {
                        info!(
                            coordinate = %coordinate.name,
                            blob = %artifact.blob_name,
                            bytes = artifact.len(),
                            window_start = %artifact.window_start.to_rfc3339(),
                            "Stored forecast in {}/{}",
                            self.container,
                            artifact.blob_name
                        );
                        true
                    }
                    Err(e) => {
                        error!(
                            coordinate = %coordinate.name,
                            stage = %e.stage(),
                            "Skipping {} ({}): {}",
                            coordinate.name,
                            coordinate.format_coordinates(),
                            e
                        );
                        false
                    }
                }
            })
            .buffered(self.max_concurrency)
            .filter(|ok| futures::future::ready(*ok))
            .count()
            .await;

        let failed = coordinates.len() - written;
        if failed > 0 {
            warn!(
                attempted = coordinates.len(),
                written, failed, "Run finished with failures in {:.3}s",
                started.elapsed().as_secs_f64()
            );
        } else {
            info!(
                attempted = coordinates.len(),
                written, "Run finished in {:.3}s",
                started.elapsed().as_secs_f64()
            );
        }
    }
}

/// Process-lifetime service: owns the shared data-fetch client and runs on demand
pub struct IngestService {
    config: IngestConfig,
    registry: CoordinateRegistry,
    forecasts: ForecastClient,
    token_provider: Arc<dyn TokenSource>,
    sink_override: Option<Arc<dyn BlobSink>>,
    clock: Clock,
}

impl IngestService {
    /// Build the long-lived clients from validated configuration
    pub fn new(config: IngestConfig) -> crate::Result<Self> {
        let registry = config.registry()?;
        let forecasts = ForecastClient::new(
            config.provider.api_base_url.clone(),
            Duration::from_secs(config.provider.timeout_seconds.into()),
        )?;
        let token_provider = Arc::new(MeteomaticsTokenProvider::new(
            config.provider.token_url.clone(),
            Duration::from_secs(config.provider.timeout_seconds.into()),
        ));

        Ok(Self {
            config,
            registry,
            forecasts,
            token_provider,
            sink_override: None,
            clock: Utc::now,
        })
    }

    /// Write to `sink` instead of the configured storage account
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn BlobSink>) -> Self {
        self.sink_override = Some(sink);
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// One run over the registry
    ///
    /// Returns an error only when the run was aborted before any network call
    /// (missing secrets or unusable storage settings). Per-coordinate failures
    /// are logged and do not surface here.
    #[instrument(name = "run", skip(self))]
    pub async fn run_once(&self) -> crate::Result<()> {
        info!("Ingestion run triggered at {}", Utc::now().to_rfc3339());

        let credentials = self.config.check_preconditions()?;

        let sink = match &self.sink_override {
            Some(sink) => sink.clone(),
            None => Arc::new(AzureBlobSink::from_connection_string(
                &credentials.storage_connection,
                Duration::from_secs(self.config.storage.timeout_seconds.into()),
            )?) as Arc<dyn BlobSink>,
        };

        let tokens: Arc<dyn TokenSource> = match self.config.provider.token_reuse {
            TokenReuse::PerCoordinate => self.token_provider.clone(),
            TokenReuse::PerRun => Arc::new(RunScopedTokenSource::new(self.token_provider.clone())),
        };

        let ingestor = ForecastIngestor::new(
            self.forecasts.clone(),
            tokens,
            sink,
            self.config.storage.container.clone(),
        )
        .with_max_concurrency(self.config.ingest.max_concurrency)
        .with_clock(self.clock);

        ingestor
            .process_all(self.registry.as_slice(), &credentials.provider)
            .await;
        Ok(())
    }
}
