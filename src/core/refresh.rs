use crate::domain::ports::Pipeline;
use crate::utils::error::Result;
use std::time::Instant;

pub struct RefreshEngine<P: Pipeline> {
    pipeline: P,
}

impl<P: Pipeline> RefreshEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self { pipeline }
    }

    /// Returns the number of rows loaded.
    pub async fn run(&self) -> Result<usize> {
        let started = Instant::now();
        tracing::info!("Starting refresh...");

        // Extract
        tracing::debug!("Extracting data...");
        let raw_data = self.pipeline.extract().await?;
        tracing::info!("Extracted {} bytes", raw_data.len());

        // Transform
        tracing::debug!("Transforming data...");
        let transformed = self.pipeline.transform(raw_data).await?;
        tracing::info!(
            "Transformed {} records with {} columns",
            transformed.records.len(),
            transformed.columns.len()
        );

        // Load
        tracing::debug!("Loading data...");
        let loaded = self.pipeline.load(transformed).await?;
        tracing::info!(
            "Loaded {} rows in {:.2}s",
            loaded,
            started.elapsed().as_secs_f64()
        );

        Ok(loaded)
    }
}
