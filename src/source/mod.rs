//! Cost data sources.
//!
//! A source yields a [`CostDataset`]. The file source reads a saved Cost
//! Explorer document; the AWS CLI source downloads one first when the file
//! is missing (or when a refresh is forced) and caches it on disk.

pub mod cost_explorer;

use crate::analysis::DataError;
use crate::config::SourceConfig;
use crate::external::{AwsCli, UpstreamError};
use crate::models::CostDataset;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

pub use cost_explorer::{cost_explorer_args, parse_cost_document};

/// Errors from obtaining cost data.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cost data download failed: {0}")]
    Fetch(#[from] UpstreamError),
    #[error(transparent)]
    Data(#[from] DataError),
}

/// Anything that can produce a cost dataset.
#[async_trait]
pub trait CostSource: Send + Sync {
    /// Human-readable origin for reports and logs.
    fn describe(&self) -> String;

    async fn fetch(&self) -> Result<CostDataset, SourceError>;
}

/// Reads a saved `get-cost-and-usage` document.
#[derive(Debug, Clone)]
pub struct FileCostSource {
    path: PathBuf,
    metric: String,
}

impl FileCostSource {
    pub fn new(path: impl Into<PathBuf>, metric: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            metric: metric.into(),
        }
    }
}

async fn read_document(path: &Path, metric: &str) -> Result<CostDataset, SourceError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| SourceError::Read {
            path: path.display().to_string(),
            source,
        })?;
    Ok(parse_cost_document(&content, metric)?)
}

#[async_trait]
impl CostSource for FileCostSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn fetch(&self) -> Result<CostDataset, SourceError> {
        read_document(&self.path, &self.metric).await
    }
}

/// Downloads the document with `aws ce get-cost-and-usage`, caching it to
/// the configured data file.
#[derive(Debug, Clone)]
pub struct AwsCliCostSource {
    config: SourceConfig,
    cli: AwsCli,
    force: bool,
}

impl AwsCliCostSource {
    pub fn new(config: SourceConfig, force: bool) -> Self {
        let cli = AwsCli::new(config.aws_profile.clone(), config.timeout_seconds);
        Self { config, cli, force }
    }

    /// Use a different `aws` runner, e.g. one backed by a wrapper script.
    #[cfg(test)]
    pub fn with_cli(mut self, cli: AwsCli) -> Self {
        self.cli = cli;
        self
    }

    fn data_path(&self) -> &Path {
        Path::new(&self.config.data_file)
    }
}

#[async_trait]
impl CostSource for AwsCliCostSource {
    fn describe(&self) -> String {
        format!(
            "Cost Explorer {} to {} (cached at {})",
            self.config.start, self.config.end, self.config.data_file
        )
    }

    async fn fetch(&self) -> Result<CostDataset, SourceError> {
        let path = self.data_path();

        if self.force || !path.exists() {
            info!(
                "Downloading cost data for {} to {} into {}",
                self.config.start,
                self.config.end,
                path.display()
            );
            let document = self.cli.run(&cost_explorer_args(&self.config)).await?;
            tokio::fs::write(path, &document)
                .await
                .map_err(|source| SourceError::Write {
                    path: path.display().to_string(),
                    source,
                })?;
        }

        read_document(path, &self.config.metric).await
    }
}

/// Pick the source for the given settings.
pub fn source_from_config(config: &SourceConfig, force_fetch: bool) -> Box<dyn CostSource> {
    if force_fetch || config.fetch_if_missing {
        Box::new(AwsCliCostSource::new(config.clone(), force_fetch))
    } else {
        Box::new(FileCostSource::new(&config.data_file, &config.metric))
    }
}
