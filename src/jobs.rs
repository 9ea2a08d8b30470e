//! Extraction cycles: extract one resource kind, serialize, store.
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::instrument;

use crate::extractor::Extractor;
use crate::scheduler::JobHandler;
use crate::storage::SnapshotSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Users,
    Projects,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 2] = [ResourceKind::Users, ResourceKind::Projects];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Users => "users",
            ResourceKind::Projects => "projects",
        }
    }

    pub fn job_name(&self) -> &'static str {
        match self {
            ResourceKind::Users => "get all users",
            ResourceKind::Projects => "get all projects",
        }
    }
}

/// `{unix-seconds}_{kind}.json`
pub fn snapshot_name(kind: ResourceKind, at: DateTime<Utc>) -> String {
    format!("{}_{}.json", at.timestamp(), kind.as_str())
}

/// Run one full extraction of `kind` and store it as a pretty JSON array.
#[instrument(skip(extractor, sink))]
pub async fn extract_and_store(
    extractor: &Extractor,
    sink: &dyn SnapshotSink,
    kind: ResourceKind,
) -> Result<PathBuf> {
    let data = match kind {
        ResourceKind::Users => {
            let users = extractor.get_all_users().await?;
            serde_json::to_vec_pretty(&users).context("failed to marshal users to JSON")?
        }
        ResourceKind::Projects => {
            let projects = extractor.get_all_projects().await?;
            serde_json::to_vec_pretty(&projects).context("failed to marshal projects to JSON")?
        }
    };
    let name = snapshot_name(kind, Utc::now());
    sink.store(&name, &data).await
}

/// Scheduler handler bound to one resource kind.
#[derive(Clone)]
pub struct ExtractionJob {
    extractor: Extractor,
    sink: Arc<dyn SnapshotSink>,
    kind: ResourceKind,
}

impl ExtractionJob {
    pub fn new(extractor: Extractor, sink: Arc<dyn SnapshotSink>, kind: ResourceKind) -> Self {
        Self {
            extractor,
            sink,
            kind,
        }
    }
}

#[async_trait]
impl JobHandler for ExtractionJob {
    async fn run(&self) -> Result<()> {
        extract_and_store(&self.extractor, self.sink.as_ref(), self.kind).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn snapshot_names_use_epoch_seconds() {
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(snapshot_name(ResourceKind::Users, at), "1704164645_users.json");
        assert_eq!(
            snapshot_name(ResourceKind::Projects, at),
            "1704164645_projects.json"
        );
    }

    #[test]
    fn job_names_are_distinct() {
        assert_ne!(
            ResourceKind::Users.job_name(),
            ResourceKind::Projects.job_name()
        );
    }
}
