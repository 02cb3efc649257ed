//! Blob storage for finished artifacts. The pipeline never touches storage;
//! the caller persists what it returns.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use kiln_core::state::Artifact;
use kiln_core::swarm::PipelineEvent;
use std::path::{Component, Path, PathBuf};

pub const AGENT_FILE_STEM: &str = "agent_file";
pub const PROMPT_FILE: &str = "system_prompt.txt";
pub const EVENTS_FILE: &str = "events.json";

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<()>;
    async fn get(&self, path: &str) -> Result<Vec<u8>>;
}

/// Store rooted at a local directory
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Relative paths only, no `..`
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            bail!("invalid artifact path '{path}'");
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<()> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        tokio::fs::write(&target, bytes)
            .await
            .with_context(|| format!("writing {}", target.display()))
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>> {
        let target = self.resolve(path)?;
        tokio::fs::read(&target)
            .await
            .with_context(|| format!("reading {}", target.display()))
    }
}

/// Write the artifact files under `<agent_id>/`; returns the stored paths
pub async fn persist_artifact(
    store: &dyn ArtifactStore,
    agent_id: &str,
    extension: &str,
    artifact: &Artifact,
) -> Result<Vec<String>> {
    let code_path = format!("{agent_id}/{AGENT_FILE_STEM}.{extension}");
    let prompt_path = format!("{agent_id}/{PROMPT_FILE}");
    store.put(&code_path, artifact.code.as_bytes()).await?;
    store.put(&prompt_path, artifact.prompt.as_bytes()).await?;
    tracing::info!(agent_id, code = %code_path, prompt = %prompt_path, "artifact stored");
    Ok(vec![code_path, prompt_path])
}

/// Write the audit log for a run, successful or not
pub async fn persist_events(
    store: &dyn ArtifactStore,
    agent_id: &str,
    events: &[PipelineEvent],
) -> Result<String> {
    let path = format!("{agent_id}/{EVENTS_FILE}");
    store
        .put(&path, &serde_json::to_vec_pretty(events)?)
        .await?;
    Ok(path)
}
