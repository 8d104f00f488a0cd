// Deck Gate - Local Staging
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Materializes storage-held documents at local paths for one edit, and
// commits local changes back. Every local path lives under one private
// scratch directory, removed when the manager drops.

use crate::error::{GatewayError, Result};
use crate::paths;
use crate::storage::{self, StorageAdapter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::{NamedTempFile, TempDir};

const TEMPLATE_SUBDIR: &str = "templates";

pub struct StagingManager {
    storage: Arc<dyn StorageAdapter>,
    scratch: TempDir,
}

impl StagingManager {
    /// Create the scratch directory (`<tmp>/<prefix>XXXX`)
    pub fn new(storage: Arc<dyn StorageAdapter>, prefix: &str) -> Result<Self> {
        let scratch = tempfile::Builder::new().prefix(prefix).tempdir()?;
        log::info!("Scratch directory {:?} ({} storage)", scratch.path(), storage.backend());
        Ok(Self { storage, scratch })
    }

    pub fn storage(&self) -> &dyn StorageAdapter {
        self.storage.as_ref()
    }

    pub fn scratch_dir(&self) -> &Path {
        self.scratch.path()
    }

    /// Local path a logical name maps to. One path per name.
    pub fn scratch_path(&self, name: &str) -> Result<PathBuf> {
        let base = paths::basename(name)
            .ok_or_else(|| GatewayError::InvalidParams(format!("invalid document name: {:?}", name)))?;
        Ok(self.scratch.path().join(base))
    }

    /// Local path for editing `name`.
    ///
    /// Downloads when storage has it. Otherwise hands out a fresh (absent)
    /// path if creation is allowed, else fails with DocumentNotFound.
    pub fn stage(&self, name: &str, create_if_missing: bool) -> Result<PathBuf> {
        let local = self.scratch_path(name)?;
        if self.storage.exists(name)? {
            self.storage.download(name, &local)?;
            log::debug!("Staged {} -> {:?}", name, local);
            Ok(local)
        } else if create_if_missing {
            // A stale copy from an earlier request must not look like content
            if local.exists() {
                std::fs::remove_file(&local)?;
            }
            Ok(local)
        } else {
            Err(GatewayError::DocumentNotFound(name.to_string()))
        }
    }

    /// Download a storage-held template. None when storage lacks it.
    pub fn stage_template(&self, name: &str) -> Result<Option<PathBuf>> {
        if !self.storage.exists(name)? {
            return Ok(None);
        }
        let base = paths::basename(name)
            .ok_or_else(|| GatewayError::InvalidParams(format!("invalid template name: {:?}", name)))?;
        let local = self.scratch.path().join(TEMPLATE_SUBDIR).join(base);
        self.storage.download(name, &local)?;
        Ok(Some(local))
    }

    /// Upload a local file under `name`, returning the storage URL
    pub fn commit(&self, local: &Path, name: &str) -> Result<String> {
        let digest = storage::sha256_file(local)?;
        let url = self.storage.upload(local, name)?;
        log::info!("Uploaded {} ({}) sha256={}", name, url, digest);
        Ok(url)
    }

    /// Remove the request-scoped local file for `name`, if present
    pub fn discard(&self, name: &str) -> Result<()> {
        let local = self.scratch_path(name)?;
        match std::fs::remove_file(&local) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a staged template copy, if present
    pub fn discard_template(&self, name: &str) -> Result<()> {
        let Some(base) = paths::basename(name) else {
            return Ok(());
        };
        let local = self.scratch.path().join(TEMPLATE_SUBDIR).join(base);
        match std::fs::remove_file(&local) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Fresh uniquely named scratch file, deleted on drop
    pub fn scratch_file(&self, suffix: &str) -> Result<NamedTempFile> {
        Ok(tempfile::Builder::new()
            .prefix("autosave_")
            .suffix(suffix)
            .tempfile_in(self.scratch.path())?)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalStorage;
    use tempfile::tempdir;

    fn manager(root: &Path) -> StagingManager {
        let storage = LocalStorage::open(root, "http://localhost:8000").unwrap();
        StagingManager::new(Arc::new(storage), "deck_test_").unwrap()
    }

    #[test]
    fn stage_missing_without_create_fails_and_leaves_nothing() {
        let root = tempdir().unwrap();
        let staging = manager(root.path());
        let err = staging.stage("missing.pptx", false).unwrap_err();
        assert!(matches!(err, GatewayError::DocumentNotFound(ref n) if n == "missing.pptx"));
        assert!(!staging.scratch_dir().join("missing.pptx").exists());
    }

    #[test]
    fn stage_missing_with_create_allocates_absent_path() {
        let root = tempdir().unwrap();
        let staging = manager(root.path());
        let local = staging.stage("new.pptx", true).unwrap();
        assert_eq!(local, staging.scratch_dir().join("new.pptx"));
        assert!(!local.exists());
    }

    #[test]
    fn stage_commit_round_trip_preserves_bytes() -> anyhow::Result<()> {
        let root = tempdir()?;
        std::fs::write(root.path().join("deck.pptx"), b"original")?;
        let staging = manager(root.path());

        let before = storage::sha256_file(&root.path().join("deck.pptx"))?;
        let local = staging.stage("deck.pptx", false)?;
        staging.commit(&local, "deck.pptx")?;
        staging.discard("deck.pptx")?;

        assert!(staging.storage().exists("deck.pptx")?);
        assert_eq!(storage::sha256_file(&root.path().join("deck.pptx"))?, before);
        assert!(!local.exists());
        Ok(())
    }

    #[test]
    fn discard_is_idempotent() {
        let root = tempdir().unwrap();
        let staging = manager(root.path());
        staging.discard("never.pptx").unwrap();
        staging.discard("never.pptx").unwrap();
    }

    #[test]
    fn templates_stage_into_subdir() -> anyhow::Result<()> {
        let root = tempdir()?;
        std::fs::write(root.path().join("brand.pptx"), b"{}")?;
        let staging = manager(root.path());
        assert_eq!(staging.stage_template("ghost.pptx")?, None);
        let local = staging.stage_template("brand.pptx")?.unwrap();
        assert!(local.starts_with(staging.scratch_dir().join("templates")));
        staging.discard_template("brand.pptx")?;
        assert!(!local.exists());
        Ok(())
    }

    #[test]
    fn scratch_dir_removed_on_drop() {
        let root = tempdir().unwrap();
        let staging = manager(root.path());
        let dir = staging.scratch_dir().to_path_buf();
        assert!(dir.is_dir());
        drop(staging);
        assert!(!dir.exists());
    }
}
