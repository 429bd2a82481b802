//! Validated, atomic replacement of the feed file.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use quick_xml::escape::partial_escape;
use tracing::{info, warn};

use crate::error::FeedError;

/// Backups of earlier feeds left on disk after a write.
const BACKUPS_KEPT: usize = 3;

/// Markers every complete feed contains. The shop name is matched in its
/// escaped form, as the serializer writes it.
pub fn required_markers(shop_name: &str) -> Vec<String> {
    vec![
        "<yml_catalog".to_string(),
        "<shop>".to_string(),
        format!("<name>{}</name>", partial_escape(shop_name)),
        "<offers>".to_string(),
        "</yml_catalog>".to_string(),
    ]
}

pub fn validate(xml: &str, shop_name: &str) -> Result<(), FeedError> {
    match required_markers(shop_name).into_iter().find(|m| !xml.contains(m.as_str())) {
        Some(missing) => Err(FeedError::MissingMarker(missing)),
        None => Ok(()),
    }
}

#[derive(Debug)]
pub struct Written {
    pub path: PathBuf,
    pub backup: Option<PathBuf>,
}

pub struct FeedWriter {
    path: PathBuf,
    shop_name: String,
}

impl FeedWriter {
    pub fn new(path: impl Into<PathBuf>, shop_name: impl Into<String>) -> Self {
        FeedWriter {
            path: path.into(),
            shop_name: shop_name.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn temp_path(&self) -> PathBuf {
        with_suffix(&self.path, ".tmp")
    }

    pub fn backup_path(&self, at: DateTime<Local>) -> PathBuf {
        with_suffix(&self.path, &format!(".backup.{}", at.format("%Y%m%d%H%M%S")))
    }

    /// Replaces the feed with `xml`. An invalid document is rejected before
    /// anything on disk changes; otherwise the previous feed is copied aside and
    /// the new one is renamed into place.
    pub fn write(&self, xml: &str) -> Result<Written, FeedError> {
        validate(xml, &self.shop_name)?;
        let backup = self.backup()?;
        let staged = self.stage(xml)?;
        self.commit(&staged)?;
        info!("Feed saved: {}", self.path.display());
        self.prune_backups(BACKUPS_KEPT);
        Ok(Written {
            path: self.path.clone(),
            backup,
        })
    }

    fn backup(&self) -> Result<Option<PathBuf>, FeedError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let backup = self.backup_path(Local::now());
        std::fs::copy(&self.path, &backup)?;
        info!("Backup created: {}", backup.display());
        Ok(Some(backup))
    }

    /// Removes all but the `keep` newest backups. Stamps sort by name.
    fn prune_backups(&self, keep: usize) {
        let Some(prefix) = self.path.file_name().map(|n| format!("{}.backup.", n.to_string_lossy())) else {
            return;
        };
        let dir = match self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            Some(d) => d.to_path_buf(),
            None => PathBuf::from("."),
        };
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Cannot list backups in {}: {}", dir.display(), e);
                return;
            }
        };
        let mut backups: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .is_some_and(|n| n.to_string_lossy().starts_with(&prefix))
            })
            .collect();
        backups.sort();
        let excess = backups.len().saturating_sub(keep);
        for old in &backups[..excess] {
            match std::fs::remove_file(old) {
                Ok(()) => info!("Old backup removed: {}", old.display()),
                Err(e) => warn!("Failed to remove old backup {}: {}", old.display(), e),
            }
        }
    }

    /// Writes the complete document next to the target, flushed to disk.
    fn stage(&self, xml: &str) -> Result<PathBuf, FeedError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let tmp = self.temp_path();
        let mut file = File::create(&tmp)?;
        file.write_all(xml.as_bytes())?;
        file.sync_all()?;
        Ok(tmp)
    }

    fn commit(&self, staged: &Path) -> Result<(), FeedError> {
        if let Err(e) = std::fs::rename(staged, &self.path) {
            warn!("Failed to move {} into place: {}", staged.display(), e);
            let _ = std::fs::remove_file(staged);
            return Err(e.into());
        }
        Ok(())
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut s = path.as_os_str().to_owned();
    s.push(suffix);
    PathBuf::from(s)
}
