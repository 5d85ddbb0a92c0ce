//! Completed video collection and archive export.

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use vgen_models::{ItemId, VideoArtifact, WorkItem};

use crate::error::{WorkerError, WorkerResult};

/// A video registered for individual download.
#[derive(Debug, Clone)]
pub struct CollectedResult {
    pub item_id: ItemId,
    pub name: String,
    pub artifact: VideoArtifact,
    pub collected_at: DateTime<Utc>,
}

/// Receives finished videos and exports them.
#[derive(Debug, Default)]
pub struct ResultCollector {
    results: Mutex<Vec<CollectedResult>>,
}

/// File name for an individually saved video.
pub fn result_file_name(item: &WorkItem, artifact: &VideoArtifact) -> String {
    let stem = item
        .image
        .as_ref()
        .and_then(|i| i.file_stem())
        .unwrap_or("video");
    let id = item.id.to_string();
    format!("{}_{}.{}", stem, id_suffix(&id, 8), artifact.extension())
}

/// Last `chars` characters of `id`.
fn id_suffix(id: &str, chars: usize) -> &str {
    match id.char_indices().rev().nth(chars.saturating_sub(1)) {
        Some((start, _)) if chars > 0 => &id[start..],
        Some(_) => "",
        None => id,
    }
}

/// Archive entry name for the `index`-th completed item (1-based).
pub fn archive_entry_name(item: &WorkItem, artifact: &VideoArtifact, index: usize) -> String {
    let stem = item
        .image
        .as_ref()
        .and_then(|i| i.file_stem())
        .unwrap_or("prompt");
    format!("{}_{}.{}", stem, index, artifact.extension())
}

impl ResultCollector {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<CollectedResult>> {
        self.results.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a finished video. Returns its download name.
    ///
    /// A second registration for the same item replaces the first.
    pub fn register(&self, item: &WorkItem, artifact: VideoArtifact) -> String {
        let name = result_file_name(item, &artifact);
        let entry = CollectedResult {
            item_id: item.id.clone(),
            name: name.clone(),
            artifact,
            collected_at: Utc::now(),
        };

        let mut results = self.lock();
        results.retain(|r| r.item_id != item.id);
        results.push(entry);
        debug!(item_id = %item.id, name = %name, "Registered result");
        name
    }

    pub fn get(&self, id: &ItemId) -> Option<CollectedResult> {
        self.lock().iter().find(|r| &r.item_id == id).cloned()
    }

    /// Results in registration order.
    pub fn results(&self) -> Vec<CollectedResult> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drop results of the given items.
    pub fn clear_completed(&self, ids: &[ItemId]) {
        self.lock().retain(|r| !ids.contains(&r.item_id));
    }

    /// Write one result into `dir`. Returns the written path.
    pub async fn save_individual(&self, id: &ItemId, dir: &Path) -> WorkerResult<PathBuf> {
        let result = self.get(id).ok_or(WorkerError::NothingToDownload)?;
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(&result.name);
        tokio::fs::write(&path, result.artifact.bytes()).await?;
        info!(path = %path.display(), "Saved video");
        Ok(path)
    }

    /// Write every registered result into `dir`.
    pub async fn save_all(&self, dir: &Path) -> WorkerResult<Vec<PathBuf>> {
        let results = self.results();
        if results.is_empty() {
            return Ok(Vec::new());
        }
        tokio::fs::create_dir_all(dir).await?;
        let mut written = Vec::with_capacity(results.len());
        for result in results {
            let path = dir.join(&result.name);
            tokio::fs::write(&path, result.artifact.bytes()).await?;
            written.push(path);
        }
        info!(dir = %dir.display(), count = written.len(), "Saved videos");
        Ok(written)
    }

    /// Build a zip of every completed item's video, in queue order.
    ///
    /// Entries are stored uncompressed.
    pub fn build_archive(&self, items: &[WorkItem]) -> WorkerResult<Bytes> {
        let completed: Vec<(&WorkItem, &VideoArtifact)> = items
            .iter()
            .filter_map(|item| item.artifact().map(|artifact| (item, artifact)))
            .collect();
        if completed.is_empty() {
            return Err(WorkerError::NothingToDownload);
        }

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Stored)
            .large_file(true);

        for (index, (item, artifact)) in completed.iter().enumerate() {
            let name = archive_entry_name(item, artifact, index + 1);
            zip.start_file(name, options)?;
            zip.write_all(artifact.bytes())?;
        }

        let cursor = zip.finish()?;
        Ok(Bytes::from(cursor.into_inner()))
    }

    /// Build the archive and write it to `path`. Returns the entry count.
    pub async fn write_archive(&self, items: &[WorkItem], path: &Path) -> WorkerResult<usize> {
        let archive = self.build_archive(items)?;
        let count = items.iter().filter(|i| i.artifact().is_some()).count();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(path, &archive).await?;
        info!(path = %path.display(), count, bytes = archive.len(), "Wrote archive");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::*;
    use vgen_models::{ImageData, ItemState};

    fn completed_image(name: &str, video: &'static [u8]) -> WorkItem {
        let image = ImageData::from_file(vec![1u8, 2, 3], name).unwrap();
        let mut item = WorkItem::from_image(image, None);
        item.state = ItemState::complete(VideoArtifact::new(Bytes::from_static(video)));
        item
    }

    fn completed_prompt(video: &'static [u8]) -> WorkItem {
        let mut item = WorkItem::from_prompt("a boat at dawn");
        item.state = ItemState::complete(VideoArtifact::new(Bytes::from_static(video)));
        item
    }

    #[test]
    fn test_archive_names_are_positional() {
        let collector = ResultCollector::new();
        let items = vec![
            completed_image("cat.png", b"cat-video"),
            WorkItem::from_prompt("still queued"),
            completed_prompt(b"boat-video"),
        ];

        let archive = collector.build_archive(&items).unwrap();
        let mut zip = zip::ZipArchive::new(Cursor::new(archive.to_vec())).unwrap();
        assert_eq!(zip.len(), 2);

        let mut names: Vec<_> = zip.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(names, vec!["cat_1.mp4", "prompt_2.mp4"]);

        let mut body = Vec::new();
        zip.by_name("prompt_2.mp4").unwrap().read_to_end(&mut body).unwrap();
        assert_eq!(body, b"boat-video");
    }

    #[test]
    fn test_empty_archive_is_rejected() {
        let collector = ResultCollector::new();
        let err = collector
            .build_archive(&[WorkItem::from_prompt("queued")])
            .unwrap_err();
        assert!(matches!(err, WorkerError::NothingToDownload));
    }

    #[test]
    fn test_register_replaces_and_clears() {
        let collector = ResultCollector::new();
        let item = completed_image("dog.jpg", b"v1");

        let name = collector.register(&item, VideoArtifact::new(Bytes::from_static(b"v1")));
        assert!(name.starts_with("dog_"));
        assert!(name.ends_with(".mp4"));
        collector.register(&item, VideoArtifact::new(Bytes::from_static(b"v2")));
        assert_eq!(collector.len(), 1);
        assert_eq!(
            collector.get(&item.id).unwrap().artifact.bytes().as_ref(),
            b"v2"
        );

        collector.clear_completed(&[item.id.clone()]);
        assert!(collector.is_empty());
    }

    #[test]
    fn test_result_name_handles_non_ascii_ids() {
        let mut item = completed_prompt(b"v");
        item.id = ItemId::from_string("clip-ünïcødé-é");
        let name = result_file_name(&item, item.artifact().unwrap());
        assert_eq!(name, "video_nïcødé-é.mp4");

        item.id = ItemId::from_string("ab");
        assert_eq!(result_file_name(&item, item.artifact().unwrap()), "video_ab.mp4");
        assert_eq!(id_suffix("abc", 0), "");
    }

    #[tokio::test]
    async fn test_save_individual_and_archive() {
        let dir = tempfile::tempdir().unwrap();
        let collector = ResultCollector::new();
        let item = completed_prompt(b"video-bytes");
        let name = collector.register(&item, item.artifact().unwrap().clone());
        assert!(name.starts_with("video_"));

        let path = collector.save_individual(&item.id, dir.path()).await.unwrap();
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"video-bytes");

        let missing = collector.save_individual(&ItemId::new(), dir.path()).await;
        assert!(missing.is_err());

        let archive = dir.path().join("out/videos.zip");
        let count = collector.write_archive(&[item], &archive).await.unwrap();
        assert_eq!(count, 1);
        assert!(tokio::fs::metadata(&archive).await.unwrap().len() > 0);
    }
}
