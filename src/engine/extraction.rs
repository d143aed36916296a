// src/engine/extraction.rs

//! Archive extraction
//!
//! Extracts a verified ZIP package into a temporary extraction
//! directory, preserving entry modification times. A first pass over the
//! archive gathers statistics for the start event; the second pass
//! writes entries in order and fails fast on the first entry error.

use std::time::{Duration, SystemTime};

use zip::ZipArchive;

use super::EngineContext;
use crate::error::{Error, Result};
use crate::events::{ExtractedFile, ExtractionStarted, ExtractionStats, ExtractionStopped};
use crate::fs::staging::PackageFile;
use crate::fs::temp::ExtractionDir;
use crate::model::{ActionType, FlowId};

/// Extracts archive packages.
pub(crate) struct ExtractionEngine<'a, 'ctx> {
    pub ctx: &'a EngineContext<'ctx>,
    pub flow: &'a FlowId,
    pub action_index: usize,
    pub action_type: ActionType,
}

impl ExtractionEngine<'_, '_> {
    /// Extracts the open package file into the destination directory.
    pub fn extract_package(
        &self,
        source: &mut PackageFile,
        destination: &ExtractionDir,
    ) -> Result<()> {
        let started = chrono::Local::now();

        let mut archive = ZipArchive::new(&mut source.file)
            .map_err(|err| Error::Extraction(format!("failed to read the archive: {err}")))?;

        // First pass: gather statistics about the archive contents.
        let mut source_stats = ExtractionStats::default();
        for i in 0..archive.len() {
            let entry = archive
                .by_index(i)
                .map_err(|err| Error::Extraction(format!("failed to read archive entry: {err}")))?;
            if entry.is_dir() {
                source_stats.directories += 1;
            } else {
                source_stats.files += 1;
                source_stats.total_bytes += entry.size();
            }
        }

        self.ctx.events.emit(ExtractionStarted {
            deployment: self.ctx.deployment.id.clone(),
            flow: self.flow.clone(),
            action_index: self.action_index,
            action_type: self.action_type,
            source_path: source.path.display().to_string(),
            destination_path: destination.path().display().to_string(),
            source_stats,
        });

        // Second pass: write each entry, in order.
        let mut destination_stats = ExtractionStats::default();
        let result = (|| -> Result<()> {
            for i in 0..archive.len() {
                self.ctx.cancel.check()?;

                let file_started = chrono::Local::now();

                let (name, size, entry_result) = {
                    let mut entry = archive.by_index(i).map_err(|err| {
                        Error::Extraction(format!("failed to read archive entry: {err}"))
                    })?;
                    let name = entry.name().to_string();
                    let size = entry.size();

                    let entry_result = if entry.is_dir() {
                        destination.mkdir_all(&name).map(|()| {
                            destination_stats.directories += 1;
                        })
                    } else {
                        // Some archives omit directory entries, so the
                        // parent chain is created on demand.
                        let parent = match name.rsplit_once('/') {
                            Some((parent, _)) => parent,
                            None => "",
                        };
                        let modified = entry_modified_time(&entry);
                        destination.mkdir_all(parent).and_then(|()| {
                            let mut reader = CancelEntryReader {
                                cancel: self.ctx.cancel,
                                inner: &mut entry,
                            };
                            destination
                                .write_file(&name, &mut reader, modified)
                                .map(|written| {
                                    destination_stats.files += 1;
                                    destination_stats.total_bytes += written;
                                })
                        })
                    };
                    (name, size, entry_result)
                };

                let file_stopped = chrono::Local::now();
                self.ctx.events.emit(ExtractedFile {
                    deployment: self.ctx.deployment.id.clone(),
                    flow: self.flow.clone(),
                    action_index: self.action_index,
                    action_type: self.action_type,
                    file_number: i,
                    path: name,
                    file_size: size,
                    started: file_started,
                    stopped: file_stopped,
                    error: entry_result.as_ref().err().map(|err| err.to_string()),
                });

                entry_result?;
            }
            Ok(())
        })();

        let stopped = chrono::Local::now();
        self.ctx.events.emit(ExtractionStopped {
            deployment: self.ctx.deployment.id.clone(),
            flow: self.flow.clone(),
            action_index: self.action_index,
            action_type: self.action_type,
            source_path: source.path.display().to_string(),
            destination_path: destination.path().display().to_string(),
            source_stats,
            destination_stats,
            started,
            stopped,
            error: result.as_ref().err().map(|err| err.to_string()),
        });

        result
    }
}

struct CancelEntryReader<'a, R> {
    cancel: &'a crate::util::CancellationToken,
    inner: R,
}

impl<R: std::io::Read> std::io::Read for CancelEntryReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.cancel.is_cancelled() {
            return Err(std::io::Error::other(Error::Cancelled));
        }
        self.inner.read(buf)
    }
}

/// Converts a zip entry's modification timestamp into a system time.
///
/// Zip timestamps have no time zone; they are interpreted as UTC, which
/// matches how the archive side records them.
fn entry_modified_time(entry: &zip::read::ZipFile<'_>) -> Option<SystemTime> {
    let dt = entry.last_modified();
    let date = chrono::NaiveDate::from_ymd_opt(
        i32::from(dt.year()),
        u32::from(dt.month()),
        u32::from(dt.day()),
    )?;
    let time = date.and_hms_opt(
        u32::from(dt.hour()),
        u32::from(dt.minute()),
        u32::from(dt.second()),
    )?;
    let seconds = time.and_utc().timestamp();
    if seconds < 0 {
        return None;
    }
    Some(SystemTime::UNIX_EPOCH + Duration::from_secs(seconds as u64))
}
