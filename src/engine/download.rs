// src/engine/download.rs

//! Resumable, verified package downloads
//!
//! Existing staged content is fed through the verifier first, so a file
//! that already matches its expected attributes is never downloaded
//! again and a partial file resumes from its current length. The source
//! list is tried in declaration order, for at most two passes; failed
//! verification between passes truncates the file and starts over.

use std::io::{Read, Seek, SeekFrom};

use super::verifier::{FileVerifier, CHUNK_SIZE};
use super::EngineContext;
use crate::error::{Error, Result};
use crate::events::{
    DownloadReset, DownloadResetReason, DownloadStarted, DownloadStopped, FileVerification,
};
use crate::fs::staging::PackageFile;
use crate::http::{STATUS_OK, STATUS_PARTIAL_CONTENT};
use crate::model::{ActionType, FlowId, Package, PackageId, PackageSource};
use crate::util::CancellationToken;

/// The number of passes made over the source list before giving up.
const MAX_ATTEMPTS: usize = 2;

/// A reader that stops with a cancellation error once its token fires.
struct CancelReader<'a, R> {
    cancel: &'a CancellationToken,
    inner: R,
}

impl<R: Read> Read for CancelReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.cancel.is_cancelled() {
            return Err(std::io::Error::other(Error::Cancelled));
        }
        self.inner.read(buf)
    }
}

/// Downloads and verifies package files.
pub(crate) struct DownloadEngine<'a, 'ctx> {
    pub ctx: &'a EngineContext<'ctx>,
    pub flow: &'a FlowId,
    pub action_index: usize,
    pub action_type: ActionType,
}

impl DownloadEngine<'_, '_> {
    /// Downloads and verifies a package file, reusing any content already
    /// present in the open staging file.
    pub fn download_and_verify(
        &self,
        id: &PackageId,
        package: &Package,
        file: &mut PackageFile,
    ) -> Result<()> {
        let mut verifier =
            FileVerifier::new(&package.attributes.hashes.types()).map_err(|err| {
                Error::Download(format!(
                    "failed to prepare a file content verifier for package \"{id}\": {err}"
                ))
            })?;
        if verifier.hash_types().is_empty() {
            return Err(Error::Download(
                "packages must provide at least one file hash for verification".to_string(),
            ));
        }

        // Absorb any existing file content, which also positions the file
        // at its end so a partial download can resume.
        file.seek(SeekFrom::Start(0))?;
        verifier
            .read_from(&mut CancelReader {
                cancel: self.ctx.cancel,
                inner: &mut *file,
            })
            .map_err(|err| {
                if self.ctx.cancel.is_cancelled() {
                    Error::Cancelled
                } else {
                    Error::Download(format!(
                        "failed to verify existing file content for package \"{id}\": {err}"
                    ))
                }
            })?;

        // A file at or beyond the expected size is treated as a completed
        // download and verified immediately.
        if verifier.size() >= package.attributes.size {
            let existing = verifier.state();
            self.ctx.events.emit(FileVerification {
                deployment: self.ctx.deployment.id.clone(),
                flow: self.flow.clone(),
                action_index: self.action_index,
                action_type: self.action_type,
                source: PackageSource::default(),
                file_name: file.name.clone(),
                path: file.path.display().to_string(),
                expected: package.attributes.clone(),
                actual: existing.clone(),
            });

            if existing == package.attributes {
                return Ok(());
            }

            let reason = if existing.size > package.attributes.size {
                DownloadResetReason::ExistingFileTooLarge
            } else {
                DownloadResetReason::ExistingFileVerificationFailed
            };
            self.reset_download(&PackageSource::default(), file, &mut verifier, reason)?;
        }

        if package.sources.is_empty() {
            return Err(Error::Download(
                "no sources were provided for the package".to_string(),
            ));
        }

        for attempt in 0..MAX_ATTEMPTS {
            let mut errs = Vec::new();
            let mut source = None;
            for candidate in &package.sources {
                match self.download_from_source(candidate, file, &mut verifier) {
                    Ok(()) => {
                        source = Some(candidate.clone());
                        break;
                    }
                    Err(err) => errs.push(err),
                }
            }

            let Some(source) = source else {
                return Err(Error::join(errs).unwrap_or_else(|| {
                    Error::Download("no sources were provided for the package".to_string())
                }));
            };

            let downloaded = verifier.state();
            self.ctx.events.emit(FileVerification {
                deployment: self.ctx.deployment.id.clone(),
                flow: self.flow.clone(),
                action_index: self.action_index,
                action_type: self.action_type,
                source: source.clone(),
                file_name: file.name.clone(),
                path: file.path.display().to_string(),
                expected: package.attributes.clone(),
                actual: downloaded.clone(),
            });

            if downloaded == package.attributes {
                return Ok(());
            }

            if attempt == 0 {
                self.reset_download(
                    &source,
                    file,
                    &mut verifier,
                    DownloadResetReason::DownloadedFileVerificationFailed,
                )?;
            }
        }

        Err(Error::Download(
            "the downloaded package did not pass its file verification checks".to_string(),
        ))
    }

    fn download_from_source(
        &self,
        source: &PackageSource,
        file: &mut PackageFile,
        verifier: &mut FileVerifier,
    ) -> Result<()> {
        if !source.source_type.is_http() {
            return Err(Error::Download(format!(
                "unrecognized package source type: {}",
                source.source_type.as_str()
            )));
        }

        // Resume from the end of the absorbed content.
        let mut offset = verifier.size();

        let response = self.ctx.http.get(&source.url, offset)?;
        match response.status {
            STATUS_OK => {
                if offset > 0 {
                    // The server ignored the range request, so the
                    // existing content must be discarded.
                    self.reset_download(
                        source,
                        file,
                        verifier,
                        DownloadResetReason::HttpServerDoesNotSupportResume,
                    )?;
                    offset = 0;
                }
            }
            STATUS_PARTIAL_CONTENT => {}
            status => {
                return Err(Error::Download(format!(
                    "the server returned an unexpected status code: {status}"
                )))
            }
        }

        self.ctx.events.emit(DownloadStarted {
            deployment: self.ctx.deployment.id.clone(),
            flow: self.flow.clone(),
            action_index: self.action_index,
            action_type: self.action_type,
            source: source.clone(),
            file_name: file.name.clone(),
            path: file.path.display().to_string(),
            offset,
        });

        let started = chrono::Local::now();
        let mut body = response.body;
        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut downloaded = 0u64;
        let result = loop {
            if let Err(err) = self.ctx.cancel.check() {
                break Err(err);
            }
            match body.read(&mut buf) {
                Ok(0) => break Ok(()),
                Ok(n) => {
                    downloaded += n as u64;
                    if let Err(err) = std::io::Write::write_all(file, &buf[..n]) {
                        break Err(err.into());
                    }
                    verifier.write(&buf[..n]);
                }
                Err(err) => break Err(Error::Http(err.to_string())),
            }
        };
        let stopped = chrono::Local::now();

        self.ctx.events.emit(DownloadStopped {
            deployment: self.ctx.deployment.id.clone(),
            flow: self.flow.clone(),
            action_index: self.action_index,
            action_type: self.action_type,
            source: source.clone(),
            file_name: file.name.clone(),
            path: file.path.display().to_string(),
            downloaded,
            file_size: offset + downloaded,
            started,
            stopped,
            error: result.as_ref().err().map(|err| err.to_string()),
        });

        result
    }

    /// Truncates the staging file and resets the verifier, recording the
    /// reason.
    fn reset_download(
        &self,
        source: &PackageSource,
        file: &mut PackageFile,
        verifier: &mut FileVerifier,
        reason: DownloadResetReason,
    ) -> Result<()> {
        self.ctx.events.emit(DownloadReset {
            deployment: self.ctx.deployment.id.clone(),
            flow: self.flow.clone(),
            action_index: self.action_index,
            action_type: self.action_type,
            source: source.clone(),
            file_name: file.name.clone(),
            path: file.path.display().to_string(),
            reason,
        });

        file.seek(SeekFrom::Start(0))?;
        file.file.set_len(0)?;
        verifier.reset();

        Ok(())
    }
}
