// src/engine/file.rs

//! The file engine
//!
//! Copies and deletes file resources. Destructive operations refuse to
//! touch protected roots, existing destination files are left untouched,
//! and both operations treat missing files as no-ops rather than errors.

use std::io::Read;

use filetime::FileTime;

use super::EngineContext;
use crate::error::{Error, Result};
use crate::events::{FileCopy, FileDelete};
use crate::fs::local;
use crate::model::{ActionType, FileId, FlowId};

/// Performs file system operations within a deployment.
pub(crate) struct FileEngine<'a, 'ctx> {
    pub ctx: &'a EngineContext<'ctx>,
    pub flow: &'a FlowId,
    pub action_index: usize,
    pub action_type: ActionType,
}

impl FileEngine<'_, '_> {
    /// Copies a source file resource to a destination file resource.
    ///
    /// An existing regular destination file is preserved; the copy
    /// records that the destination existed and succeeds.
    pub fn copy_file(&self, source_id: &FileId, destination_id: &FileId) -> Result<()> {
        let file_system = &self.ctx.deployment.resources.file_system;
        let source_ref = file_system
            .resolve_file(source_id)
            .map_err(|err| Error::Resolution(format!("source file: {err}")))?;
        let destination_ref = file_system
            .resolve_file(destination_id)
            .map_err(|err| Error::Resolution(format!("destination file: {err}")))?;

        if destination_ref.root.protected() {
            return Err(Error::Resolution(format!(
                "the destination file is located in the \"{}\" root, which is protected",
                destination_ref.root.id()
            )));
        }

        let started = chrono::Local::now();

        let mut source_path = String::new();
        let mut destination_path = String::new();
        let mut destination_existed = false;
        let mut file_size = 0u64;

        let result = (|| -> Result<()> {
            let destination_dir = local::open_dir(self.ctx.platform, &destination_ref.dir())?
                .ok_or_else(|| {
                    Error::Resolution(
                        "unable to open the destination directory: it does not exist".to_string(),
                    )
                })?;
            if let Ok(path) = destination_dir.join(&destination_ref.file_path) {
                destination_path = path.display().to_string();
            }

            // An existing regular file stops the copy without error. Its
            // size is reported so the event reflects what is on disk.
            match destination_dir.stat(&destination_ref.file_path)? {
                Some(metadata) if metadata.is_file() => {
                    destination_existed = true;
                    file_size = metadata.len();
                    return Ok(());
                }
                Some(_) => {
                    return Err(Error::Resolution(
                        "the destination file path already exists but is not a regular file"
                            .to_string(),
                    ))
                }
                None => {}
            }

            let source_dir = local::open_dir(self.ctx.platform, &source_ref.dir())?
                .ok_or_else(|| {
                    Error::Resolution("unable to open the source file: its directory does not exist".to_string())
                })?;
            if let Ok(path) = source_dir.join(&source_ref.file_path) {
                source_path = path.display().to_string();
            }
            let mut source_file = source_dir.open_file(&source_ref.file_path)?;
            let source_metadata = source_file.metadata()?;
            file_size = source_metadata.len();

            let mut destination_file =
                destination_dir.create_file(&destination_ref.file_path)?;

            let mut buf = vec![0u8; 64 * 1024];
            loop {
                self.ctx.cancel.check()?;
                let n = source_file.read(&mut buf)?;
                if n == 0 {
                    break;
                }
                std::io::Write::write_all(&mut destination_file, &buf[..n])?;
            }
            drop(destination_file);

            // Carry the source's modification time over to the copy.
            let modified = FileTime::from_last_modification_time(&source_metadata);
            let destination = destination_dir.join(&destination_ref.file_path)?;
            filetime::set_file_mtime(destination, modified)?;

            Ok(())
        })();

        let stopped = chrono::Local::now();

        self.ctx.events.emit(FileCopy {
            deployment: self.ctx.deployment.id.clone(),
            flow: self.flow.clone(),
            action_index: self.action_index,
            action_type: self.action_type,
            source_id: source_id.clone(),
            source_path,
            destination_id: destination_id.clone(),
            destination_path,
            destination_existed,
            file_size,
            started,
            stopped,
            error: result.as_ref().err().map(|err| err.to_string()),
        });

        result
    }

    /// Deletes a destination file resource.
    ///
    /// A missing parent directory or file is a no-op; a path that exists
    /// but is not a regular file is an error.
    pub fn delete_file(&self, file_id: &FileId) -> Result<()> {
        let file_ref = self
            .ctx
            .deployment
            .resources
            .file_system
            .resolve_file(file_id)
            .map_err(|err| Error::Resolution(format!("file: {err}")))?;

        if file_ref.root.protected() {
            return Err(Error::Resolution(format!(
                "the file is located in the \"{}\" root, which is protected",
                file_ref.root.id()
            )));
        }

        let started = chrono::Local::now();

        let mut file_path = String::new();
        let mut file_size = 0u64;
        let mut file_existed = false;

        let result = (|| -> Result<()> {
            let Some(dir) = local::open_dir(self.ctx.platform, &file_ref.dir())? else {
                return Ok(());
            };
            if let Ok(path) = dir.join(&file_ref.file_path) {
                file_path = path.display().to_string();
            }

            let Some(metadata) = dir.stat(&file_ref.file_path)? else {
                return Ok(());
            };
            if !metadata.is_file() {
                return Err(Error::Resolution(
                    "the file path exists but is not a regular file".to_string(),
                ));
            }

            file_existed = true;
            file_size = metadata.len();
            dir.remove_file(&file_ref.file_path)
        })();

        let stopped = chrono::Local::now();

        self.ctx.events.emit(FileDelete {
            deployment: self.ctx.deployment.id.clone(),
            flow: self.flow.clone(),
            action_index: self.action_index,
            action_type: self.action_type,
            file_id: file_id.clone(),
            file_path,
            file_size,
            file_existed,
            started,
            stopped,
            error: result.as_ref().err().map(|err| err.to_string()),
        });

        result
    }
}
