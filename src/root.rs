use crate::errors::{FileOperation, IoError};
use miette::Diagnostic;
use std::{
    env, fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum RootError {
    #[error("root path '{path}' exists and is not a directory")]
    #[diagnostic(
        code(datagen::root::not_a_directory),
        help("Point --root-dir at a directory, or remove the file first")
    )]
    NotADirectory { path: PathBuf },

    #[error("root directory '{path}' is not empty")]
    #[diagnostic(
        code(datagen::root::not_empty),
        help("Drop --keep to let the root be cleared before generating")
    )]
    NotEmpty { path: PathBuf },

    #[error("I/O error within root domain")]
    #[diagnostic(code(datagen::root::io))]
    Io(#[from] IoError),
}

/// Resolves `path` against the current directory. This is the only place the
/// working directory is consulted; everything downstream takes absolute paths.
pub fn absolutize(path: &Path) -> Result<PathBuf, RootError> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }

    let cwd = env::current_dir()
        .map_err(|error| IoError::new(FileOperation::Metadata, PathBuf::from("."), error))?;

    Ok(cwd.join(path))
}

/// Leaves an empty directory at `path` and returns its canonical absolute form.
///
/// An existing directory is removed recursively first, unless `keep` is set, in which case
/// it must already be empty. Missing parent directories are created.
///
/// # Errors
///
/// - [`RootError::NotADirectory`] if something other than a directory sits at `path`.
/// - [`RootError::NotEmpty`] if `keep` is set and the directory has entries.
/// - [`RootError::Io`] if clearing or creating the directory fails.
pub fn prepare_root(path: &Path, keep: bool) -> Result<PathBuf, RootError> {
    let absolute = absolutize(path)?;

    match fs::symlink_metadata(&absolute) {
        Ok(meta) if meta.is_dir() => {
            if keep {
                let mut entries = fs::read_dir(&absolute).map_err(|error| {
                    IoError::new(FileOperation::ReadDir, absolute.clone(), error)
                })?;

                if entries.next().is_some() {
                    return Err(RootError::NotEmpty { path: absolute });
                }
            } else {
                log::info!("clearing dest dir: {}", absolute.display());

                fs::remove_dir_all(&absolute).map_err(|error| {
                    IoError::new(FileOperation::Remove, absolute.clone(), error)
                })?;
            }
        }
        Ok(_) => return Err(RootError::NotADirectory { path: absolute }),
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            log::debug!("root {} does not exist yet", absolute.display());
        }
        Err(error) => Err(IoError::new(FileOperation::Metadata, absolute.clone(), error))?,
    }

    fs::create_dir_all(&absolute)
        .map_err(|error| IoError::new(FileOperation::Mkdir, absolute.clone(), error))?;

    let canonical = fs::canonicalize(&absolute)
        .map_err(|error| IoError::new(FileOperation::Metadata, absolute.clone(), error))?;

    log::debug!("root dir = {}", canonical.display());

    Ok(canonical)
}
