use crate::{
    config::{GeneratorConfig, MIN_LINES},
    errors::{FileOperation, IoError},
    names::{random_chars, timestamped, NameRegistry},
};
use chrono::{DateTime, Local};
use miette::Diagnostic;
use rand::Rng;
use std::{
    fs::{self, OpenOptions},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum SynthError {
    #[error("'{path}' is not a valid directory")]
    #[diagnostic(code(datagen::synth::not_a_directory))]
    NotADirectory { path: PathBuf },

    #[error("file path '{path}' is an existing directory")]
    #[diagnostic(code(datagen::synth::name_collision))]
    NameCollision { path: PathBuf },

    #[error("file path '{path}' already exists")]
    #[diagnostic(code(datagen::synth::already_exists))]
    AlreadyExists { path: PathBuf },

    #[error("I/O error within synth domain")]
    #[diagnostic(code(datagen::synth::io))]
    Io(#[from] IoError),
}
impl SynthError {
    /// Collisions only cost one entry; everything else means the tree cannot be built.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            SynthError::NameCollision { .. } | SynthError::AlreadyExists { .. }
        )
    }
}

/// Size parameters for generated files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentShape {
    pub max_name_len: usize,
    pub line_len: usize,
    pub max_lines: usize,
}
impl From<&GeneratorConfig> for ContentShape {
    fn from(config: &GeneratorConfig) -> Self {
        Self {
            max_name_len: config.max_name_len,
            line_len: config.line_len,
            max_lines: config.max_lines,
        }
    }
}

/// Builds one line of space separated random words, roughly `target_len` characters long.
///
/// Each word takes `len + 1` from the budget, so the line may come out shorter than the
/// target and may overshoot it by the final space only.
pub fn random_line<R: Rng>(rng: &mut R, target_len: usize) -> String {
    let mut line = String::with_capacity(target_len + 2);
    let mut budget = target_len;

    while budget > 0 {
        let offset = rng.random_range(1..=budget);

        line.push_str(&random_chars(rng, offset));
        line.push(' ');

        budget = budget.saturating_sub(offset + 1);
    }

    line.push('\n');

    line
}

/// Creates a randomly named text file in `parent` and returns its on-disk name.
///
/// # Errors
///
/// - [`SynthError::NotADirectory`] if `parent` is missing or not a directory.
/// - [`SynthError::NameCollision`] / [`SynthError::AlreadyExists`] if the timestamped name is taken.
/// - [`SynthError::Io`] if the file cannot be written.
pub fn create_random_file<R: Rng>(
    rng: &mut R,
    parent: &Path,
    shape: ContentShape,
) -> Result<String, SynthError> {
    let mut registry = NameRegistry::new(parent);

    create_random_file_in(&mut registry, rng, shape, Local::now())
}

/// Same as [`create_random_file`], drawing the base name from an existing registry so
/// names stay unique across a batch of files written within the same second.
pub fn create_random_file_in<R: Rng>(
    registry: &mut NameRegistry<'_>,
    rng: &mut R,
    shape: ContentShape,
    at: DateTime<Local>,
) -> Result<String, SynthError> {
    let parent = registry.parent().to_path_buf();

    ensure_directory(&parent)?;

    let base = registry.claim(rng, shape.max_name_len);
    let file_name = timestamped(&base, at);
    let path = parent.join(&file_name);

    if path.is_dir() {
        return Err(SynthError::NameCollision { path });
    }

    let file = match OpenOptions::new().write(true).create_new(true).open(&path) {
        Ok(file) => file,
        Err(error) if error.kind() == io::ErrorKind::AlreadyExists => {
            return Err(SynthError::AlreadyExists { path });
        }
        Err(error) => Err(IoError::new(FileOperation::Write, path.clone(), error))?,
    };

    let num_lines = rng.random_range(MIN_LINES..=shape.max_lines.max(MIN_LINES));

    let mut writer = BufWriter::new(file);
    for _ in 0..num_lines {
        writer
            .write_all(random_line(rng, shape.line_len).as_bytes())
            .map_err(|error| IoError::new(FileOperation::Write, path.clone(), error))?;
    }
    writer
        .flush()
        .map_err(|error| IoError::new(FileOperation::Write, path.clone(), error))?;

    log::debug!("file created = {} ({} lines)", path.display(), num_lines);

    Ok(file_name)
}

fn ensure_directory(path: &Path) -> Result<(), SynthError> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(SynthError::NotADirectory {
            path: path.to_path_buf(),
        }),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Err(SynthError::NotADirectory {
            path: path.to_path_buf(),
        }),
        Err(error) => Err(IoError::new(FileOperation::Metadata, path.to_path_buf(), error).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::names::random_name;
    use rand::{rngs::StdRng, SeedableRng};

    const SHAPE: ContentShape = ContentShape {
        max_name_len: 10,
        line_len: 60,
        max_lines: 15,
    };

    #[test]
    fn test_random_line_stays_near_target() {
        let mut rng = StdRng::seed_from_u64(5);

        for _ in 0..500 {
            let line = random_line(&mut rng, 60);
            let body = line.strip_suffix('\n').unwrap();

            assert!(!body.is_empty());
            assert!(body.len() <= 61, "line too long: {}", body.len());
            assert!(body.ends_with(' '));
            assert!(body
                .split(' ')
                .filter(|w| !w.is_empty())
                .all(|w| w.bytes().all(|b| b.is_ascii_alphabetic())));
        }
    }

    #[test]
    fn test_file_has_between_five_and_max_lines() {
        let dir = tempfile::tempdir().unwrap();
        let mut rng = StdRng::seed_from_u64(21);

        for _ in 0..20 {
            let name = create_random_file(&mut rng, dir.path(), SHAPE).unwrap();
            let content = fs::read_to_string(dir.path().join(&name)).unwrap();
            let lines = content.lines().count();

            assert!((5..=15).contains(&lines), "{name} has {lines} lines");
        }
    }

    #[test]
    fn test_file_name_carries_timestamp_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let mut rng = StdRng::seed_from_u64(2);

        let name = create_random_file(&mut rng, dir.path(), SHAPE).unwrap();
        let (stamp, base) = name.split_once('_').unwrap();

        assert_eq!(stamp.len(), "YYYY-MM-DD-HH-MM-SS".len());
        assert!(!base.is_empty());
    }

    #[test]
    fn test_missing_parent_is_not_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut rng = StdRng::seed_from_u64(2);

        let err = create_random_file(&mut rng, &dir.path().join("nope"), SHAPE).unwrap_err();

        assert!(matches!(err, SynthError::NotADirectory { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_file_parent_is_not_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain");
        fs::write(&file, "x").unwrap();
        let mut rng = StdRng::seed_from_u64(2);

        let err = create_random_file(&mut rng, &file, SHAPE).unwrap_err();

        assert!(matches!(err, SynthError::NotADirectory { .. }));
    }

    #[test]
    fn test_directory_with_target_name_is_a_collision() {
        let dir = tempfile::tempdir().unwrap();
        let at = Local::now();
        let mut rng = StdRng::seed_from_u64(13);
        let base = random_name(&mut rng.clone(), SHAPE.max_name_len);
        fs::create_dir(dir.path().join(timestamped(&base, at))).unwrap();

        let mut registry = NameRegistry::new(dir.path());
        let err = create_random_file_in(&mut registry, &mut rng, SHAPE, at).unwrap_err();

        assert!(matches!(err, SynthError::NameCollision { .. }));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_existing_file_with_target_name_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let at = Local::now();
        let mut rng = StdRng::seed_from_u64(17);
        let base = random_name(&mut rng.clone(), SHAPE.max_name_len);
        let taken = dir.path().join(timestamped(&base, at));
        fs::write(&taken, "keep me").unwrap();

        let mut registry = NameRegistry::new(dir.path());
        let err = create_random_file_in(&mut registry, &mut rng, SHAPE, at).unwrap_err();

        assert!(matches!(err, SynthError::AlreadyExists { .. }));
        assert_eq!(fs::read_to_string(&taken).unwrap(), "keep me");
    }
}
