use crate::{
    config::GeneratorConfig,
    errors::{FileOperation, IoError},
    names::NameRegistry,
    synth::{create_random_file_in, ContentShape, SynthError},
};
use chrono::Local;
use miette::Diagnostic;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::{
    collections::VecDeque,
    fs,
    path::{Path, PathBuf},
    thread,
};
use thiserror::Error;

/// How many times a leaf is re-filled before giving up on reaching the entry count.
const MAX_TOP_UP_ROUNDS: usize = 3;

#[derive(Debug, Error, Diagnostic)]
pub enum TreeError {
    #[error("'{path}' is not a valid directory")]
    #[diagnostic(code(datagen::tree::not_a_directory))]
    NotADirectory { path: PathBuf },

    #[error("'{path}' is not below the tree root '{root}'")]
    #[diagnostic(code(datagen::tree::outside_root))]
    OutsideRoot {
        path: PathBuf,
        root: PathBuf,
        #[source]
        source: std::path::StripPrefixError,
    },

    #[error("I/O error within tree domain")]
    #[diagnostic(code(datagen::tree::io))]
    Io(#[from] IoError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Synth(#[from] SynthError),
}

/// A directory that has been created but not yet expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem(PathBuf);
impl WorkItem {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    /// Number of directory levels between `root` and this item. The root itself is depth 0.
    pub fn depth(&self, root: &Path) -> Result<usize, TreeError> {
        depth_below(root, &self.0)
    }
}

fn depth_below(root: &Path, path: &Path) -> Result<usize, TreeError> {
    path.strip_prefix(root)
        .map(|relative| relative.components().count())
        .map_err(|error| TreeError::OutsideRoot {
            path: path.to_path_buf(),
            root: root.to_path_buf(),
            source: error,
        })
}

/// Counters for one finished run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub directories: usize,
    pub files: usize,
    /// Entries that could not be created because their name was already taken.
    pub skipped: usize,
    /// Files added to leaves by the final top-up pass.
    pub topped_up: usize,
    pub leaves: usize,
    pub deepest: usize,
}

/// Creates `count` uniquely named subdirectories of `parent` and returns their paths.
///
/// # Errors
///
/// Returns [`TreeError::NotADirectory`] if `parent` is not a directory and
/// [`TreeError::Io`] if any `mkdir` fails. Failures are not retried.
pub fn create_directories<R: Rng>(
    rng: &mut R,
    max_name_len: usize,
    count: usize,
    parent: &Path,
) -> Result<Vec<PathBuf>, TreeError> {
    if !parent.is_dir() {
        return Err(TreeError::NotADirectory {
            path: parent.to_path_buf(),
        });
    }

    let mut registry = NameRegistry::new(parent);
    let mut created = Vec::with_capacity(count);

    for _ in 0..count {
        let name = registry.claim(rng, max_name_len);
        let path = parent.join(&name);

        fs::create_dir(&path)
            .map_err(|error| IoError::new(FileOperation::Mkdir, path.clone(), error))?;

        if !path.is_dir() {
            return Err(TreeError::NotADirectory { path });
        }

        log::debug!("added dir = {}", path.display());

        created.push(path);
    }

    Ok(created)
}

/// Breadth-first generator of a random directory tree.
///
/// Every directory above `max_depth` gets `entry_count` entries split randomly between
/// subdirectories (at least one) and files; every directory at `max_depth` only gets files
/// and is topped up to `entry_count` entries once the worklist is drained.
pub struct TreeBuilder<R> {
    config: GeneratorConfig,
    shape: ContentShape,
    rng: R,
}
impl TreeBuilder<StdRng> {
    /// Seeds from `config.seed` when present, from OS entropy otherwise.
    pub fn from_config(config: GeneratorConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Self::new(config, rng)
    }
}
impl<R: Rng> TreeBuilder<R> {
    pub fn new(config: GeneratorConfig, rng: R) -> Self {
        let shape = ContentShape::from(&config);

        Self { config, shape, rng }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Expands `root` into a full tree. `root` must already exist and should be empty.
    ///
    /// # Errors
    ///
    /// Any filesystem failure other than a taken file name aborts the run and leaves the
    /// partially built tree on disk.
    pub fn build(&mut self, root: &Path) -> Result<BuildReport, TreeError> {
        if !root.is_dir() {
            return Err(TreeError::NotADirectory {
                path: root.to_path_buf(),
            });
        }

        let max_depth = self.config.max_depth;
        let entry_count = self.config.entry_count;

        let mut report = BuildReport::default();
        let mut queue = VecDeque::from([WorkItem::new(root)]);
        let mut leaves = Vec::new();

        while let Some(item) = queue.pop_front() {
            let depth = item.depth(root)?;
            report.deepest = report.deepest.max(depth);

            if depth < max_depth {
                let dir_count = self.rng.random_range(1..=entry_count);
                let file_count = entry_count - dir_count;

                log::debug!(
                    "node dir {} (depth {}) has {} directories and {} files",
                    item.path().display(),
                    depth,
                    dir_count,
                    file_count
                );
                self.pace();

                let children = create_directories(
                    &mut self.rng,
                    self.shape.max_name_len,
                    dir_count,
                    item.path(),
                )?;
                report.directories += children.len();
                queue.extend(children.into_iter().map(WorkItem::new));

                self.fill_files(item.path(), file_count, &mut report)?;
            } else {
                self.fill_files(item.path(), entry_count, &mut report)?;
                leaves.push(item);
            }
        }

        for leaf in &leaves {
            self.top_up(leaf.path(), &mut report)?;
        }
        report.leaves = leaves.len();

        Ok(report)
    }

    /// Tries to create `count` files in `dir`, returning how many were actually written.
    fn fill_files(
        &mut self,
        dir: &Path,
        count: usize,
        report: &mut BuildReport,
    ) -> Result<usize, TreeError> {
        let mut registry = NameRegistry::new(dir);
        let mut created = 0;

        for _ in 0..count {
            match create_random_file_in(&mut registry, &mut self.rng, self.shape, Local::now()) {
                Ok(_) => created += 1,
                Err(error) if !error.is_fatal() => {
                    log::warn!("{error}, skipping entry");
                    report.skipped += 1;
                    self.pace();
                }
                Err(error) => return Err(error.into()),
            }
        }

        report.files += created;

        Ok(created)
    }

    fn top_up(&mut self, dir: &Path, report: &mut BuildReport) -> Result<(), TreeError> {
        let entry_count = self.config.entry_count;

        for _ in 0..MAX_TOP_UP_ROUNDS {
            let present = count_entries(dir)?;
            if present >= entry_count {
                return Ok(());
            }

            log::debug!(
                "leaf {} has {} of {} entries, topping up",
                dir.display(),
                present,
                entry_count
            );

            let added = self.fill_files(dir, entry_count - present, report)?;
            report.topped_up += added;
        }

        let present = count_entries(dir)?;
        if present < entry_count {
            log::warn!(
                "leaf {} still has only {} of {} entries",
                dir.display(),
                present,
                entry_count
            );
        }

        Ok(())
    }

    fn pace(&self) {
        if let Some(pause) = self.config.pacing {
            thread::sleep(pause);
        }
    }
}

fn count_entries(dir: &Path) -> Result<usize, TreeError> {
    let entries = fs::read_dir(dir)
        .map_err(|error| IoError::new(FileOperation::ReadDir, dir.to_path_buf(), error))?;

    let mut count = 0;
    for entry in entries {
        entry.map_err(|error| IoError::new(FileOperation::ReadDir, dir.to_path_buf(), error))?;
        count += 1;
    }

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::names::ALPHABET;
    use std::collections::HashSet;
    use walkdir::WalkDir;

    fn builder(max_depth: usize, entry_count: usize, seed: u64) -> TreeBuilder<StdRng> {
        TreeBuilder::from_config(GeneratorConfig::new(max_depth, entry_count).with_seed(seed))
    }

    /// (depth, subdirectories, files) for every directory under `root`, root included.
    fn census(root: &Path) -> Vec<(usize, usize, usize)> {
        WalkDir::new(root)
            .into_iter()
            .map(|e| e.unwrap())
            .filter(|e| e.file_type().is_dir())
            .map(|e| {
                let (mut dirs, mut files) = (0, 0);
                for child in fs::read_dir(e.path()).unwrap() {
                    if child.unwrap().file_type().unwrap().is_dir() {
                        dirs += 1;
                    } else {
                        files += 1;
                    }
                }
                (e.depth(), dirs, files)
            })
            .collect()
    }

    #[test]
    fn test_work_item_depth_is_relative_to_root() {
        let root = Path::new("/data/root");

        assert_eq!(WorkItem::new(root).depth(root).unwrap(), 0);
        assert_eq!(WorkItem::new(root.join("a/b/c")).depth(root).unwrap(), 3);
        assert!(WorkItem::new("/elsewhere").depth(root).is_err());
    }

    #[test]
    fn test_create_directories_creates_exact_count() {
        let dir = tempfile::tempdir().unwrap();
        let mut rng = StdRng::seed_from_u64(4);

        let created = create_directories(&mut rng, 2, 40, dir.path()).unwrap();
        let unique: HashSet<&PathBuf> = created.iter().collect();

        assert_eq!(created.len(), 40);
        assert_eq!(unique.len(), 40);
        assert!(created.iter().all(|p| p.is_dir() && p.parent() == Some(dir.path())));
    }

    #[test]
    fn test_create_directories_rejects_missing_parent() {
        let dir = tempfile::tempdir().unwrap();
        let mut rng = StdRng::seed_from_u64(4);

        let err = create_directories(&mut rng, 5, 2, &dir.path().join("missing")).unwrap_err();

        assert!(matches!(err, TreeError::NotADirectory { .. }));
    }

    #[test]
    fn test_tree_shape_holds_for_small_parameters() {
        for (max_depth, entry_count) in [(3, 2), (3, 3), (4, 2)] {
            for seed in 0..5 {
                let dir = tempfile::tempdir().unwrap();
                let report = builder(max_depth, entry_count, seed)
                    .build(dir.path())
                    .unwrap();

                let dirs = census(dir.path());
                for &(depth, subdirs, files) in &dirs {
                    assert!(depth <= max_depth);
                    if depth == max_depth {
                        assert_eq!(subdirs, 0);
                        assert!(files >= entry_count);
                    } else {
                        assert!(subdirs >= 1);
                        assert_eq!(subdirs + files, entry_count);
                    }
                }

                assert_eq!(report.deepest, max_depth);
                assert_eq!(report.skipped, 0);
                assert_eq!(report.directories, dirs.len() - 1);
                assert_eq!(
                    report.leaves,
                    dirs.iter().filter(|(d, _, _)| *d == max_depth).count()
                );
            }
        }
    }

    #[test]
    fn test_report_counts_every_file() {
        let dir = tempfile::tempdir().unwrap();

        let report = builder(3, 3, 42).build(dir.path()).unwrap();

        let files = WalkDir::new(dir.path())
            .into_iter()
            .filter(|e| e.as_ref().unwrap().file_type().is_file())
            .count();
        assert_eq!(report.files, files);
    }

    #[test]
    fn test_preseeded_names_are_disambiguated() {
        let dir = tempfile::tempdir().unwrap();
        for letter in ALPHABET {
            fs::create_dir(dir.path().join((*letter as char).to_string())).unwrap();
        }
        let mut config = GeneratorConfig::new(3, 2).with_seed(8);
        config.max_name_len = 1;

        let report = TreeBuilder::from_config(config).build(dir.path()).unwrap();

        assert!(report.directories >= 1);
        let suffixed = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .filter(|name| name.contains('-'))
            .count();
        assert!(suffixed >= 1);
    }

    #[test]
    fn test_top_up_fills_short_leaf() {
        let dir = tempfile::tempdir().unwrap();
        let mut tree = builder(3, 4, 1);
        let mut report = BuildReport::default();
        fs::write(dir.path().join("existing"), "").unwrap();

        tree.top_up(dir.path(), &mut report).unwrap();

        assert_eq!(count_entries(dir.path()).unwrap(), 4);
        assert_eq!(report.topped_up, 3);
    }

    #[test]
    fn test_build_rejects_missing_root() {
        let dir = tempfile::tempdir().unwrap();

        let err = builder(3, 2, 0).build(&dir.path().join("absent")).unwrap_err();

        assert!(matches!(err, TreeError::NotADirectory { .. }));
    }
}
