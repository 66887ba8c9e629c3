use crate::errors::{FileOperation, IoError};
use miette::Diagnostic;
use regex::Regex;
use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
};
use thiserror::Error;
use walkdir::WalkDir;

lazy_static::lazy_static! {
    static ref FILE_NAME_REGEX: Regex = Regex::new(
        r"^\d{4}-\d{2}-\d{2}-\d{2}-\d{2}-\d{2}_[A-Za-z]+(?:-\d+)?$"
    ).expect("a valid regex pattern");

    static ref DIR_NAME_REGEX: Regex =
        Regex::new(r"^[A-Za-z]+(?:-\d+)?$").expect("a valid regex pattern");
}

#[derive(Debug, Error, Diagnostic)]
pub enum SurveyError {
    #[error("'{path}' is not a valid directory")]
    #[diagnostic(code(datagen::survey::not_a_directory))]
    NotADirectory { path: PathBuf },

    #[error("I/O error within survey domain")]
    #[diagnostic(code(datagen::survey::io))]
    Io(#[from] IoError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirSummary {
    pub depth: usize,
    pub directories: usize,
    pub files: usize,
}
impl DirSummary {
    pub fn entries(&self) -> usize {
        self.directories + self.files
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DepthCensus {
    pub directories: usize,
    pub files: usize,
}

/// What is on disk under a root, gathered in one walk.
#[derive(Debug, Clone, Default)]
pub struct TreeSurvey {
    pub root: PathBuf,
    /// Directories below the root (the root itself is not counted).
    pub directories: usize,
    pub files: usize,
    /// Depth of the deepest directory.
    pub max_depth: usize,
    /// Entries found at each depth; depth 1 are the root's children.
    pub per_depth: BTreeMap<usize, DepthCensus>,
    /// Every directory, root included, with its immediate children counted.
    pub dirs: BTreeMap<PathBuf, DirSummary>,
    /// Entries whose names do not look generated.
    pub foreign_names: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    TooDeep {
        path: PathBuf,
        depth: usize,
    },
    ShortLeaf {
        path: PathBuf,
        files: usize,
        expected: usize,
    },
    EntryCountMismatch {
        path: PathBuf,
        entries: usize,
        expected: usize,
    },
    NoSubdirectory {
        path: PathBuf,
    },
    ForeignName {
        path: PathBuf,
    },
}
impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooDeep { path, depth } => {
                write!(f, "{} is at depth {}", path.display(), depth)
            }
            Self::ShortLeaf {
                path,
                files,
                expected,
            } => write!(
                f,
                "leaf {} has {} files, expected at least {}",
                path.display(),
                files,
                expected
            ),
            Self::EntryCountMismatch {
                path,
                entries,
                expected,
            } => write!(
                f,
                "{} has {} entries, expected {}",
                path.display(),
                entries,
                expected
            ),
            Self::NoSubdirectory { path } => {
                write!(f, "{} has no subdirectory above max depth", path.display())
            }
            Self::ForeignName { path } => {
                write!(f, "{} does not have a generated name", path.display())
            }
        }
    }
}

impl TreeSurvey {
    /// Directories sitting exactly at `depth`.
    pub fn at_depth(&self, depth: usize) -> impl Iterator<Item = (&PathBuf, &DirSummary)> {
        self.dirs.iter().filter(move |(_, d)| d.depth == depth)
    }

    /// Checks the shape a generator run with these parameters guarantees.
    pub fn check(&self, max_depth: usize, entry_count: usize) -> Vec<Violation> {
        let mut violations = Vec::new();

        for (path, dir) in &self.dirs {
            if dir.depth > max_depth {
                violations.push(Violation::TooDeep {
                    path: path.clone(),
                    depth: dir.depth,
                });
            } else if dir.depth == max_depth {
                if dir.files < entry_count {
                    violations.push(Violation::ShortLeaf {
                        path: path.clone(),
                        files: dir.files,
                        expected: entry_count,
                    });
                }
            } else {
                if dir.entries() != entry_count {
                    violations.push(Violation::EntryCountMismatch {
                        path: path.clone(),
                        entries: dir.entries(),
                        expected: entry_count,
                    });
                }
                if dir.directories == 0 {
                    violations.push(Violation::NoSubdirectory { path: path.clone() });
                }
            }
        }

        violations.extend(
            self.foreign_names
                .iter()
                .map(|path| Violation::ForeignName { path: path.clone() }),
        );

        violations
    }
}

/// Walks `root` and tallies directories and files per directory and per depth.
///
/// Symlinks are not followed and are counted as files.
pub fn survey(root: &Path) -> Result<TreeSurvey, SurveyError> {
    if !root.is_dir() {
        return Err(SurveyError::NotADirectory {
            path: root.to_path_buf(),
        });
    }

    let mut result = TreeSurvey {
        root: root.to_path_buf(),
        ..TreeSurvey::default()
    };

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(e) => e,
            Err(error) => {
                let path = error.path().unwrap_or(root).to_path_buf();

                Err(IoError::new(FileOperation::ReadDir, path, error.into()))?
            }
        };

        let depth = entry.depth();
        let is_dir = entry.file_type().is_dir();
        if is_dir {
            result.max_depth = result.max_depth.max(depth);
            result.dirs.insert(
                entry.path().to_path_buf(),
                DirSummary {
                    depth,
                    ..DirSummary::default()
                },
            );
        }

        if depth == 0 {
            continue;
        }

        let census = result.per_depth.entry(depth).or_default();
        if is_dir {
            census.directories += 1;
            result.directories += 1;
        } else {
            census.files += 1;
            result.files += 1;
        }

        // walkdir yields a directory before its contents, so the parent is always known
        if let Some(parent) = entry.path().parent().and_then(|p| result.dirs.get_mut(p)) {
            if is_dir {
                parent.directories += 1;
            } else {
                parent.files += 1;
            }
        }

        let name = entry.file_name().to_string_lossy();
        let pattern = if is_dir {
            &*DIR_NAME_REGEX
        } else {
            &*FILE_NAME_REGEX
        };
        if !pattern.is_match(&name) {
            result.foreign_names.push(entry.path().to_path_buf());
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("ab/Cd/efg")).unwrap();
        fs::write(root.join("2024-01-02-03-04-05_xyz"), "").unwrap();
        fs::write(root.join("ab/2024-01-02-03-04-05_q-1"), "").unwrap();
        fs::write(root.join("ab/Cd/2024-01-02-03-04-05_r"), "").unwrap();
        fs::write(root.join("ab/Cd/efg/2024-01-02-03-04-05_s"), "").unwrap();
        fs::write(root.join("ab/Cd/efg/2024-01-02-03-04-05_t"), "").unwrap();
        dir
    }

    #[test]
    fn test_counts_per_directory_and_depth() {
        let dir = fixture();

        let survey = survey(dir.path()).unwrap();

        assert_eq!(survey.directories, 3);
        assert_eq!(survey.files, 5);
        assert_eq!(survey.max_depth, 3);
        assert_eq!(
            survey.per_depth.get(&1),
            Some(&DepthCensus {
                directories: 1,
                files: 1
            })
        );
        let root = &survey.dirs[dir.path()];
        assert_eq!((root.directories, root.files), (1, 1));
        assert_eq!(survey.at_depth(3).count(), 1);
        assert!(survey.foreign_names.is_empty());
    }

    #[test]
    fn test_generated_shape_passes_check() {
        let dir = fixture();

        let survey = survey(dir.path()).unwrap();

        assert!(survey.check(3, 2).is_empty(), "{:?}", survey.check(3, 2));
    }

    #[test]
    fn test_violations_are_reported() {
        let dir = fixture();
        fs::write(dir.path().join("ab/extra.txt"), "").unwrap();

        let violations = survey(dir.path()).unwrap().check(2, 2);

        assert!(violations
            .iter()
            .any(|v| matches!(v, Violation::TooDeep { depth: 3, .. })));
        assert!(violations
            .iter()
            .any(|v| matches!(v, Violation::ShortLeaf { files: 1, .. })));
        assert!(violations
            .iter()
            .any(|v| matches!(v, Violation::EntryCountMismatch { entries: 3, .. })));
        assert!(violations
            .iter()
            .any(|v| matches!(v, Violation::ForeignName { .. })));
    }

    #[test]
    fn test_missing_root_is_rejected() {
        let dir = tempfile::tempdir().unwrap();

        assert!(matches!(
            survey(&dir.path().join("absent")),
            Err(SurveyError::NotADirectory { .. })
        ));
    }
}
