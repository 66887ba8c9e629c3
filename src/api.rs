use crate::{
    config::{self, GeneratorConfig},
    root::{self, prepare_root},
    survey::{self, survey, TreeSurvey, Violation},
    tree::{self, BuildReport, TreeBuilder},
};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum DatagenError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Root(#[from] root::RootError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Tree(#[from] tree::TreeError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Survey(#[from] survey::SurveyError),

    #[error("{count} invariant violation(s) found")]
    #[diagnostic(
        code(datagen::inspect::violations),
        help("The tree was not produced with these parameters, or was modified afterwards")
    )]
    Violations { count: usize },
}

/// Outcome of [`generate`].
#[derive(Debug, Clone)]
pub struct Generation {
    /// Canonical absolute path of the generated root.
    pub root: PathBuf,
    pub report: BuildReport,
}

/// Outcome of [`inspect`].
#[derive(Debug, Clone)]
pub struct Inspection {
    pub survey: TreeSurvey,
    /// Empty unless expected parameters were given and the tree breaks them.
    pub violations: Vec<Violation>,
}

/// Clears (or creates) `root` and fills it with a random tree shaped by `config`.
///
/// # Errors
///
/// Returns a [`DatagenError`] if:
///
/// - The configuration is invalid; nothing on disk is touched in that case.
/// - The root cannot be cleared or created.
/// - A directory or file cannot be created for a reason other than a name collision.
pub fn generate(config: GeneratorConfig, root: &Path, keep: bool) -> Result<Generation, DatagenError> {
    config.validate()?;

    log::info!(
        "generating tree: max_dir_depth = {}, dir_entry_count = {}, root = {}",
        config.max_depth,
        config.entry_count,
        root.display()
    );

    let root = prepare_root(root, keep)?;

    let report = TreeBuilder::from_config(config).build(&root)?;

    log::info!(
        "created {} directories and {} files under {}",
        report.directories,
        report.files,
        root.display()
    );

    Ok(Generation { root, report })
}

/// Surveys an existing tree and, given `(max_depth, entry_count)`, checks it against the
/// shape a run with those parameters produces.
///
/// # Errors
///
/// Returns a [`DatagenError`] if `root` cannot be walked. Violations are returned in the
/// [`Inspection`], not as an error.
pub fn inspect(root: &Path, expected: Option<(usize, usize)>) -> Result<Inspection, DatagenError> {
    let survey = survey(root)?;

    let violations = match expected {
        Some((max_depth, entry_count)) => survey.check(max_depth, entry_count),
        None => Vec::new(),
    };

    log::debug!(
        "surveyed {}: {} directories, {} files, {} violations",
        root.display(),
        survey.directories,
        survey.files,
        violations.len()
    );

    Ok(Inspection { survey, violations })
}
