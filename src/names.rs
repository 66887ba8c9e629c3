use chrono::{DateTime, Local};
use rand::Rng;
use std::{collections::HashSet, fs, path::Path};

/// Upper and lower case ASCII letters.
pub const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// `strftime` pattern prepended to generated file names.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

/// Draws `len` characters uniformly from [`ALPHABET`].
pub fn random_chars<R: Rng>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Draws a name of random length in `[1, max_len]`.
pub fn random_name<R: Rng>(rng: &mut R, max_len: usize) -> String {
    let len = rng.random_range(1..=max_len.max(1));

    random_chars(rng, len)
}

/// Prefixes `name` with a sortable timestamp: `YYYY-MM-DD-HH-MM-SS_<name>`.
pub fn timestamped(name: &str, at: DateTime<Local>) -> String {
    format!("{}_{}", at.format(TIMESTAMP_FORMAT), name)
}

/// Tracks the child names handed out for a single parent directory.
///
/// A name counts as taken if it was claimed through this registry or if anything
/// (file, directory, symlink) already sits at that path on disk.
#[derive(Debug)]
pub struct NameRegistry<'a> {
    parent: &'a Path,
    used: HashSet<String>,
}
impl<'a> NameRegistry<'a> {
    pub fn new(parent: &'a Path) -> Self {
        Self {
            parent,
            used: HashSet::new(),
        }
    }

    pub fn parent(&self) -> &Path {
        self.parent
    }

    pub fn is_taken(&self, name: &str) -> bool {
        self.used.contains(name) || fs::symlink_metadata(self.parent.join(name)).is_ok()
    }

    /// Draws a random name and disambiguates it against everything already taken.
    ///
    /// Conflicts are resolved by appending an incrementing suffix to the drawn base
    /// (`abc`, `abc-1`, `abc-2`, ...), so the loop always ends on a fresh name.
    pub fn claim<R: Rng>(&mut self, rng: &mut R, max_len: usize) -> String {
        let base = random_name(rng, max_len);
        let mut candidate = base.clone();
        let mut suffix = 0usize;

        while self.is_taken(&candidate) {
            suffix += 1;
            candidate = format!("{base}-{suffix}");
        }

        if suffix > 0 {
            log::warn!(
                "duplicate name '{}' in {}, using '{}'",
                base,
                self.parent.display(),
                candidate
            );
        }

        self.used.insert(candidate.clone());

        candidate
    }
}

/// Returns a random name that is not in use inside `parent`.
pub fn generate_unique_name<R: Rng>(rng: &mut R, parent: &Path, max_len: usize) -> String {
    NameRegistry::new(parent).claim(rng, max_len)
}
