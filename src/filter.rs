//! Path filtering.
//!
//! Decides which directories are descended into and which files are
//! included. Everything here is a pure function of the configuration and the
//! arguments; no filesystem access happens in this module.

use crate::error::{Error, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Default maximum file size (2 MB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 2 * 1024 * 1024;

const DEFAULT_EXTENSIONS: &[&str] = &[
    ".py", ".js", ".java", ".cpp", ".c", ".html", ".css", ".ts", ".go", ".dart", ".rs", ".rb",
    ".php", ".swift", ".md",
];

const DEFAULT_EXCLUDE_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    "__pycache__",
    ".vscode",
    ".github",
    "mocks",
    "build",
    "dist",
    "tmp",
    "bin",
];

const DEFAULT_EXCLUDE_PATTERNS: &[&str] = &["*.g.dart", "*.freezed.dart", ".DS_Store"];

/// File selection rules.
///
/// An empty `extensions` set means every extension is accepted unless some
/// other rule excludes the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterConfig {
    /// Included extensions, dot-prefixed, compared case-insensitively
    pub extensions: BTreeSet<String>,

    /// Directory names that are never descended into (exact, case-sensitive)
    pub exclude_dirs: BTreeSet<String>,

    /// Filename glob patterns, matched case-insensitively against the whole name
    pub exclude_patterns: Vec<String>,

    /// Exact filenames that are never included
    pub exclude_files: BTreeSet<String>,

    /// Files larger than this many bytes are skipped
    pub max_file_size: u64,

    /// Descend into subdirectories of the root
    pub recursive: bool,

    /// Honour `.gitignore` files found in the tree
    pub respect_gitignore: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(ToString::to_string).collect(),
            exclude_dirs: DEFAULT_EXCLUDE_DIRS.iter().map(ToString::to_string).collect(),
            exclude_patterns: DEFAULT_EXCLUDE_PATTERNS
                .iter()
                .map(ToString::to_string)
                .collect(),
            exclude_files: BTreeSet::new(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            recursive: true,
            respect_gitignore: false,
        }
    }
}

impl FilterConfig {
    /// Creates a configuration that excludes nothing and accepts every extension.
    #[must_use]
    pub fn permissive() -> Self {
        Self {
            extensions: BTreeSet::new(),
            exclude_dirs: BTreeSet::new(),
            exclude_patterns: Vec::new(),
            exclude_files: BTreeSet::new(),
            max_file_size: u64::MAX,
            recursive: true,
            respect_gitignore: false,
        }
    }
}

/// Normalises a user supplied extension to its lowercase, dot-prefixed form.
///
/// # Errors
///
/// Returns a configuration error for empty extensions or extensions that
/// contain a path separator.
pub fn normalize_extension(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let bare = trimmed.strip_prefix('.').unwrap_or(trimmed);

    if bare.is_empty() {
        return Err(Error::config(format!("Empty file extension: '{raw}'")));
    }
    if bare.contains(['/', '\\']) {
        return Err(Error::config(format!(
            "File extension must not contain a path separator: '{raw}'"
        )));
    }

    Ok(format!(".{}", bare.to_lowercase()))
}

/// Returns the lowercase, dot-prefixed extension of a filename.
///
/// Dotfiles such as `.gitignore` have no extension.
#[must_use]
pub fn extension_of(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_lowercase()))
}

/// Outcome of evaluating a single file against the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileVerdict {
    /// The file is part of the snapshot
    Include,
    /// Exact filename is excluded
    ExcludedName,
    /// Filename matches an excluded pattern
    ExcludedPattern,
    /// Extension is not in the included set
    ExcludedExtension,
    /// File exceeds the size limit
    TooLarge,
}

/// Compiled, immutable form of [`FilterConfig`].
#[derive(Debug, Clone)]
pub struct PathFilter {
    extensions: BTreeSet<String>,
    exclude_dirs: BTreeSet<String>,
    exclude_files: BTreeSet<String>,
    exclude_patterns: GlobSet,
    max_file_size: u64,
    recursive: bool,
}

impl PathFilter {
    /// Compiles the filter configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if an extension is malformed, a glob pattern does not
    /// compile, or the size limit is zero.
    pub fn new(config: &FilterConfig) -> Result<Self> {
        if config.max_file_size == 0 {
            return Err(Error::config("max file size must be greater than 0"));
        }

        let extensions = config
            .extensions
            .iter()
            .map(|ext| normalize_extension(ext))
            .collect::<Result<BTreeSet<_>>>()?;

        Ok(Self {
            extensions,
            exclude_dirs: config.exclude_dirs.clone(),
            exclude_files: config.exclude_files.clone(),
            exclude_patterns: Self::build_globset(&config.exclude_patterns)?,
            max_file_size: config.max_file_size,
            recursive: config.recursive,
        })
    }

    fn build_globset(patterns: &[String]) -> Result<GlobSet> {
        let mut builder = GlobSetBuilder::new();

        for pattern in patterns {
            let glob = GlobBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map_err(|e| Error::invalid_pattern(pattern, e.kind().to_string()))?;
            builder.add(glob);
        }

        builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build glob set: {e}")))
    }

    /// Returns true if the scanner should enter a directory.
    ///
    /// `depth` is the directory's distance from the root, so the root's
    /// immediate subdirectories have depth 1.
    #[must_use]
    pub fn should_descend(&self, dir_name: &str, depth: usize) -> bool {
        if depth > 0 && !self.recursive {
            return false;
        }
        !self.exclude_dirs.contains(dir_name)
    }

    /// Returns true if the file should be rendered into the snapshot.
    #[must_use]
    pub fn should_include(&self, file_name: &str, extension: Option<&str>, size_bytes: u64) -> bool {
        self.verdict(file_name, extension, size_bytes) == FileVerdict::Include
    }

    /// Evaluates every file rule, reporting the first one that excludes it.
    #[must_use]
    pub fn verdict(&self, file_name: &str, extension: Option<&str>, size_bytes: u64) -> FileVerdict {
        if let Some(verdict) = self.name_verdict(file_name) {
            return verdict;
        }

        if !self.extensions.is_empty() {
            let allowed = extension
                .map(str::to_lowercase)
                .is_some_and(|ext| self.extensions.contains(&ext));
            if !allowed {
                return FileVerdict::ExcludedExtension;
            }
        }

        if size_bytes > self.max_file_size {
            return FileVerdict::TooLarge;
        }

        FileVerdict::Include
    }

    /// Returns true if the filename alone rules the file out.
    ///
    /// This needs no metadata, so the scanner applies it before stat'ing.
    #[must_use]
    pub fn is_name_excluded(&self, file_name: &str) -> bool {
        self.name_verdict(file_name).is_some()
    }

    fn name_verdict(&self, file_name: &str) -> Option<FileVerdict> {
        if self.exclude_files.contains(file_name) {
            Some(FileVerdict::ExcludedName)
        } else if self.exclude_patterns.is_match(file_name) {
            Some(FileVerdict::ExcludedPattern)
        } else {
            None
        }
    }
}

/// Recognises the documents, temporaries and backups that runs write.
///
/// Only consulted when the output directory lies inside the scanned root, so
/// a rerun never snapshots the previous snapshot.
#[derive(Debug, Clone)]
pub struct OwnOutputs {
    dir: PathBuf,
    names: GlobSet,
}

impl OwnOutputs {
    /// Matches outputs named after `base` inside `dir`, given relative to the root.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the patterns derived from `base` do
    /// not compile.
    pub fn new(dir: impl Into<PathBuf>, base: &str) -> Result<Self> {
        let base = globset::escape(base);
        let mut builder = GlobSetBuilder::new();

        for document in [format!("{base}.md"), format!("{base}_part_*.md")] {
            for suffix in ["", ".tmp", ".backup.*"] {
                let pattern = format!("{document}{suffix}");
                let glob = GlobBuilder::new(&pattern)
                    .literal_separator(true)
                    .build()
                    .map_err(|e| Error::invalid_pattern(&pattern, e.kind().to_string()))?;
                builder.add(glob);
            }
        }

        Ok(Self {
            dir: dir.into(),
            names: builder
                .build()
                .map_err(|e| Error::config(format!("Failed to build glob set: {e}")))?,
        })
    }

    /// Returns true if `relative_path` (below the root) is an output file.
    #[must_use]
    pub fn matches(&self, relative_path: &Path) -> bool {
        relative_path.parent() == Some(self.dir.as_path())
            && relative_path
                .file_name()
                .is_some_and(|name| self.names.is_match(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter_with(configure: impl FnOnce(&mut FilterConfig)) -> PathFilter {
        let mut config = FilterConfig::default();
        configure(&mut config);
        PathFilter::new(&config).unwrap()
    }

    #[test]
    fn test_excluded_directory_is_case_sensitive() {
        let filter = filter_with(|_| {});
        assert!(!filter.should_descend("node_modules", 1));
        assert!(filter.should_descend("Node_Modules", 1));
        assert!(filter.should_descend("src", 3));
    }

    #[test]
    fn test_non_recursive_never_descends() {
        let filter = filter_with(|c| c.recursive = false);
        assert!(!filter.should_descend("src", 1));
        assert!(filter.should_descend("src", 0));
    }

    #[test]
    fn test_extension_matching_is_case_insensitive() {
        let filter = filter_with(|c| c.extensions = [".PY".to_string()].into());
        assert!(filter.should_include("main.py", Some(".py"), 10));
        assert!(filter.should_include("MAIN.PY", Some(".PY"), 10));
        assert!(!filter.should_include("main.rs", Some(".rs"), 10));
        assert!(!filter.should_include("Makefile", None, 10));
    }

    #[test]
    fn test_empty_extension_set_accepts_everything() {
        let filter = filter_with(|c| c.extensions.clear());
        assert!(filter.should_include("Makefile", None, 10));
        assert!(filter.should_include("data.bin", Some(".bin"), 10));
    }

    #[test]
    fn test_patterns_match_whole_name_case_insensitively() {
        let filter = filter_with(|c| c.exclude_patterns = vec!["*.min.js".to_string()]);
        assert_eq!(
            filter.verdict("app.MIN.js", Some(".js"), 1),
            FileVerdict::ExcludedPattern
        );
        assert!(filter.should_include("app.js", Some(".js"), 1));
        assert!(filter.should_include("app.min.js.map.js", Some(".js"), 1));
    }

    #[test]
    fn test_exclusion_beats_inclusion() {
        let filter = filter_with(|c| {
            c.exclude_files.insert("main.py".to_string());
        });
        assert_eq!(
            filter.verdict("main.py", Some(".py"), 1),
            FileVerdict::ExcludedName
        );
    }

    #[test]
    fn test_size_limit_is_inclusive() {
        let filter = filter_with(|c| c.max_file_size = 100);
        assert!(filter.should_include("a.py", Some(".py"), 100));
        assert_eq!(filter.verdict("a.py", Some(".py"), 101), FileVerdict::TooLarge);
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let mut config = FilterConfig::default();
        config.exclude_patterns.push("[".to_string());
        let err = PathFilter::new(&config).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_zero_size_limit_is_rejected() {
        let mut config = FilterConfig::default();
        config.max_file_size = 0;
        assert!(PathFilter::new(&config).is_err());
    }

    #[test]
    fn test_normalize_extension() {
        assert_eq!(normalize_extension("py").unwrap(), ".py");
        assert_eq!(normalize_extension(" .TS ").unwrap(), ".ts");
        assert!(normalize_extension(".").is_err());
        assert!(normalize_extension("a/b").is_err());
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("lib.RS").as_deref(), Some(".rs"));
        assert_eq!(extension_of("archive.tar.gz").as_deref(), Some(".gz"));
        assert_eq!(extension_of(".gitignore"), None);
        assert_eq!(extension_of("Makefile"), None);
    }

    #[test]
    fn test_own_outputs_in_root() {
        let outputs = OwnOutputs::new("", "codesnap").unwrap();

        assert!(outputs.matches(Path::new("codesnap.md")));
        assert!(outputs.matches(Path::new("codesnap_part_12.md")));
        assert!(outputs.matches(Path::new("codesnap.md.tmp")));
        assert!(outputs.matches(Path::new("codesnap_part_2.md.backup.1700000000")));

        assert!(!outputs.matches(Path::new("README.md")));
        assert!(!outputs.matches(Path::new("codesnap.rs")));
        assert!(!outputs.matches(Path::new("docs/codesnap.md")));
    }

    #[test]
    fn test_own_outputs_in_subdirectory() {
        let outputs = OwnOutputs::new("out/snaps", "my[snap]").unwrap();

        assert!(outputs.matches(Path::new("out/snaps/my[snap].md")));
        assert!(!outputs.matches(Path::new("out/snaps/mys.md")));
        assert!(!outputs.matches(Path::new("my[snap].md")));
    }
}
