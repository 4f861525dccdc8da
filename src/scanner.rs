use crate::{
    cancel::CancelToken,
    error::{Error, Result},
    file::FileEntry,
    filter::{FileVerdict, FilterConfig, OwnOutputs, PathFilter, extension_of},
    tree::{StructureTree, TreeBuilder, TreeNode},
};
use ignore::{DirEntry, WalkBuilder};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, instrument, trace, warn};

/// Counters and warnings collected during a scan.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanReport {
    /// Number of files whose metadata was read
    pub files_examined: usize,

    /// Files present in the tree but not selected because of their extension
    pub excluded_by_extension: usize,

    /// Selected files over the size limit; they render as placeholders
    pub oversized: usize,

    /// Non-fatal problems (symlink loops, unreadable subdirectories)
    pub warnings: Vec<String>,
}

/// Everything a scan produces.
#[derive(Debug, Clone)]
pub struct ScanOutput {
    /// Selected files in walk order
    pub entries: Vec<FileEntry>,

    /// Directory hierarchy as seen during the walk
    pub tree: StructureTree,

    /// Counters and warnings
    pub report: ScanReport,
}

/// Walks a root directory and selects the files to render.
///
/// The walk is sequential and sorted by file name within each directory, so
/// the order of `entries` is a pure function of the filesystem state.
#[derive(Debug, Clone)]
pub struct TreeScanner {
    root: PathBuf,
    root_name: String,
    filter: PathFilter,
    own_outputs: Option<OwnOutputs>,
    respect_gitignore: bool,
}

impl TreeScanner {
    /// Creates a scanner for `root`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the filter does not compile.
    pub fn new(root: impl Into<PathBuf>, config: &FilterConfig) -> Result<Self> {
        let root = root.into();
        let root_name = root
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| root.display().to_string());

        Ok(Self {
            root,
            root_name,
            filter: PathFilter::new(config)?,
            own_outputs: None,
            respect_gitignore: config.respect_gitignore,
        })
    }

    /// Overrides the name shown at the top of the structure tree.
    #[must_use]
    pub fn with_root_name(mut self, name: impl Into<String>) -> Self {
        self.root_name = name.into();
        self
    }

    /// Leaves out files matching `outputs`, the documents of earlier runs.
    #[must_use]
    pub fn with_own_outputs(mut self, outputs: Option<OwnOutputs>) -> Self {
        self.own_outputs = outputs;
        self
    }

    /// Walks the root, building the file list and the structure tree in one pass.
    ///
    /// # Errors
    ///
    /// Returns a scan error if the root does not exist or is not a readable
    /// directory, and a partial result if `cancel` trips mid-walk.
    #[instrument(skip_all, fields(root = %self.root.display()))]
    pub fn scan(&self, cancel: &CancelToken) -> Result<ScanOutput> {
        self.check_root()?;

        let mut entries = Vec::new();
        let mut tree = TreeBuilder::new(self.root_name.clone());
        let mut report = ScanReport::default();

        for result in self.walker().build() {
            if cancel.is_cancelled() {
                warn!("Scan cancelled after {} files", entries.len());
                return Err(Error::partial(0, Vec::new()));
            }

            let entry = match result {
                Ok(entry) => entry,
                Err(err) => {
                    self.record_walk_error(&err, &mut report)?;
                    continue;
                }
            };

            if entry.depth() == 0 {
                continue;
            }

            let Some(file_type) = entry.file_type() else {
                continue;
            };
            let name = entry.file_name().to_string_lossy().into_owned();
            let node = if file_type.is_dir() {
                TreeNode::directory(name.clone())
            } else {
                TreeNode::file(name.clone())
            };
            let node = match link_target(&entry) {
                Some(target) => node.linked_to(target),
                None => node,
            };

            if file_type.is_dir() {
                trace!("Entering {}", entry.path().display());
                tree.push(entry.depth(), node);
                continue;
            }
            if !file_type.is_file() {
                continue;
            }

            tree.push(entry.depth(), node);
            if let Some(file) = self.select(&entry, &name, &mut report) {
                entries.push(file);
            }
        }

        debug!(
            "Scan complete: {} selected, {} examined, {} warnings",
            entries.len(),
            report.files_examined,
            report.warnings.len()
        );

        Ok(ScanOutput {
            entries,
            tree: tree.finish(),
            report,
        })
    }

    fn check_root(&self) -> Result<()> {
        let metadata =
            fs::metadata(&self.root).map_err(|e| Error::scan(&self.root, e.to_string()))?;
        if !metadata.is_dir() {
            return Err(Error::scan(&self.root, "not a directory"));
        }
        fs::read_dir(&self.root).map_err(|e| Error::scan(&self.root, e.to_string()))?;
        Ok(())
    }

    fn walker(&self) -> WalkBuilder {
        let mut builder = WalkBuilder::new(&self.root);
        builder
            .standard_filters(false)
            .hidden(false)
            .follow_links(true)
            .sort_by_file_name(|a, b| a.cmp(b));

        if self.respect_gitignore {
            builder
                .git_ignore(true)
                .git_exclude(true)
                .require_git(false);
        }

        // Pruning here keeps excluded directories and names from ever being stat'ed.
        let filter = self.filter.clone();
        let own_outputs = self.own_outputs.clone();
        let root = self.root.clone();
        builder.filter_entry(move |entry| {
            let name = entry.file_name().to_string_lossy();
            if entry.file_type().is_some_and(|ft| ft.is_dir()) {
                return filter.should_descend(&name, entry.depth());
            }
            if filter.is_name_excluded(&name) {
                return false;
            }
            match (&own_outputs, entry.path().strip_prefix(&root)) {
                (Some(outputs), Ok(relative)) => !outputs.matches(relative),
                _ => true,
            }
        });

        builder
    }

    /// Applies the extension and size rules to a file that survived pruning.
    fn select(&self, entry: &DirEntry, name: &str, report: &mut ScanReport) -> Option<FileEntry> {
        let extension = extension_of(name);

        // Extension is decidable without metadata.
        if self.filter.verdict(name, extension.as_deref(), 0) == FileVerdict::ExcludedExtension {
            report.excluded_by_extension += 1;
            return None;
        }

        report.files_examined += 1;
        let size = match entry.metadata() {
            Ok(metadata) => metadata.len(),
            Err(err) => {
                let message = format!("Cannot stat {}: {err}", entry.path().display());
                warn!("{message}");
                report.warnings.push(message);
                return None;
            }
        };

        // Oversized files stay selected; the renderer emits a placeholder for them.
        match self.filter.verdict(name, extension.as_deref(), size) {
            FileVerdict::Include => {}
            FileVerdict::TooLarge => {
                debug!("{} is over the size limit ({} bytes)", name, size);
                report.oversized += 1;
            }
            _ => return None,
        }

        Some(FileEntry::new(
            entry.path().to_path_buf(),
            relative_path(entry.path(), &self.root),
            size,
            entry.depth(),
        ))
    }

    fn record_walk_error(&self, err: &ignore::Error, report: &mut ScanReport) -> Result<()> {
        if err.depth() == Some(0) {
            return Err(Error::scan(&self.root, err.to_string()));
        }

        let message = match find_loop(err) {
            Some((ancestor, child)) => format!(
                "Symlink loop: {} points to ancestor {}",
                child.display(),
                ancestor.display()
            ),
            None => err.to_string(),
        };
        warn!("{message}");
        report.warnings.push(message);
        Ok(())
    }
}

fn find_loop(err: &ignore::Error) -> Option<(&Path, &Path)> {
    match err {
        ignore::Error::Loop { ancestor, child } => Some((ancestor, child)),
        ignore::Error::WithDepth { err, .. }
        | ignore::Error::WithPath { err, .. }
        | ignore::Error::WithLineNumber { err, .. } => find_loop(err),
        _ => None,
    }
}

fn link_target(entry: &DirEntry) -> Option<String> {
    if !entry.path_is_symlink() {
        return None;
    }
    fs::read_link(entry.path())
        .ok()
        .map(|target| target.to_string_lossy().into_owned())
}

/// Relative, `/`-separated form of `path` below `root`.
fn relative_path(path: &Path, root: &Path) -> String {
    let relative = pathdiff::diff_paths(path, root).unwrap_or_else(|| path.to_path_buf());
    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
