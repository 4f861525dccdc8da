use crate::{
    assembler::{DocumentMeta, OutputAssembler, OutputDocument},
    cancel::CancelToken,
    config::Config,
    error::{Error, Result},
    file::FileEntry,
    filter::OwnOutputs,
    git,
    partition::{Part, Partitioner},
    render::{BlockSummary, ContentRenderer, RenderedBlock},
    scanner::{ScanOutput, ScanReport, TreeScanner},
    tree::StructureTree,
    writer::Writer,
};
use rayon::prelude::*;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, trace, warn};

/// Statistics collected during pipeline execution.
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Files selected by the scan
    pub files_selected: usize,

    /// Files rendered with their contents
    pub files_rendered: usize,

    /// Files replaced by a placeholder
    pub files_skipped: usize,

    /// Number of output parts
    pub total_parts: usize,

    /// Token estimate of all blocks
    pub total_tokens: usize,

    /// Token estimate of the largest part's blocks
    pub max_part_tokens: usize,

    /// Cost reserved in part 1 for the header and structure tree
    pub reserved_tokens: usize,

    /// Per-part token budget
    pub budget: usize,

    /// Render workers
    pub workers: usize,

    /// Scan counters and warnings
    pub scan: ScanReport,

    /// Total execution time
    pub duration: Duration,

    /// Time spent scanning
    pub scan_duration: Duration,

    /// Time spent measuring blocks
    pub render_duration: Duration,

    /// Time spent assembling and writing parts
    pub write_duration: Duration,

    /// Output directory path
    pub output_directory: String,

    /// Paths of the written documents
    pub files_written: Vec<PathBuf>,
}

impl PipelineStats {
    /// Prints a human-readable summary to stdout.
    pub fn print_summary(&self) {
        println!();
        println!("Snapshot summary");
        println!(
            "  Files:   {} selected, {} rendered, {} skipped",
            self.files_selected, self.files_rendered, self.files_skipped
        );
        println!(
            "  Scan:    {} examined, {} warning(s)",
            self.scan.files_examined,
            self.scan.warnings.len()
        );
        println!(
            "  Parts:   {} of at most {} tokens ({} reserved for the header)",
            self.total_parts, self.budget, self.reserved_tokens
        );
        println!(
            "  Tokens:  {} in total, {} in the largest part",
            self.total_tokens, self.max_part_tokens
        );
        if self.files_written.is_empty() {
            println!("  Output:  nothing written");
        } else {
            println!(
                "  Output:  {} file(s) in {}",
                self.files_written.len(),
                self.output_directory
            );
        }
        println!(
            "  Time:    {:.2}s (scan {:.2}s, measure {:.2}s, write {:.2}s)",
            self.duration.as_secs_f64(),
            self.scan_duration.as_secs_f64(),
            self.render_duration.as_secs_f64(),
            self.write_duration.as_secs_f64()
        );
    }
}

/// Every document of a run, held in memory at once.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Assembled documents in part order
    pub documents: Vec<OutputDocument>,

    /// Measured blocks in scan order
    pub blocks: Vec<BlockSummary>,

    /// Partition of `blocks`
    pub parts: Vec<Part>,

    /// Scanned directory structure
    pub tree: StructureTree,

    /// Run statistics
    pub stats: PipelineStats,
}

/// Where the scanned files come from for the duration of a run.
struct Source {
    root: PathBuf,
    meta: DocumentMeta,
    own_outputs: Option<OwnOutputs>,
    _clone: Option<git::ClonedRepo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlanMode {
    Complete,
    /// Cancelled while measuring; only closed parts are kept
    Incomplete,
    StructureOnly,
}

/// A partitioned run whose documents have not been assembled yet.
///
/// Planning keeps the cost, status and path of each block but not its text.
/// A document is rendered again from disk when it is requested, so only one
/// part's text is held at a time.
pub struct Plan {
    source: Source,
    assembler: OutputAssembler,
    renderer: ContentRenderer,
    pool: rayon::ThreadPool,
    entries: Vec<FileEntry>,
    blocks: Vec<BlockSummary>,
    parts: Vec<Part>,
    tree: StructureTree,
    stats: PipelineStats,
    mode: PlanMode,
}

impl fmt::Debug for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plan")
            .field("root", &self.source.root)
            .field("mode", &self.mode)
            .field("blocks", &self.blocks.len())
            .field("parts", &self.parts)
            .finish_non_exhaustive()
    }
}

impl Plan {
    /// Measured blocks in scan order.
    #[must_use]
    pub fn blocks(&self) -> &[BlockSummary] {
        &self.blocks
    }

    /// The partition of [`Self::blocks`].
    #[must_use]
    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// Scanned directory structure.
    #[must_use]
    pub const fn tree(&self) -> &StructureTree {
        &self.tree
    }

    /// Statistics gathered while planning.
    #[must_use]
    pub const fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    /// False when the run was cancelled before every file was measured.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.mode != PlanMode::Incomplete
    }

    /// Number of documents [`Self::documents`] yields.
    #[must_use]
    pub fn document_count(&self) -> usize {
        match self.mode {
            PlanMode::StructureOnly => 1,
            PlanMode::Complete | PlanMode::Incomplete => self.parts.len(),
        }
    }

    /// Renders the blocks of `part` and assembles its document.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `part` does not belong to this plan,
    /// and a template error if the header fails to render.
    #[instrument(skip_all, fields(part = part.index))]
    pub fn document(&self, part: &Part) -> Result<OutputDocument> {
        let (Some(entries), Some(summaries)) = (
            self.entries.get(part.blocks.clone()),
            self.blocks.get(part.blocks.clone()),
        ) else {
            return Err(Error::config(format!(
                "Part {} does not belong to this run",
                part.index
            )));
        };

        let offset = part.blocks.start;
        let renderer = &self.renderer;
        let blocks: Vec<RenderedBlock> = self.pool.install(|| {
            entries
                .par_iter()
                .enumerate()
                .map(|(i, entry)| renderer.render(offset + i, entry))
                .collect()
        });

        for (block, summary) in blocks.iter().zip(summaries) {
            if block.tokens != summary.tokens {
                warn!(
                    "{} changed since it was measured ({} -> {} tokens)",
                    block.relative_path, summary.tokens, block.tokens
                );
            }
        }

        self.assembler.assemble_part(
            part,
            self.parts.len(),
            &blocks,
            &self.tree,
            self.mode == PlanMode::Incomplete,
        )
    }

    /// Assembles the documents one at a time, in part order.
    pub fn documents(&self) -> impl Iterator<Item = Result<OutputDocument>> + '_ {
        let structure = (self.mode == PlanMode::StructureOnly)
            .then(|| self.assembler.structure_only(&self.tree, self.entries.len()));

        structure
            .into_iter()
            .chain(self.parts.iter().map(|part| self.document(part)))
    }
}

/// Main pipeline orchestrator: scan, measure, partition, assemble, write.
#[derive(Debug)]
pub struct Pipeline {
    config: Config,
    cancel: CancelToken,
}

impl Pipeline {
    /// Creates a new pipeline with the given configuration.
    ///
    /// A configured timeout starts counting here.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration validation fails.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let cancel = config
            .timeout
            .map_or_else(CancelToken::new, CancelToken::with_timeout);

        Ok(Self { config, cancel })
    }

    /// Uses `cancel` instead of the pipeline's own token.
    #[must_use]
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// A handle that cancels this pipeline when triggered.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Executes the complete pipeline and returns statistics.
    ///
    /// # Process
    ///
    /// 1. **Scan**: Walks the root and builds the structure tree
    /// 2. **Measure**: Renders every selected file on the worker pool and
    ///    keeps only its token cost
    /// 3. **Partition**: Packs blocks into token-bounded parts
    /// 4. **Write**: Renders, assembles and writes one part at a time
    ///
    /// When the run is cancelled, the parts completed so far are still
    /// written (marked incomplete) before the partial result is returned.
    /// Cancellation is observed while scanning and measuring; once writing
    /// starts it runs to the end.
    ///
    /// # Errors
    ///
    /// Returns an error if any stage fails critically.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use codesnap::{Config, Pipeline};
    ///
    /// # fn main() -> anyhow::Result<()> {
    /// let config = Config::builder()
    ///     .root_dir("./src")
    ///     .build()?;
    ///
    /// let stats = Pipeline::new(config)?.run()?;
    /// stats.print_summary();
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip(self), fields(root_dir = %self.config.root_dir.display()))]
    pub fn run(self) -> Result<PipelineStats> {
        let plan = self.plan()?;
        let mut stats = plan.stats().clone();

        let written = if self.config.dry_run || self.config.structure_only {
            if self.config.dry_run {
                warn!("Dry run mode enabled - skipping file writes");
            }
            Vec::new()
        } else {
            info!(
                "Writing {} part(s) to {}",
                plan.document_count(),
                self.config.output_dir.display()
            );
            let write_start = Instant::now();
            let written = self.write(&plan)?;
            stats.write_duration = write_start.elapsed();
            stats.duration += stats.write_duration;
            written
        };

        if !plan.is_complete() {
            return Err(Error::partial(plan.parts().len(), written));
        }

        if !written.is_empty() {
            info!(
                "✓ Wrote {} files in {:.2}s",
                written.len(),
                stats.write_duration.as_secs_f64()
            );
        }
        stats.files_written = written;

        Ok(stats)
    }

    /// Runs every stage except writing and keeps all documents in memory.
    ///
    /// [`Self::plan`] is the streaming alternative for large trees.
    ///
    /// # Errors
    ///
    /// Returns a scan error for a bad root, a git error if cloning fails and
    /// a partial result if the run is cancelled.
    pub fn snapshot(&self) -> Result<Snapshot> {
        let plan = self.plan()?;
        let documents = plan.documents().collect::<Result<Vec<_>>>()?;

        if !plan.is_complete() {
            return Err(Error::partial(documents.len(), Vec::new()));
        }

        Ok(Snapshot {
            documents,
            blocks: plan.blocks,
            parts: plan.parts,
            tree: plan.tree,
            stats: plan.stats,
        })
    }

    /// Scans, measures and partitions without assembling any document.
    ///
    /// A cancelled measurement still yields a plan holding the parts that
    /// were closed before cancellation; [`Plan::is_complete`] is false then.
    ///
    /// # Errors
    ///
    /// Returns a scan error for a bad root, a git error if cloning fails, a
    /// worker pool error, and a partial result if the scan is cancelled.
    pub fn plan(&self) -> Result<Plan> {
        let start_time = Instant::now();
        let source = self.resolve_source()?;
        let assembler = OutputAssembler::new(&self.config.output_base, source.meta.clone())?;
        let estimator = self.config.tokenizer.create();
        let renderer =
            ContentRenderer::new(self.config.filter.max_file_size, Arc::clone(&estimator));
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.workers)
            .thread_name(|i| format!("codesnap-render-{i}"))
            .build()?;

        info!("Stage 1/3: Scanning {}", source.root.display());
        let scan_start = Instant::now();
        let ScanOutput {
            entries,
            tree,
            report,
        } = self.scan(&source)?;
        let scan_duration = scan_start.elapsed();

        info!(
            "✓ Selected {} files ({} examined) in {:.2}s",
            entries.len(),
            report.files_examined,
            scan_duration.as_secs_f64()
        );

        let mut stats = PipelineStats {
            files_selected: entries.len(),
            budget: self.config.max_tokens,
            workers: self.config.workers,
            scan: report,
            scan_duration,
            output_directory: self.config.output_dir.display().to_string(),
            ..PipelineStats::default()
        };

        let mut plan = Plan {
            source,
            assembler,
            renderer,
            pool,
            entries,
            blocks: Vec::new(),
            parts: Vec::new(),
            tree,
            stats: PipelineStats::default(),
            mode: PlanMode::StructureOnly,
        };

        if self.config.structure_only {
            stats.total_parts = 1;
            stats.duration = start_time.elapsed();
            plan.stats = stats;
            return Ok(plan);
        }

        info!("Stage 2/3: Measuring with {} workers...", self.config.workers);
        let render_start = Instant::now();
        let measured = self.measure(&plan);
        stats.render_duration = render_start.elapsed();

        let reserved = plan.assembler.reserved_tokens(
            &plan.tree,
            plan.entries.len(),
            estimator.as_ref(),
        )?;
        let partitioner = Partitioner::new(self.config.max_tokens).with_reserved(reserved);

        info!("Stage 3/3: Partitioning into parts of {} tokens...", self.config.max_tokens);
        let (blocks, parts, complete) = settle(&partitioner, measured);
        Self::log_part_distribution(&parts, self.config.max_tokens);

        stats.files_skipped = blocks.iter().filter(|b| b.is_skipped()).count();
        stats.files_rendered = blocks.len() - stats.files_skipped;
        stats.total_parts = parts.len();
        stats.total_tokens = blocks.iter().map(|b| b.tokens).sum();
        stats.max_part_tokens = parts.iter().map(|p| p.tokens).max().unwrap_or(0);
        stats.reserved_tokens = reserved;
        stats.duration = start_time.elapsed();

        if complete {
            info!(
                "✓ Planned {} part(s) from {} blocks in {:.2}s",
                parts.len(),
                blocks.len(),
                stats.duration.as_secs_f64()
            );
        } else {
            warn!(
                "Run cancelled after {} of {} files; {} complete part(s) kept",
                blocks.len(),
                plan.entries.len(),
                parts.len()
            );
        }

        plan.blocks = blocks;
        plan.parts = parts;
        plan.stats = stats;
        plan.mode = if complete {
            PlanMode::Complete
        } else {
            PlanMode::Incomplete
        };
        Ok(plan)
    }

    /// Assembles and writes the plan's documents, dropping each once written.
    fn write(&self, plan: &Plan) -> Result<Vec<PathBuf>> {
        let writer = Writer::new(&self.config.output_dir, self.config.backup_existing);
        plan.documents()
            .map(|document| writer.write_document(&document?))
            .collect()
    }

    /// Clones the repository if one is configured and fills in header details.
    fn resolve_source(&self) -> Result<Source> {
        let timestamp = self
            .config
            .include_timestamp
            .then(|| chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string());

        if let Some(url) = &self.config.repo_url {
            let clone = git::clone_shallow(url)?;
            let project = self
                .config
                .project_name
                .clone()
                .unwrap_or_else(|| clone.name().to_string());
            return Ok(Source {
                root: clone.path().to_path_buf(),
                meta: DocumentMeta {
                    project,
                    repository: Some(url.clone()),
                    generated_at: timestamp,
                },
                own_outputs: None,
                _clone: Some(clone),
            });
        }

        let root = self.config.root_dir.clone();
        let project = self
            .config
            .project_name
            .clone()
            .unwrap_or_else(|| project_name_for(&root));
        Ok(Source {
            meta: DocumentMeta {
                project,
                repository: git::repository_info(&root),
                generated_at: timestamp,
            },
            own_outputs: self.own_outputs(&root)?,
            root,
            _clone: None,
        })
    }

    /// Matcher for earlier outputs when the output directory lies inside `root`.
    fn own_outputs(&self, root: &Path) -> Result<Option<OwnOutputs>> {
        let (Ok(root), Ok(output_dir)) =
            (root.canonicalize(), self.config.output_dir.canonicalize())
        else {
            return Ok(None);
        };

        match output_dir.strip_prefix(&root) {
            Ok(relative) => {
                debug!(
                    "Output directory is inside the root; skipping earlier '{}' outputs",
                    self.config.output_base
                );
                OwnOutputs::new(relative, &self.config.output_base).map(Some)
            }
            Err(_) => Ok(None),
        }
    }

    #[instrument(skip_all)]
    fn scan(&self, source: &Source) -> Result<ScanOutput> {
        TreeScanner::new(&source.root, &self.config.filter)?
            .with_root_name(source.meta.project.clone())
            .with_own_outputs(source.own_outputs.clone())
            .scan(&self.cancel)
    }

    /// Renders the plan's entries on its pool, keeping only their summaries.
    ///
    /// Slot `i` holds the summary of entry `i`, or `None` if cancellation
    /// stopped it from being dispatched.
    #[instrument(skip_all, fields(files = plan.entries.len(), workers = self.config.workers))]
    fn measure(&self, plan: &Plan) -> Vec<Option<BlockSummary>> {
        let completed = AtomicUsize::new(0);
        let total = plan.entries.len();
        let cancel = &self.cancel;
        let renderer = &plan.renderer;
        let entries = &plan.entries;

        let measured = plan.pool.install(|| {
            entries
                .par_iter()
                .enumerate()
                .map(|(index, entry)| {
                    if cancel.is_cancelled() {
                        return None;
                    }
                    let block = renderer.render(index, entry);
                    let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                    trace!("Measured {}/{}: {}", done, total, block.relative_path);
                    Some(block.into_summary())
                })
                .collect::<Vec<_>>()
        });

        debug!(
            "Measured {} of {} files",
            completed.load(Ordering::Relaxed),
            total
        );
        measured
    }

    /// Logs information about part distribution.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_precision_loss,
        clippy::cast_sign_loss
    )]
    fn log_part_distribution(parts: &[Part], budget: usize) {
        let threshold = (budget as f64 * 0.9) as usize;
        let near_limit = parts.iter().filter(|p| p.tokens > threshold).count();
        let oversized = parts.iter().filter(|p| p.tokens > budget).count();

        if near_limit > 0 {
            debug!("  {} part(s) are >90% of token budget", near_limit);
        }
        if oversized > 0 {
            warn!(
                "  {} file(s) exceed the token budget on their own and were emitted alone",
                oversized
            );
        }
    }
}

/// Partitions the measured blocks.
///
/// When a slot is missing only the blocks before it are usable, and the last
/// part of their partition is dropped because it might still have grown.
/// Returns the kept blocks, their parts, and whether every slot was filled.
fn settle(
    partitioner: &Partitioner,
    measured: Vec<Option<BlockSummary>>,
) -> (Vec<BlockSummary>, Vec<Part>, bool) {
    let total = measured.len();
    let mut blocks: Vec<BlockSummary> = measured.into_iter().map_while(|block| block).collect();
    let mut parts = partitioner.partition(&blocks);

    if blocks.len() == total {
        return (blocks, parts, true);
    }

    parts.pop();
    blocks.truncate(parts.last().map_or(0, |part| part.blocks.end));
    (blocks, parts, false)
}

/// Base name of the root, falling back to the path as given.
fn project_name_for(root: &Path) -> String {
    let resolved = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
    resolved
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| root.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::BlockStatus;
    use assert_fs::prelude::*;
    use predicates::prelude::*;

    fn create_test_config(root: &Path) -> crate::config::ConfigBuilder {
        Config::builder()
            .root_dir(root)
            .output_dir(root.join("out"))
            .project_name("demo")
    }

    fn summary(index: usize, tokens: usize) -> BlockSummary {
        BlockSummary {
            index,
            relative_path: format!("f{index}.py"),
            tokens,
            status: BlockStatus::Rendered,
        }
    }

    #[test]
    fn test_pipeline_basic_execution() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("file1.rs").write_str("fn main() {}").unwrap();
        temp.child("file2.rs").write_str("pub fn test() {}").unwrap();

        let config = create_test_config(temp.path()).build().unwrap();
        let stats = Pipeline::new(config).unwrap().run().unwrap();

        assert_eq!(stats.files_selected, 2);
        assert_eq!(stats.files_rendered, 2);
        assert_eq!(stats.total_parts, 1);
        assert_eq!(stats.files_written.len(), 1);
        temp.child("out/codesnap.md")
            .assert(predicate::str::contains("### File: file1.rs"));
    }

    #[test]
    fn test_pipeline_dry_run() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("file.rs").write_str("fn main() {}").unwrap();

        let config = create_test_config(temp.path()).dry_run(true).build().unwrap();
        let stats = Pipeline::new(config).unwrap().run().unwrap();

        assert!(stats.files_written.is_empty());
        temp.child("out").assert(predicate::path::missing());
    }

    #[test]
    fn test_structure_only() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("src/main.py").write_str("print(1)").unwrap();

        let config = create_test_config(temp.path())
            .structure_only(true)
            .build()
            .unwrap();
        let snapshot = Pipeline::new(config).unwrap().snapshot().unwrap();

        assert_eq!(snapshot.documents.len(), 1);
        assert!(snapshot.blocks.is_empty());
        let content = &snapshot.documents[0].content;
        assert!(content.contains("demo\n└── src\n    └── main.py"));
        assert!(!content.contains("\n### File: "));
    }

    #[test]
    fn test_empty_project_yields_single_part() {
        let temp = assert_fs::TempDir::new().unwrap();

        let config = create_test_config(temp.path()).build().unwrap();
        let snapshot = Pipeline::new(config).unwrap().snapshot().unwrap();

        assert_eq!(snapshot.parts.len(), 1);
        assert_eq!(snapshot.documents.len(), 1);
        assert_eq!(snapshot.documents[0].file_name, "codesnap.md");
    }

    #[test]
    fn test_plan_renders_text_only_when_asked() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("a.py").write_str("before = 1\n").unwrap();

        let config = create_test_config(temp.path()).build().unwrap();
        let plan = Pipeline::new(config).unwrap().plan().unwrap();
        assert_eq!(plan.blocks().len(), 1);
        assert_eq!(plan.document_count(), 1);

        temp.child("a.py").write_str("after = 2\n").unwrap();
        let document = plan.document(&plan.parts()[0]).unwrap();

        assert!(document.content.contains("after = 2"));
        assert!(!document.content.contains("before = 1"));
    }

    #[test]
    fn test_foreign_part_is_rejected() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("a.py").write_str("x").unwrap();

        let config = create_test_config(temp.path()).build().unwrap();
        let plan = Pipeline::new(config).unwrap().plan().unwrap();
        let foreign = Part {
            index: 7,
            blocks: 3..9,
            tokens: 0,
        };

        assert!(plan.document(&foreign).unwrap_err().is_config());
    }

    #[test]
    fn test_cancelled_before_rendering_keeps_no_parts() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("a.py").write_str("x").unwrap();

        let config = create_test_config(temp.path()).build().unwrap();
        let pipeline = Pipeline::new(config)
            .unwrap()
            .with_cancel_token(CancelToken::new());
        pipeline.cancel_token().cancel();
        let err = pipeline.run().unwrap_err();

        match err {
            Error::PartialResult { completed, written } => {
                assert_eq!(completed, 0);
                assert!(written.is_empty());
            }
            other => panic!("unexpected error: {other}"),
        }
        temp.child("out/codesnap.md").assert(predicate::path::missing());
    }

    #[test]
    fn test_settle_keeps_closed_parts_only() {
        let measured = vec![
            Some(summary(0, 10)),
            Some(summary(1, 10)),
            Some(summary(2, 10)),
            None,
            Some(summary(4, 10)),
        ];

        let (blocks, parts, complete) = settle(&Partitioner::new(10), measured);

        assert!(!complete);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[1].blocks, 1..2);
        assert_eq!(blocks.len(), 2);
    }

    #[test]
    fn test_settle_complete() {
        let (blocks, parts, complete) = settle(&Partitioner::new(10), Vec::new());
        assert!(complete);
        assert!(blocks.is_empty());
        assert_eq!(parts.len(), 1);

        let (_, parts, complete) = settle(&Partitioner::new(10), vec![None]);
        assert!(!complete);
        assert!(parts.is_empty());
    }

    #[test]
    fn test_rerun_into_root_skips_own_outputs() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("main.py").write_str("print(1)\n").unwrap();
        temp.child("README.md").write_str("# Demo\n").unwrap();

        let run = || {
            let config = Config::builder()
                .root_dir(temp.path())
                .output_dir(temp.path())
                .project_name("demo")
                .build()
                .unwrap();
            Pipeline::new(config).unwrap().run().unwrap()
        };

        let first = run();
        let content = std::fs::read_to_string(temp.path().join("codesnap.md")).unwrap();
        let second = run();

        assert_eq!(first.files_selected, 2);
        assert_eq!(second.files_selected, 2);
        temp.child("codesnap.md").assert(content.as_str());
        temp.child("codesnap.md")
            .assert(predicate::str::contains("codesnap.md").not());
    }

    #[test]
    fn test_missing_root_fails() {
        let temp = assert_fs::TempDir::new().unwrap();
        let config = create_test_config(&temp.path().join("missing"))
            .build()
            .unwrap();

        let err = Pipeline::new(config).unwrap().run().unwrap_err();
        assert!(err.is_scan());
    }

    #[test]
    fn test_project_name_defaults_to_directory_name() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("my-project/a.py").write_str("x").unwrap();
        let root = temp.path().join("my-project");

        assert_eq!(project_name_for(&root), "my-project");
    }
}
