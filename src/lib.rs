//! # codesnap
//!
//! Converts a source tree into size-bounded Markdown snapshots for AI
//! assistants and human reviewers.
//!
//! ## Features
//!
//! - Deterministic, sorted directory walk with configurable exclusions
//! - Parallel rendering with output identical for any worker count
//! - Greedy partitioning into parts that respect a token budget
//! - Whole files only: a file is never split across parts
//! - Optional shallow clone of a remote Git repository
//!
//! ## Quick Start
//!
//! ```no_run
//! use codesnap::{Config, Pipeline};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = Config::builder()
//!     .root_dir("./my-project")
//!     .output_dir("./snapshots")
//!     .max_tokens(12_000)
//!     .build()?;
//!
//! Pipeline::new(config)?.run()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! The library follows a pipeline architecture:
//! 1. **Scanner**: Walks the root, applies the filter, builds the structure tree
//! 2. **Renderer**: Turns each file into a framed block on a worker pool,
//!    first to measure it and again when its part is assembled
//! 3. **Partitioner**: Packs blocks into parts within the token budget
//! 4. **Assembler**: Adds front-matter and the tree to each part
//! 5. **Writer**: Persists each document atomically before the next is built

#![warn(
    missing_docs,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]
#![allow(clippy::module_name_repetitions)]

mod assembler;
mod cancel;
mod config;
mod error;
mod file;
mod filter;
mod partition;
mod pipeline;
mod render;
mod scanner;
mod template;
mod token;
mod tree;
mod writer;

pub mod git;

pub use assembler::{DocumentMeta, OutputAssembler, OutputDocument, file_name_for};
pub use cancel::CancelToken;
pub use config::{Config, ConfigBuilder, ConfigFile, DEFAULT_MAX_TOKENS, megabytes_to_bytes};
pub use error::{Error, Result};
pub use file::FileEntry;
pub use filter::{
    DEFAULT_MAX_FILE_SIZE, FileVerdict, FilterConfig, OwnOutputs, PathFilter, extension_of,
    normalize_extension,
};
pub use partition::{Part, Partitioner};
pub use pipeline::{Pipeline, PipelineStats, Plan, Snapshot};
pub use render::{BlockStatus, BlockSummary, ContentRenderer, RenderedBlock, SkipReason};
pub use scanner::{ScanOutput, ScanReport, TreeScanner};
pub use token::{TokenEstimator, TokenizerKind};
pub use tree::{StructureTree, TreeNode};
pub use writer::Writer;

/// Runs the complete snapshot pipeline with the given configuration.
///
/// This is the main entry point for the library.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration is invalid
/// - Root directory doesn't exist or is not a readable directory
/// - Cloning the repository fails
/// - Output directory cannot be created or written
/// - The run is cancelled (the completed parts are written first and their
///   paths carried in the error)
///
/// # Examples
///
/// ```no_run
/// use codesnap::{Config, run};
///
/// # fn main() -> anyhow::Result<()> {
/// let config = Config::builder()
///     .root_dir(".")
///     .build()?;
///
/// run(config)?;
/// # Ok(())
/// # }
/// ```
pub fn run(config: Config) -> Result<PipelineStats> {
    Pipeline::new(config)?.run()
}
