use crate::{
    assembler::frame_block,
    file::{FileEntry, is_prose, language_for, looks_binary},
    token::TokenEstimator,
};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tracing::{trace, warn};

const BOM: char = '\u{feff}';
const MIN_FENCE: usize = 3;

/// Why a file was replaced by a placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The file exceeds the size limit
    TooLarge {
        /// Observed size in bytes (a lower bound when reading stopped early)
        size: u64,
        /// Configured limit in bytes
        limit: u64,
    },
    /// The bytes are not valid UTF-8 text
    Undecodable,
    /// The file could not be opened or read
    Unreadable {
        /// Underlying IO error
        message: String,
    },
}

impl fmt::Display for SkipReason {
    #[allow(clippy::cast_precision_loss)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const MB: f64 = 1024.0 * 1024.0;
        match self {
            Self::TooLarge { size, limit } => write!(
                f,
                "File too large ({:.2} MB exceeds {:.2} MB limit)",
                *size as f64 / MB,
                *limit as f64 / MB
            ),
            Self::Undecodable => f.write_str("Content is not valid UTF-8 text"),
            Self::Unreadable { message } => write!(f, "File could not be read: {message}"),
        }
    }
}

/// Outcome of rendering one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockStatus {
    /// Contents were rendered
    Rendered,
    /// A placeholder stands in for the contents
    Skipped(SkipReason),
}

/// The rendered representation of exactly one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedBlock {
    /// Position of the file in scan order
    pub index: usize,

    /// Path relative to the root
    pub relative_path: String,

    /// Framed text exactly as it will appear in the output
    pub text: String,

    /// Estimated token cost of `text`
    pub tokens: usize,

    /// Whether the contents or a placeholder were rendered
    pub status: BlockStatus,
}

impl RenderedBlock {
    /// Returns true if the block is a placeholder.
    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        matches!(self.status, BlockStatus::Skipped(_))
    }

    /// Drops the text, keeping what partitioning needs.
    #[must_use]
    pub fn into_summary(self) -> BlockSummary {
        BlockSummary {
            index: self.index,
            relative_path: self.relative_path,
            tokens: self.tokens,
            status: self.status,
        }
    }
}

/// A rendered block without its text.
///
/// Planning keeps one of these per file; the text itself is rendered again
/// when the part holding the block is assembled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSummary {
    /// Position of the file in scan order
    pub index: usize,

    /// Path relative to the root
    pub relative_path: String,

    /// Estimated token cost of the block's text
    pub tokens: usize,

    /// Whether the contents or a placeholder were rendered
    pub status: BlockStatus,
}

impl BlockSummary {
    /// Returns true if the block is a placeholder.
    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        matches!(self.status, BlockStatus::Skipped(_))
    }
}

/// Renders files into blocks.
///
/// Holds only read-only state, so one renderer is shared by every worker.
#[derive(Clone)]
pub struct ContentRenderer {
    max_file_size: u64,
    tokenizer: Arc<dyn TokenEstimator>,
}

impl ContentRenderer {
    /// Creates a renderer enforcing `max_file_size` bytes per file.
    #[must_use]
    pub fn new(max_file_size: u64, tokenizer: Arc<dyn TokenEstimator>) -> Self {
        Self {
            max_file_size,
            tokenizer,
        }
    }

    /// Renders the entry found at position `index` of the scan.
    ///
    /// Never fails: unreadable, oversized or binary files produce a
    /// placeholder block and a warning.
    pub fn render(&self, index: usize, entry: &FileEntry) -> RenderedBlock {
        let extension = entry.extension();

        let (body, status) = match self.read_text(&entry.absolute_path) {
            Ok(content) => {
                trace!("Rendered {} ({} bytes)", entry.relative_path, content.len());
                (render_body(&content, extension.as_deref()), BlockStatus::Rendered)
            }
            Err(reason) => {
                warn!("Skipping {}: {}", entry.relative_path, reason);
                (format!("> **Skipped:** {reason}\n"), BlockStatus::Skipped(reason))
            }
        };

        let text = frame_block(&entry.relative_path, &body);
        let tokens = self.tokenizer.estimate(&text);

        RenderedBlock {
            index,
            relative_path: entry.relative_path.clone(),
            text,
            tokens,
            status,
        }
    }

    /// Reads at most `max_file_size + 1` bytes and decodes them.
    fn read_text(&self, path: &Path) -> Result<String, SkipReason> {
        let unreadable = |e: std::io::Error| SkipReason::Unreadable {
            message: e.to_string(),
        };
        let limit = self.max_file_size;

        let file = File::open(path).map_err(unreadable)?;
        let size = file.metadata().map_err(unreadable)?.len();
        if size > limit {
            return Err(SkipReason::TooLarge { size, limit });
        }

        let capacity = usize::try_from(size).unwrap_or(0);
        let mut bytes = Vec::with_capacity(capacity);
        file.take(limit.saturating_add(1))
            .read_to_end(&mut bytes)
            .map_err(unreadable)?;

        let read = bytes.len() as u64;
        if read > limit {
            return Err(SkipReason::TooLarge { size: read, limit });
        }

        if looks_binary(&bytes) {
            return Err(SkipReason::Undecodable);
        }

        let mut text = String::from_utf8(bytes).map_err(|_| SkipReason::Undecodable)?;
        if text.starts_with(BOM) {
            text.drain(..BOM.len_utf8());
        }
        Ok(text)
    }
}

/// Renders file contents as plain prose or as a fenced code block.
fn render_body(content: &str, extension: Option<&str>) -> String {
    let mut body = String::with_capacity(content.len() + 32);

    if is_prose(extension) {
        body.push_str(content);
        ensure_newline(&mut body);
        return body;
    }

    let fence = fence_for(content);
    body.push_str(&fence);
    body.push_str(&language_for(extension));
    body.push('\n');
    body.push_str(content);
    ensure_newline(&mut body);
    body.push_str(&fence);
    body.push('\n');
    body
}

fn ensure_newline(text: &mut String) {
    if !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }
}

/// A backtick fence longer than any backtick run inside `content`.
pub(crate) fn fence_for(content: &str) -> String {
    "`".repeat(longest_backtick_run(content).max(MIN_FENCE - 1) + 1)
}

fn longest_backtick_run(content: &str) -> usize {
    content
        .split(|c| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0)
}
