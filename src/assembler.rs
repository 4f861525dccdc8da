//! Turns parts into finished Markdown documents.
//!
//! Every part opens with the same front-matter; part 1 additionally carries
//! the structure tree. Blocks follow in index order, each framed by a divider
//! and a heading with its relative path. Assembly is pure: the same parts,
//! blocks and tree always produce byte-identical documents.

use crate::{
    error::Result,
    partition::Part,
    render::{RenderedBlock, fence_for},
    template::{HeaderContext, TemplateEngine},
    token::TokenEstimator,
    tree::StructureTree,
};
use std::fmt;

const DIVIDER: &str = "---";

/// Frames a rendered body with the block divider and its heading.
///
/// The renderer calls this so that a block's token estimate covers exactly
/// the text that ends up in the document.
#[must_use]
pub(crate) fn frame_block(relative_path: &str, body: &str) -> String {
    let mut text = String::with_capacity(body.len() + relative_path.len() + 24);
    text.push_str(DIVIDER);
    text.push_str("\n### File: ");
    text.push_str(relative_path);
    text.push_str("\n\n");
    text.push_str(body);
    text.push('\n');
    text
}

/// Suggested file name for part `index` of `total`.
#[must_use]
pub fn file_name_for(base: &str, index: usize, total: usize) -> String {
    if total <= 1 {
        format!("{base}.md")
    } else {
        numbered_file_name(base, index)
    }
}

/// Incomplete output always carries a part number, so it never takes the
/// name of a complete single-part snapshot.
fn numbered_file_name(base: &str, index: usize) -> String {
    format!("{base}_part_{index}.md")
}

/// A finished output document, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDocument {
    /// Part index (1-based)
    pub part_index: usize,

    /// Number of parts in the set
    pub total_parts: usize,

    /// Suggested file name
    pub file_name: String,

    /// Assembled Markdown
    pub content: String,
}

/// Project details repeated in every header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentMeta {
    /// Project name
    pub project: String,

    /// Repository URL, when known
    pub repository: Option<String>,

    /// Generation timestamp; absent unless explicitly requested
    pub generated_at: Option<String>,
}

/// Builds [`OutputDocument`]s from parts and blocks.
pub struct OutputAssembler {
    engine: TemplateEngine,
    meta: DocumentMeta,
    base_name: String,
}

impl fmt::Debug for OutputAssembler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputAssembler")
            .field("meta", &self.meta)
            .field("base_name", &self.base_name)
            .finish_non_exhaustive()
    }
}

impl OutputAssembler {
    /// Creates an assembler writing documents named after `base_name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the header template fails to load.
    pub fn new(base_name: impl Into<String>, meta: DocumentMeta) -> Result<Self> {
        Ok(Self {
            engine: TemplateEngine::new()?,
            meta,
            base_name: base_name.into(),
        })
    }

    /// Token cost of the part 1 header for a run with `block_count` blocks.
    ///
    /// Uses `block_count` as both the file count and the part count, which
    /// bounds the real header from above.
    ///
    /// # Errors
    ///
    /// Returns an error if template rendering fails.
    pub fn reserved_tokens(
        &self,
        tree: &StructureTree,
        block_count: usize,
        estimator: &dyn TokenEstimator,
    ) -> Result<usize> {
        let rendered_tree = tree.render();
        let header = self.header(1, block_count.max(1), block_count, false, Some(&rendered_tree))?;
        Ok(estimator.estimate(&header))
    }

    /// Assembles the document for `part` from that part's rendered blocks.
    ///
    /// `blocks` must be the blocks of `part.blocks`, in order. Parts kept from
    /// a cancelled run are marked `incomplete` and always get a numbered name.
    ///
    /// # Errors
    ///
    /// Returns an error if template rendering fails.
    pub fn assemble_part(
        &self,
        part: &Part,
        total_parts: usize,
        blocks: &[RenderedBlock],
        tree: &StructureTree,
        incomplete: bool,
    ) -> Result<OutputDocument> {
        let rendered_tree = (part.index == 1).then(|| tree.render());

        let mut content = self.header(
            part.index,
            total_parts,
            blocks.len(),
            incomplete,
            rendered_tree.as_deref(),
        )?;
        content.reserve(blocks.iter().map(|b| b.text.len()).sum());
        for block in blocks {
            content.push_str(&block.text);
        }

        let file_name = if incomplete {
            numbered_file_name(&self.base_name, part.index)
        } else {
            file_name_for(&self.base_name, part.index, total_parts)
        };

        Ok(OutputDocument {
            part_index: part.index,
            total_parts,
            file_name,
            content,
        })
    }

    /// A single document with the header and structure tree but no blocks.
    ///
    /// # Errors
    ///
    /// Returns an error if template rendering fails.
    pub fn structure_only(&self, tree: &StructureTree, file_count: usize) -> Result<OutputDocument> {
        let rendered_tree = tree.render();
        Ok(OutputDocument {
            part_index: 1,
            total_parts: 1,
            file_name: file_name_for(&self.base_name, 1, 1),
            content: self.header(1, 1, file_count, false, Some(&rendered_tree))?,
        })
    }

    fn header(
        &self,
        part_index: usize,
        total_parts: usize,
        file_count: usize,
        incomplete: bool,
        tree: Option<&str>,
    ) -> Result<String> {
        let tree_fence = tree.map(fence_for).unwrap_or_default();
        self.engine.render_header(&HeaderContext {
            project: &self.meta.project,
            repository: self.meta.repository.as_deref(),
            generated_at: self.meta.generated_at.as_deref(),
            part_index,
            total_parts,
            file_count,
            incomplete,
            tree,
            tree_fence: &tree_fence,
        })
    }
}
