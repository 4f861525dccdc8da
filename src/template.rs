use crate::error::{Error, Result};
use serde::Serialize;
use tera::{Context, Tera};

const HEADER_TEMPLATE: &str = "header.md";

/// Values available to the part header template.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct HeaderContext<'a> {
    pub(crate) project: &'a str,
    pub(crate) repository: Option<&'a str>,
    pub(crate) generated_at: Option<&'a str>,
    pub(crate) part_index: usize,
    pub(crate) total_parts: usize,
    pub(crate) file_count: usize,
    pub(crate) incomplete: bool,
    pub(crate) tree: Option<&'a str>,
    pub(crate) tree_fence: &'a str,
}

/// Renders the front-matter that opens every part.
pub(crate) struct TemplateEngine {
    tera: Tera,
}

impl TemplateEngine {
    /// Creates the engine with the built-in header template.
    ///
    /// # Errors
    ///
    /// Returns an error if the template fails to parse.
    pub(crate) fn new() -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_template(HEADER_TEMPLATE, include_str!("../templates/header.md.tera"))
            .map_err(|e| Error::template(HEADER_TEMPLATE, &e))?;

        Ok(Self { tera })
    }

    /// Renders a part header.
    ///
    /// The result always ends with exactly one blank line, whatever the
    /// template's trailing whitespace.
    ///
    /// # Errors
    ///
    /// Returns an error if template rendering fails.
    pub(crate) fn render_header(&self, header: &HeaderContext<'_>) -> Result<String> {
        let mut context = Context::new();
        context.insert("ctx", header);

        let rendered = self
            .tera
            .render(HEADER_TEMPLATE, &context)
            .map_err(|e| Error::template(HEADER_TEMPLATE, &e))?;

        let mut header = rendered.trim_end().to_string();
        header.push_str("\n\n");
        Ok(header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(part_index: usize, tree: Option<&str>) -> HeaderContext<'_> {
        HeaderContext {
            project: "demo",
            repository: None,
            generated_at: None,
            part_index,
            total_parts: 3,
            file_count: 7,
            incomplete: false,
            tree,
            tree_fence: "```",
        }
    }

    #[test]
    fn test_first_part_has_tree() {
        let engine = TemplateEngine::new().unwrap();
        let header = engine.render_header(&context(1, Some("demo\n└── a.py"))).unwrap();

        assert!(header.starts_with("# Codebase Snapshot: demo\n"));
        assert!(header.contains("**Part 1 of 3**"));
        assert!(header.contains("- **Project:** demo\n- **Files in this part:** 7"));
        assert!(header.contains("```text\ndemo\n└── a.py\n```"));
        assert!(header.ends_with("```\n\n"));
    }

    #[test]
    fn test_continuation_part() {
        let engine = TemplateEngine::new().unwrap();
        let header = engine.render_header(&context(2, None)).unwrap();

        assert!(header.contains("**Part 2 of 3 - Continued**"));
        assert!(!header.contains("Project Structure"));
        assert!(header.ends_with("- **Files in this part:** 7\n\n"));
    }

    #[test]
    fn test_optional_fields() {
        let engine = TemplateEngine::new().unwrap();
        let header = engine
            .render_header(&HeaderContext {
                repository: Some("https://example.com/demo.git"),
                generated_at: Some("2024-01-01 00:00:00"),
                incomplete: true,
                ..context(1, None)
            })
            .unwrap();

        assert!(header.contains(
            "- **Project:** demo\n- **Repository:** https://example.com/demo.git\n- **Generated:** 2024-01-01 00:00:00\n"
        ));
        assert!(header.contains("- **Status:** incomplete"));
    }

    #[test]
    fn test_preamble_has_no_file_heading() {
        let engine = TemplateEngine::new().unwrap();
        let header = engine.render_header(&context(1, Some("demo"))).unwrap();

        assert!(!header.contains("### File:"));
    }

    #[test]
    fn test_tree_fence_is_configurable() {
        let engine = TemplateEngine::new().unwrap();
        let header = engine
            .render_header(&HeaderContext {
                tree_fence: "````",
                ..context(1, Some("demo\n└── a```b.py"))
            })
            .unwrap();

        assert!(header.contains("````text\ndemo\n└── a```b.py\n````\n\n"));
    }

    #[test]
    fn test_paths_are_not_escaped() {
        let engine = TemplateEngine::new().unwrap();
        let header = engine
            .render_header(&context(1, Some("a&b\n└── <x>.py")))
            .unwrap();

        assert!(header.contains("a&b\n└── <x>.py"));
    }
}
