use once_cell::sync::Lazy;
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

static PROSE_EXTENSIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    ["md", "markdown", "mdx", "txt", "rst", "adoc"]
        .into_iter()
        .collect()
});

static LANGUAGES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    [
        ("rs", "rust"),
        ("py", "python"),
        ("js", "javascript"),
        ("mjs", "javascript"),
        ("cjs", "javascript"),
        ("ts", "typescript"),
        ("jsx", "jsx"),
        ("tsx", "tsx"),
        ("go", "go"),
        ("java", "java"),
        ("c", "c"),
        ("h", "c"),
        ("cpp", "cpp"),
        ("cc", "cpp"),
        ("cxx", "cpp"),
        ("hpp", "cpp"),
        ("hh", "cpp"),
        ("hxx", "cpp"),
        ("cs", "csharp"),
        ("rb", "ruby"),
        ("php", "php"),
        ("swift", "swift"),
        ("kt", "kotlin"),
        ("scala", "scala"),
        ("dart", "dart"),
        ("sh", "bash"),
        ("bash", "bash"),
        ("zsh", "zsh"),
        ("fish", "fish"),
        ("ps1", "powershell"),
        ("html", "html"),
        ("htm", "html"),
        ("css", "css"),
        ("scss", "scss"),
        ("sass", "sass"),
        ("xml", "xml"),
        ("json", "json"),
        ("yaml", "yaml"),
        ("yml", "yaml"),
        ("toml", "toml"),
        ("ini", "ini"),
        ("sql", "sql"),
        ("graphql", "graphql"),
        ("gql", "graphql"),
        ("proto", "protobuf"),
    ]
    .into_iter()
    .collect()
});

/// A file selected by the scanner.
///
/// Entries are immutable once created; their position in the scan output is
/// the order in which they appear in every part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Absolute path to the file
    pub absolute_path: PathBuf,

    /// Path relative to the root, `/`-separated
    pub relative_path: String,

    /// Size in bytes at scan time
    pub size: u64,

    /// Distance from the root (files directly in the root have depth 1)
    pub depth: usize,
}

impl FileEntry {
    /// Creates a new entry.
    #[must_use]
    pub fn new(absolute_path: PathBuf, relative_path: String, size: u64, depth: usize) -> Self {
        Self {
            absolute_path,
            relative_path,
            size,
            depth,
        }
    }

    /// Lowercase extension without the leading dot.
    #[must_use]
    pub fn extension(&self) -> Option<String> {
        self.absolute_path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase)
    }
}

/// Returns true for prose and markup formats that are emitted as-is.
#[must_use]
pub(crate) fn is_prose(extension: Option<&str>) -> bool {
    extension.is_some_and(|ext| PROSE_EXTENSIONS.contains(ext))
}

/// Fence language tag for an extension (without the dot).
///
/// Unknown extensions are used as the tag, minus any character that could
/// end the info string early; files without one get no tag.
#[must_use]
pub(crate) fn language_for(extension: Option<&str>) -> Cow<'_, str> {
    let Some(ext) = extension else {
        return Cow::Borrowed("");
    };
    if let Some(&language) = LANGUAGES.get(ext) {
        return Cow::Borrowed(language);
    }
    if ext.chars().all(is_tag_char) {
        Cow::Borrowed(ext)
    } else {
        Cow::Owned(ext.chars().filter(|&c| is_tag_char(c)).collect())
    }
}

fn is_tag_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '_' | '#' | '.')
}

/// NUL bytes never occur in text; their presence marks binary content.
#[must_use]
pub(crate) fn looks_binary(bytes: &[u8]) -> bool {
    memchr::memchr(0, bytes).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_extension() {
        let entry = FileEntry::new(PathBuf::from("/p/src/Main.PY"), "src/Main.PY".into(), 3, 2);
        assert_eq!(entry.extension().as_deref(), Some("py"));

        let entry = FileEntry::new(PathBuf::from("/p/Makefile"), "Makefile".into(), 3, 1);
        assert_eq!(entry.extension(), None);
    }

    #[test]
    fn test_is_prose() {
        assert!(is_prose(Some("md")));
        assert!(is_prose(Some("txt")));
        assert!(!is_prose(Some("rs")));
        assert!(!is_prose(None));
    }

    #[test]
    fn test_language_for() {
        let cases = [
            (Some("rs"), "rust"),
            (Some("py"), "python"),
            (Some("h"), "c"),
            (Some("yml"), "yaml"),
            (Some("xyz"), "xyz"),
            (Some("c++"), "c++"),
            (Some("a`b c~"), "ab"),
            (None, ""),
        ];
        for (ext, expected) in cases {
            assert_eq!(language_for(ext), expected);
        }
    }

    #[test]
    fn test_looks_binary() {
        assert!(looks_binary(&[b'a', 0, b'b']));
        assert!(!looks_binary(b"plain text"));
        assert!(!looks_binary(b""));
    }
}
