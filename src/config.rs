use crate::error::{Error, Result};
use crate::filter::{FilterConfig, PathFilter, normalize_extension};
use crate::token::TokenizerKind;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default token budget per part.
pub const DEFAULT_MAX_TOKENS: usize = 12_000;
const DEFAULT_OUTPUT_BASE: &str = "codesnap";
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Configuration for a snapshot run.
///
/// Use [`Config::builder()`] to construct a new configuration. Once built the
/// configuration is immutable and already validated.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Config {
    /// Root directory to scan (ignored when `repo_url` is set)
    pub root_dir: PathBuf,

    /// Remote repository to shallow-clone and scan instead of `root_dir`
    pub repo_url: Option<String>,

    /// Directory receiving the output documents
    pub output_dir: PathBuf,

    /// Output base name; parts are written as `<base>.md` or `<base>_part_<i>.md`
    pub output_base: String,

    /// Token budget per part
    pub max_tokens: usize,

    /// Tokenizer implementation to use
    pub tokenizer: TokenizerKind,

    /// File selection rules
    pub filter: FilterConfig,

    /// Number of render workers
    pub workers: usize,

    /// Name shown in headers and at the top of the tree
    pub project_name: Option<String>,

    /// Add a generation timestamp to every header
    pub include_timestamp: bool,

    /// Only produce the structure tree
    pub structure_only: bool,

    /// Dry run mode (no file writes)
    pub dry_run: bool,

    /// Back up existing output files before overwriting them
    pub backup_existing: bool,

    /// Cancel the run after this long
    pub timeout: Option<Duration>,
}

impl Config {
    /// Creates a new configuration builder.
    ///
    /// # Examples
    ///
    /// ```
    /// use codesnap::Config;
    ///
    /// let config = Config::builder()
    ///     .root_dir("./src")
    ///     .max_tokens(50_000)
    ///     .build()
    ///     .expect("valid configuration");
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Validates the configuration.
    ///
    /// The root directory is not checked here; a missing root is reported by
    /// the scan.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The token budget or worker count is zero
    /// - The output base name is empty or contains a path separator
    /// - A filter rule is malformed
    pub fn validate(&self) -> Result<()> {
        if self.max_tokens == 0 {
            return Err(Error::config("max_tokens must be greater than 0"));
        }

        if self.workers == 0 {
            return Err(Error::config("workers must be greater than 0"));
        }

        if self.output_base.trim().is_empty() {
            return Err(Error::config("output name must not be empty"));
        }

        if self.output_base.contains(['/', '\\']) {
            return Err(Error::config(format!(
                "output name must not contain a path separator: '{}'",
                self.output_base
            )));
        }

        PathFilter::new(&self.filter)?;

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("."),
            repo_url: None,
            output_dir: PathBuf::from("."),
            output_base: DEFAULT_OUTPUT_BASE.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            tokenizer: TokenizerKind::Simple,
            filter: FilterConfig::default(),
            workers: default_workers(),
            project_name: None,
            include_timestamp: false,
            structure_only: false,
            dry_run: false,
            backup_existing: true,
            timeout: None,
        }
    }
}

fn default_workers() -> usize {
    num_cpus::get().max(1)
}

/// Converts a size in megabytes to bytes.
///
/// # Errors
///
/// Returns a configuration error for non-finite, negative or zero sizes.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn megabytes_to_bytes(megabytes: f64) -> Result<u64> {
    if !megabytes.is_finite() || megabytes <= 0.0 {
        return Err(Error::config(format!(
            "max size must be a positive number of megabytes, got {megabytes}"
        )));
    }

    let bytes = (megabytes * BYTES_PER_MB).round() as u64;
    if bytes == 0 {
        return Err(Error::config(format!("max size {megabytes} MB rounds to 0 bytes")));
    }
    Ok(bytes)
}

/// Settings read from a JSON configuration file.
///
/// Every key is optional. Unknown keys are rejected so that typos surface
/// instead of being silently ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Included extensions (replaces the defaults)
    pub extensions: Option<Vec<String>>,

    /// Additional excluded directory names
    pub exclude_dirs: Option<Vec<String>>,

    /// Additional excluded filename patterns
    pub exclude_patterns: Option<Vec<String>>,

    /// Additional excluded filenames
    pub exclude_files: Option<Vec<String>>,

    /// Maximum file size in megabytes
    pub max_size: Option<f64>,

    /// Only scan the root directory
    pub no_subfolders: Option<bool>,

    /// Output base name
    pub output: Option<String>,

    /// Token budget per part
    pub max_tokens: Option<usize>,

    /// Verbose logging
    pub debug: Option<bool>,

    /// Number of render workers
    pub workers: Option<usize>,

    /// Tokenizer implementation
    pub tokenizer: Option<TokenizerKind>,

    /// Honour `.gitignore` files
    pub respect_gitignore: Option<bool>,

    /// Output directory
    pub out_dir: Option<PathBuf>,
}

impl ConfigFile {
    /// Loads and parses a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the file cannot be read and a configuration
    /// error if it is not valid JSON or contains unknown keys.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        serde_json::from_str(&text)
            .map_err(|e| Error::config(format!("{}: {e}", path.display())))
    }

    /// Parses configuration from JSON text.
    ///
    /// # Errors
    ///
    /// Returns a configuration error on malformed JSON or unknown keys.
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::config(e.to_string()))
    }
}

/// Builder for creating a [`Config`].
///
/// Layers are applied in call order: start from the defaults, apply a
/// [`ConfigFile`], then command-line overrides. Setting `extensions` replaces
/// any earlier value, while exclusion lists accumulate on top of the defaults.
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    root_dir: Option<PathBuf>,
    repo_url: Option<String>,
    output_dir: Option<PathBuf>,
    output_base: Option<String>,
    max_tokens: Option<usize>,
    tokenizer: Option<TokenizerKind>,
    extensions: Option<Vec<String>>,
    exclude_dirs: Vec<String>,
    exclude_patterns: Vec<String>,
    exclude_files: Vec<String>,
    max_size_mb: Option<f64>,
    max_file_size: Option<u64>,
    recursive: Option<bool>,
    respect_gitignore: Option<bool>,
    workers: Option<usize>,
    project_name: Option<String>,
    include_timestamp: bool,
    structure_only: bool,
    dry_run: bool,
    backup_existing: Option<bool>,
    timeout: Option<Duration>,
}

impl ConfigBuilder {
    /// Applies the settings of a configuration file.
    #[must_use]
    pub fn config_file(mut self, file: &ConfigFile) -> Self {
        if let Some(extensions) = &file.extensions {
            self = self.extensions(extensions.clone());
        }
        if let Some(dirs) = &file.exclude_dirs {
            self = self.exclude_dirs(dirs.clone());
        }
        if let Some(patterns) = &file.exclude_patterns {
            self = self.exclude_patterns(patterns.clone());
        }
        if let Some(files) = &file.exclude_files {
            self = self.exclude_files(files.clone());
        }
        if let Some(mb) = file.max_size {
            self = self.max_size_mb(mb);
        }
        if let Some(no_subfolders) = file.no_subfolders {
            self.recursive = Some(!no_subfolders);
        }
        if let Some(output) = &file.output {
            self.output_base = Some(output.clone());
        }
        if let Some(tokens) = file.max_tokens {
            self.max_tokens = Some(tokens);
        }
        if let Some(workers) = file.workers {
            self.workers = Some(workers);
        }
        if let Some(tokenizer) = file.tokenizer {
            self.tokenizer = Some(tokenizer);
        }
        if let Some(respect) = file.respect_gitignore {
            self.respect_gitignore = Some(respect);
        }
        if let Some(dir) = &file.out_dir {
            self.output_dir = Some(dir.clone());
        }
        self
    }

    /// Sets the root directory to scan.
    #[must_use]
    pub fn root_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.root_dir = Some(path.into());
        self
    }

    /// Scans a shallow clone of `url` instead of a local directory.
    #[must_use]
    pub fn repo_url(mut self, url: impl Into<String>) -> Self {
        self.repo_url = Some(url.into());
        self
    }

    /// Sets the output directory.
    #[must_use]
    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(path.into());
        self
    }

    /// Sets the output base name.
    #[must_use]
    pub fn output_base(mut self, name: impl Into<String>) -> Self {
        self.output_base = Some(name.into());
        self
    }

    /// Sets the token budget per part.
    #[must_use]
    pub fn max_tokens(mut self, tokens: usize) -> Self {
        self.max_tokens = Some(tokens);
        self
    }

    /// Sets the tokenizer implementation.
    #[must_use]
    pub fn tokenizer(mut self, kind: TokenizerKind) -> Self {
        self.tokenizer = Some(kind);
        self
    }

    /// Replaces the included extensions.
    #[must_use]
    pub fn extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = Some(extensions.into_iter().map(Into::into).collect());
        self
    }

    /// Adds excluded directory names.
    #[must_use]
    pub fn exclude_dirs<I, S>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_dirs.extend(dirs.into_iter().map(Into::into));
        self
    }

    /// Adds excluded filename patterns.
    #[must_use]
    pub fn exclude_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_patterns
            .extend(patterns.into_iter().map(Into::into));
        self
    }

    /// Adds excluded filenames.
    #[must_use]
    pub fn exclude_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_files.extend(files.into_iter().map(Into::into));
        self
    }

    /// Sets the maximum file size in megabytes.
    #[must_use]
    pub fn max_size_mb(mut self, megabytes: f64) -> Self {
        self.max_size_mb = Some(megabytes);
        self.max_file_size = None;
        self
    }

    /// Sets the maximum file size in bytes.
    #[must_use]
    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = Some(bytes);
        self.max_size_mb = None;
        self
    }

    /// Enables or disables descending into subdirectories.
    #[must_use]
    pub fn recursive(mut self, enabled: bool) -> Self {
        self.recursive = Some(enabled);
        self
    }

    /// Enables or disables `.gitignore` support.
    #[must_use]
    pub fn respect_gitignore(mut self, enabled: bool) -> Self {
        self.respect_gitignore = Some(enabled);
        self
    }

    /// Sets the number of render workers.
    #[must_use]
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    /// Sets the project name shown in headers.
    #[must_use]
    pub fn project_name(mut self, name: impl Into<String>) -> Self {
        self.project_name = Some(name.into());
        self
    }

    /// Adds a generation timestamp to headers.
    #[must_use]
    pub fn include_timestamp(mut self, enabled: bool) -> Self {
        self.include_timestamp = enabled;
        self
    }

    /// Only produces the structure tree.
    #[must_use]
    pub fn structure_only(mut self, enabled: bool) -> Self {
        self.structure_only = enabled;
        self
    }

    /// Enables dry run mode (no file writes).
    #[must_use]
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Enables or disables backup creation.
    #[must_use]
    pub fn backup_existing(mut self, enabled: bool) -> Self {
        self.backup_existing = Some(enabled);
        self
    }

    /// Cancels the run after `timeout`.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn build(self) -> Result<Config> {
        let mut filter = FilterConfig::default();

        if let Some(extensions) = &self.extensions {
            filter.extensions = extensions
                .iter()
                .map(|ext| normalize_extension(ext))
                .collect::<Result<_>>()?;
        }
        filter.exclude_dirs.extend(self.exclude_dirs);
        for pattern in self.exclude_patterns {
            if !filter.exclude_patterns.contains(&pattern) {
                filter.exclude_patterns.push(pattern);
            }
        }
        filter.exclude_files.extend(self.exclude_files);

        filter.max_file_size = match (self.max_file_size, self.max_size_mb) {
            (Some(bytes), _) => bytes,
            (None, Some(mb)) => megabytes_to_bytes(mb)?,
            (None, None) => filter.max_file_size,
        };
        filter.recursive = self.recursive.unwrap_or(true);
        filter.respect_gitignore = self.respect_gitignore.unwrap_or(false);

        let config = Config {
            root_dir: self.root_dir.unwrap_or_else(|| PathBuf::from(".")),
            repo_url: self.repo_url,
            output_dir: self.output_dir.unwrap_or_else(|| PathBuf::from(".")),
            output_base: self
                .output_base
                .unwrap_or_else(|| DEFAULT_OUTPUT_BASE.to_string()),
            max_tokens: self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            tokenizer: self.tokenizer.unwrap_or_default(),
            filter,
            workers: self.workers.unwrap_or_else(default_workers),
            project_name: self.project_name,
            include_timestamp: self.include_timestamp,
            structure_only: self.structure_only,
            dry_run: self.dry_run,
            backup_existing: self.backup_existing.unwrap_or(true),
            timeout: self.timeout,
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::builder().build().unwrap();

        assert_eq!(config.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(config.output_base, "codesnap");
        assert_eq!(config.filter, FilterConfig::default());
        assert!(config.workers > 0);
        assert!(!config.include_timestamp);
    }

    #[test]
    fn test_zero_budget_is_rejected() {
        let err = Config::builder().max_tokens(0).build().unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_zero_workers_is_rejected() {
        assert!(Config::builder().workers(0).build().is_err());
    }

    #[test]
    fn test_negative_max_size_is_rejected() {
        let err = Config::builder().max_size_mb(-1.0).build().unwrap_err();
        assert!(err.is_config());
        assert!(Config::builder().max_size_mb(f64::NAN).build().is_err());
        assert!(Config::builder().max_size_mb(0.0).build().is_err());
    }

    #[test]
    fn test_fractional_megabytes() {
        let config = Config::builder().max_size_mb(0.5).build().unwrap();
        assert_eq!(config.filter.max_file_size, 512 * 1024);
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let err = Config::builder()
            .exclude_patterns(["[unclosed"])
            .build()
            .unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_output_base_must_be_a_name() {
        assert!(Config::builder().output_base("a/b").build().is_err());
        assert!(Config::builder().output_base("  ").build().is_err());
    }

    #[test]
    fn test_extensions_replace_and_exclusions_extend() {
        let file = ConfigFile::parse(
            r#"{
                "extensions": [".py"],
                "exclude_dirs": ["vendor"],
                "exclude_patterns": ["*.lock"]
            }"#,
        )
        .unwrap();

        let config = Config::builder()
            .config_file(&file)
            .extensions(["RS", ".go"])
            .exclude_dirs(["target"])
            .build()
            .unwrap();

        let extensions: Vec<_> = config.filter.extensions.iter().cloned().collect();
        assert_eq!(extensions, [".go", ".rs"]);
        assert!(config.filter.exclude_dirs.contains("vendor"));
        assert!(config.filter.exclude_dirs.contains("target"));
        assert!(config.filter.exclude_dirs.contains("node_modules"));
        assert!(config.filter.exclude_patterns.contains(&"*.lock".to_string()));
        assert!(config.filter.exclude_patterns.contains(&"*.g.dart".to_string()));
    }

    #[test]
    fn test_cli_overrides_file() {
        let file = ConfigFile::parse(
            r#"{"max_tokens": 5000, "output": "from_file", "no_subfolders": true, "max_size": 1}"#,
        )
        .unwrap();

        let config = Config::builder()
            .config_file(&file)
            .max_tokens(8000)
            .build()
            .unwrap();

        assert_eq!(config.max_tokens, 8000);
        assert_eq!(config.output_base, "from_file");
        assert!(!config.filter.recursive);
        assert_eq!(config.filter.max_file_size, 1024 * 1024);
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let err = ConfigFile::parse(r#"{"max_tokenz": 10}"#).unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("max_tokenz"));
    }

    #[test]
    fn test_tokenizer_from_file() {
        let file = ConfigFile::parse(r#"{"tokenizer": "enhanced", "workers": 3}"#).unwrap();
        let config = Config::builder().config_file(&file).build().unwrap();
        assert_eq!(config.tokenizer, TokenizerKind::Enhanced);
        assert_eq!(config.workers, 3);
    }

    #[test]
    fn test_load_reports_path() {
        let temp = assert_fs::TempDir::new().unwrap();
        let path = temp.path().join("codesnap.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = ConfigFile::load(&path).unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("codesnap.json"));
    }
}
