//! Build configuration module.
//!
//! Handles loading, validating, and merging `mdbuild.toml`. Stock defaults
//! are serialized to a TOML value and the user file is merged on top, so a
//! config file only needs the keys it wants to change.
//!
//! ## Config File Location
//!
//! ```text
//! my-site/
//! ├── mdbuild.toml             # Optional; overrides stock defaults
//! ├── content/posts/
//! │   ├── 2021-01-01--hello-world/
//! │   │   ├── index.md
//! │   │   └── cover.png
//! │   └── ...
//! └── public/                  # out_dir
//! ```
//!
//! `--config FILE` on the command line points at a file elsewhere.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! content_root = "content/posts"   # One subdirectory per post
//! # meta_module = "content/posts/meta.js"  # default: <content_root>/meta.js
//! out_dir = "public"
//! cache_dir = ".cache"             # Converted images, reused across builds
//! base_url = "https://example.com" # Prefix for sitemap <loc> entries
//!
//! [images]
//! quality = 80              # AVIF quality (1-100)
//! speed = 6                 # rav1e speed (1 = slowest/best, 10 = fastest)
//! max_width = 1600          # Downscale wider images; 0 = never resize
//!
//! [markdown]
//! default_language = "markdown"   # Code blocks with unknown language
//! theme = "base16-ocean.dark"     # syntect theme for highlight.css
//!
//! [clean]
//! keep = ["index.html", "robots.txt"]   # Files in out_dir that clean keeps
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{EncodeSettings, Quality, Speed};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the config file looked up in the project root.
pub const CONFIG_FILE_NAME: &str = "mdbuild.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Build configuration loaded from `mdbuild.toml`.
///
/// All fields have sensible defaults. Paths are relative to the project root.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Directory holding one `<date>--<slug>` subdirectory per post.
    pub content_root: String,
    /// Path importers use for the generated metadata module.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta_module: Option<String>,
    /// Where the bundle is published.
    pub out_dir: String,
    /// Image conversion cache.
    pub cache_dir: String,
    /// Site origin used in the sitemap.
    pub base_url: String,
    pub images: ImagesConfig,
    pub markdown: MarkdownConfig,
    pub clean: CleanConfig,
    pub processing: ProcessingConfig,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            content_root: "content/posts".to_string(),
            meta_module: None,
            out_dir: "public".to_string(),
            cache_dir: ".cache".to_string(),
            base_url: "https://example.com".to_string(),
            images: ImagesConfig::default(),
            markdown: MarkdownConfig::default(),
            clean: CleanConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl BuildConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.images.quality) {
            return Err(ConfigError::Validation(
                "images.quality must be 1-100".into(),
            ));
        }
        if !(1..=10).contains(&self.images.speed) {
            return Err(ConfigError::Validation("images.speed must be 1-10".into()));
        }
        for (key, value) in [
            ("content_root", &self.content_root),
            ("out_dir", &self.out_dir),
            ("cache_dir", &self.cache_dir),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Validation(format!("{key} must not be empty")));
            }
        }
        if Path::new(&self.out_dir) == Path::new(&self.content_root) {
            return Err(ConfigError::Validation(
                "out_dir must differ from content_root".into(),
            ));
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::Validation(
                "base_url must start with http:// or https://".into(),
            ));
        }
        if self.meta_module.as_deref().is_some_and(|m| !m.ends_with(".js")) {
            return Err(ConfigError::Validation(
                "meta_module must end in .js".into(),
            ));
        }
        if self.markdown.default_language.trim().is_empty() {
            return Err(ConfigError::Validation(
                "markdown.default_language must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Metadata module path, relative to the project root.
    pub fn meta_module_path(&self) -> PathBuf {
        match &self.meta_module {
            Some(path) => PathBuf::from(path),
            None => Path::new(&self.content_root).join("meta.js"),
        }
    }

    pub fn encode_settings(&self) -> EncodeSettings {
        EncodeSettings {
            quality: Quality::new(self.images.quality),
            speed: Speed::new(self.images.speed),
            max_width: self.images.max_width,
        }
    }
}

/// Image conversion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    /// AVIF encoding quality (1 = worst, 100 = best).
    pub quality: u32,
    /// rav1e speed preset (1 = slowest/best, 10 = fastest).
    pub speed: u8,
    /// Images wider than this are downscaled. `0` disables resizing.
    pub max_width: u32,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            quality: 80,
            speed: 6,
            max_width: 1600,
        }
    }
}

/// Markdown rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MarkdownConfig {
    /// Language used for code blocks whose language is missing or unknown.
    pub default_language: String,
    /// syntect theme the highlight stylesheet is generated from.
    pub theme: String,
}

impl Default for MarkdownConfig {
    fn default() -> Self {
        Self {
            default_language: "markdown".to_string(),
            theme: "base16-ocean.dark".to_string(),
        }
    }
}

/// `mdbuild clean` settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CleanConfig {
    /// File names in `out_dir` that are hand-written and survive a clean.
    pub keep: Vec<String>,
}

impl Default for CleanConfig {
    fn default() -> Self {
        Self {
            keep: vec!["index.html".to_string(), "robots.txt".to_string()],
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel image processing workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(BuildConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(config_path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<BuildConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: BuildConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load `mdbuild.toml` from the project root, falling back to defaults.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(project_root: &Path) -> Result<BuildConfig, ConfigError> {
    let overlay = load_raw_config(&project_root.join(CONFIG_FILE_NAME))?;
    resolve_config(stock_defaults_value(), overlay)
}

/// Load an explicitly named config file. Unlike [`load_config`], the file
/// must exist.
pub fn load_config_file(path: &Path) -> Result<BuildConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let overlay: toml::Value = toml::from_str(&content)?;
    resolve_config(stock_defaults_value(), Some(overlay))
}

/// Returns a fully-commented stock `mdbuild.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# mdbuild Configuration
# =====================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Paths are relative to the project root.
# Unknown keys will cause an error.

# Directory with one `<date>--<slug>` subdirectory per post.
content_root = "content/posts"

# Path importers use for the generated metadata module.
# Defaults to <content_root>/meta.js.
# meta_module = "content/posts/meta.js"

# Where the finished bundle is published.
out_dir = "public"

# Converted images, reused across builds. Delete it (or run `mdbuild clean`)
# after replacing an image without renaming it.
cache_dir = ".cache"

# Site origin used for sitemap.xml entries.
base_url = "https://example.com"

# ---------------------------------------------------------------------------
# Image conversion
# ---------------------------------------------------------------------------
[images]
# AVIF encoding quality (1 = worst, 100 = best). WebP output is lossless.
quality = 80

# rav1e speed preset (1 = slowest/best compression, 10 = fastest).
speed = 6

# Images wider than this are downscaled before encoding. 0 = never resize.
max_width = 1600

# ---------------------------------------------------------------------------
# Markdown rendering
# ---------------------------------------------------------------------------
[markdown]
# Language used for code blocks whose language is missing or unknown.
default_language = "markdown"

# syntect theme used to generate highlight.css.
theme = "base16-ocean.dark"

# ---------------------------------------------------------------------------
# mdbuild clean
# ---------------------------------------------------------------------------
[clean]
# Hand-written files in out_dir that survive a clean.
keep = ["index.html", "robots.txt"]

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel image-processing workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_paths() {
        let config = BuildConfig::default();
        assert_eq!(config.content_root, "content/posts");
        assert_eq!(config.out_dir, "public");
        assert_eq!(config.cache_dir, ".cache");
        assert_eq!(config.meta_module, None);
    }

    #[test]
    fn default_config_has_image_settings() {
        let config = BuildConfig::default();
        assert_eq!(config.images.quality, 80);
        assert_eq!(config.images.speed, 6);
        assert_eq!(config.images.max_width, 1600);
        assert_eq!(config.markdown.default_language, "markdown");
        assert_eq!(config.clean.keep, vec!["index.html", "robots.txt"]);
    }

    #[test]
    fn meta_module_defaults_under_content_root() {
        let mut config = BuildConfig::default();
        assert_eq!(
            config.meta_module_path(),
            PathBuf::from("content/posts/meta.js")
        );
        config.meta_module = Some("src/posts.js".into());
        assert_eq!(config.meta_module_path(), PathBuf::from("src/posts.js"));
    }

    #[test]
    fn encode_settings_follow_images_section() {
        let mut config = BuildConfig::default();
        config.images.quality = 55;
        config.images.speed = 9;
        config.images.max_width = 0;
        let settings = config.encode_settings();
        assert_eq!(settings.quality.value(), 55);
        assert_eq!(settings.speed.value(), 9);
        assert_eq!(settings.max_width, 0);
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
[images]
quality = 60
"#;
        let config: BuildConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.images.quality, 60);
        // Default values preserved
        assert_eq!(config.images.speed, 6);
        assert_eq!(config.content_root, "content/posts");
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.base_url, "https://example.com");
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILE_NAME),
            r#"
base_url = "https://blog.example.org/"
content_root = "posts"

[markdown]
theme = "InspiredGitHub"
"#,
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.base_url, "https://blog.example.org/");
        assert_eq!(config.meta_module_path(), PathBuf::from("posts/meta.js"));
        assert_eq!(config.markdown.theme, "InspiredGitHub");
        // Unspecified values should be defaults
        assert_eq!(config.markdown.default_language, "markdown");
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE_NAME), "this is not valid toml [[[").unwrap();

        let result = load_config(tmp.path());
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn load_config_file_requires_existing_file() {
        let tmp = TempDir::new().unwrap();
        let result = load_config_file(&tmp.path().join("missing.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn load_config_file_reads_named_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("site.toml");
        fs::write(&path, "out_dir = \"dist\"\n").unwrap();
        assert_eq!(load_config_file(&path).unwrap().out_dir, "dist");
    }

    // =========================================================================
    // Processing config tests
    // =========================================================================

    #[test]
    fn default_processing_config() {
        let config = ProcessingConfig::default();
        assert_eq!(config.max_processes, None);
    }

    #[test]
    fn effective_threads_auto() {
        let config = ProcessingConfig {
            max_processes: None,
        };
        let threads = effective_threads(&config);
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(threads, cores);
    }

    #[test]
    fn effective_threads_clamped_to_cores() {
        let config = ProcessingConfig {
            max_processes: Some(99999),
        };
        let threads = effective_threads(&config);
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(threads, cores);
    }

    #[test]
    fn effective_threads_user_constrains_down() {
        let config = ProcessingConfig {
            max_processes: Some(1),
        };
        assert_eq!(effective_threads(&config), 1);
    }

    #[test]
    fn effective_threads_zero_means_one() {
        let config = ProcessingConfig {
            max_processes: Some(0),
        };
        assert_eq!(effective_threads(&config), 1);
    }

    // =========================================================================
    // merge_toml tests
    // =========================================================================

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str(r#"quality = 90"#).unwrap();
        let overlay: toml::Value = toml::from_str(r#"quality = 70"#).unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("quality").unwrap().as_integer(), Some(70));
    }

    #[test]
    fn merge_toml_table_merge() {
        let base: toml::Value = toml::from_str(
            r#"
[images]
speed = 6
quality = 80
"#,
        )
        .unwrap();
        let overlay: toml::Value = toml::from_str(
            r#"
[images]
quality = 70
"#,
        )
        .unwrap();
        let merged = merge_toml(base, overlay);
        let images = merged.get("images").unwrap();
        assert_eq!(images.get("quality").unwrap().as_integer(), Some(70));
        // speed preserved from base
        assert_eq!(images.get("speed").unwrap().as_integer(), Some(6));
    }

    #[test]
    fn merge_toml_replaces_arrays() {
        let base: toml::Value = toml::from_str(
            r#"
[clean]
keep = ["index.html", "robots.txt"]
"#,
        )
        .unwrap();
        let overlay: toml::Value = toml::from_str(
            r#"
[clean]
keep = ["CNAME"]
"#,
        )
        .unwrap();
        let merged = merge_toml(base, overlay);
        let keep = merged.get("clean").unwrap().get("keep").unwrap();
        assert_eq!(keep.as_array().unwrap().len(), 1);
    }

    // =========================================================================
    // Unknown key rejection tests
    // =========================================================================

    #[test]
    fn unknown_key_rejected() {
        let toml_str = r#"
[images]
qualty = 90
"#;
        let result: Result<BuildConfig, _> = toml::from_str(toml_str);
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("unknown field"));
    }

    #[test]
    fn unknown_section_rejected() {
        let toml_str = r#"
[imagez]
quality = 90
"#;
        let result: Result<BuildConfig, _> = toml::from_str(toml_str);
        assert!(result.is_err());
    }

    #[test]
    fn unknown_key_rejected_via_load_config() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILE_NAME),
            r#"
[markdown]
langauge = "rust"
"#,
        )
        .unwrap();

        assert!(load_config(tmp.path()).is_err());
    }

    // =========================================================================
    // Validation tests
    // =========================================================================

    #[test]
    fn validate_default_config_passes() {
        assert!(BuildConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_quality_bounds() {
        let mut config = BuildConfig::default();
        config.images.quality = 100;
        assert!(config.validate().is_ok());

        config.images.quality = 0;
        assert!(config.validate().unwrap_err().to_string().contains("quality"));

        config.images.quality = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_speed_bounds() {
        let mut config = BuildConfig::default();
        config.images.speed = 11;
        assert!(config.validate().unwrap_err().to_string().contains("speed"));
    }

    #[test]
    fn validate_rejects_empty_paths() {
        let mut config = BuildConfig::default();
        config.cache_dir = " ".into();
        assert!(config.validate().unwrap_err().to_string().contains("cache_dir"));
    }

    #[test]
    fn validate_rejects_out_dir_equal_to_content_root() {
        let mut config = BuildConfig::default();
        config.out_dir = config.content_root.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_base_url_scheme() {
        let mut config = BuildConfig::default();
        config.base_url = "example.com".into();
        assert!(config.validate().unwrap_err().to_string().contains("base_url"));
    }

    #[test]
    fn validate_meta_module_extension() {
        let mut config = BuildConfig::default();
        config.meta_module = Some("content/meta.ts".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_config_validates_values() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILE_NAME),
            r#"
[images]
quality = 200
"#,
        )
        .unwrap();

        let result = load_config(tmp.path());
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    // =========================================================================
    // resolve_config / load_raw_config tests
    // =========================================================================

    #[test]
    fn load_raw_config_returns_none_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let result = load_raw_config(&tmp.path().join(CONFIG_FILE_NAME)).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn resolve_config_with_overlay() {
        let overlay: toml::Value = toml::from_str(
            r#"
[images]
max_width = 0
"#,
        )
        .unwrap();
        let config = resolve_config(stock_defaults_value(), Some(overlay)).unwrap();
        assert_eq!(config.images.max_width, 0);
        // Other fields preserved from defaults
        assert_eq!(config.images.quality, 80);
    }

    // =========================================================================
    // stock_config_toml tests
    // =========================================================================

    #[test]
    fn stock_config_toml_is_valid_toml() {
        let content = stock_config_toml();
        let _: toml::Value = toml::from_str(content).expect("stock config must be valid TOML");
    }

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config: BuildConfig = toml::from_str(stock_config_toml()).unwrap();
        let defaults = BuildConfig::default();
        assert_eq!(config.content_root, defaults.content_root);
        assert_eq!(config.out_dir, defaults.out_dir);
        assert_eq!(config.cache_dir, defaults.cache_dir);
        assert_eq!(config.base_url, defaults.base_url);
        assert_eq!(config.meta_module, None);
        assert_eq!(config.images.quality, defaults.images.quality);
        assert_eq!(config.images.speed, defaults.images.speed);
        assert_eq!(config.images.max_width, defaults.images.max_width);
        assert_eq!(config.markdown.theme, defaults.markdown.theme);
        assert_eq!(config.clean.keep, defaults.clean.keep);
        assert_eq!(config.processing.max_processes, None);
    }

    #[test]
    fn stock_defaults_value_has_all_sections() {
        let val = stock_defaults_value();
        assert!(val.is_table());
        for section in ["images", "markdown", "clean", "processing"] {
            assert!(val.get(section).is_some(), "missing [{section}]");
        }
        assert!(val.get("meta_module").is_none());
    }
}
