//! Configuration types: the application config file, API credentials, and
//! per-batch export options.
//!
//! [`AppConfig`] and [`Credentials`] are loaded once at startup and passed by
//! reference to the components that need them; nothing re-reads them later.
//! [`ExportOptions`] is built via its [`ExportOptionsBuilder`], which clamps
//! individual knobs and validates the combination in `build()`.

use crate::error::CoverError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Inclusive DPI range accepted for cover rendering.
pub const DPI_RANGE: std::ops::RangeInclusive<u32> = 72..=600;

/// Default JPEG quality for the embedded cover image.
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

// ── Page geometry ────────────────────────────────────────────────────────

/// Cover page size. Serialised as `"A4"` / `"LETTER"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PageSize {
    #[default]
    #[serde(rename = "A4", alias = "a4")]
    A4,
    #[serde(rename = "LETTER", alias = "Letter", alias = "letter")]
    Letter,
}

impl PageSize {
    /// Page dimensions in PDF points (1/72 inch), portrait.
    pub fn points(&self) -> (u32, u32) {
        match self {
            PageSize::A4 => (595, 842),
            PageSize::Letter => (612, 792),
        }
    }

    /// Pixel dimensions of a full-bleed raster at `dpi`.
    pub fn pixels(&self, dpi: u32) -> (u32, u32) {
        let (w, h) = self.points();
        let scale = |pt: u32| ((pt as f64 / 72.0) * dpi as f64).round() as u32;
        (scale(w), scale(h))
    }
}

impl fmt::Display for PageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageSize::A4 => f.write_str("A4"),
            PageSize::Letter => f.write_str("LETTER"),
        }
    }
}

impl FromStr for PageSize {
    type Err = CoverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A4" => Ok(PageSize::A4),
            "LETTER" => Ok(PageSize::Letter),
            other => Err(CoverError::InvalidConfig(format!(
                "Unknown page size '{other}' (expected A4 or LETTER)"
            ))),
        }
    }
}

// ── Application config ───────────────────────────────────────────────────

/// Settings read from `config.json`. Every field has a default, so a partial
/// file is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Credentials file; relative paths resolve against the config file's folder.
    pub api_keys_file: PathBuf,
    /// Folder offered as a destination next to detected readers. Empty = none.
    pub default_export_directory: String,
    pub cover_search_results: usize,
    pub cover_page_size: PageSize,
    pub cover_dpi: u32,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
    /// `[width, height]` bounding box for search thumbnails.
    pub thumbnail_size: [u32; 2],
    pub max_concurrent_downloads: usize,
    pub ai_model: String,
    pub ai_image_size: String,
    pub ai_quality: String,

    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_keys_file: PathBuf::from("api_keys.json"),
            default_export_directory: String::new(),
            cover_search_results: 8,
            cover_page_size: PageSize::A4,
            cover_dpi: 300,
            log_level: "info".into(),
            log_file: None,
            thumbnail_size: [150, 200],
            max_concurrent_downloads: 4,
            ai_model: "dall-e-3".into(),
            ai_image_size: "1024x1792".into(),
            ai_quality: "standard".into(),
            base_dir: None,
        }
    }
}

impl AppConfig {
    /// `<user config dir>/pdfcover/config.json`, when the platform has one.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("pdfcover").join("config.json"))
    }

    /// Load the configuration.
    ///
    /// An explicit `path` must exist. Without one, the default path is tried
    /// and a missing file falls back to defaults with a warning.
    pub fn load(path: Option<&Path>) -> Result<Self, CoverError> {
        match path {
            Some(p) => Self::load_file(p),
            None => match Self::default_path() {
                Some(p) if p.exists() => Self::load_file(&p),
                Some(p) => {
                    warn!("No config file at {}, using defaults", p.display());
                    Ok(Self::default())
                }
                None => {
                    warn!("No user config directory on this platform, using defaults");
                    Ok(Self::default())
                }
            },
        }
    }

    fn load_file(path: &Path) -> Result<Self, CoverError> {
        let text = std::fs::read_to_string(path).map_err(|e| CoverError::ConfigLoad {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        let mut config = Self::from_json_str(&text).map_err(|e| match e {
            CoverError::InvalidConfig(detail) => CoverError::ConfigLoad {
                path: path.to_path_buf(),
                detail,
            },
            other => other,
        })?;
        config.base_dir = path.parent().map(Path::to_path_buf);
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, CoverError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| CoverError::InvalidConfig(format!("malformed JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CoverError> {
        if !DPI_RANGE.contains(&self.cover_dpi) {
            return Err(CoverError::InvalidConfig(format!(
                "cover_dpi must be {}–{}, got {}",
                DPI_RANGE.start(),
                DPI_RANGE.end(),
                self.cover_dpi
            )));
        }
        if self.cover_search_results == 0 {
            return Err(CoverError::InvalidConfig(
                "cover_search_results must be ≥ 1".into(),
            ));
        }
        if self.max_concurrent_downloads == 0 {
            return Err(CoverError::InvalidConfig(
                "max_concurrent_downloads must be ≥ 1".into(),
            ));
        }
        if self.thumbnail_size.contains(&0) {
            return Err(CoverError::InvalidConfig(format!(
                "thumbnail_size must be positive, got {:?}",
                self.thumbnail_size
            )));
        }
        Ok(())
    }

    /// Credentials file location after resolving relative paths.
    pub fn credentials_path(&self) -> PathBuf {
        match &self.base_dir {
            Some(base) if self.api_keys_file.is_relative() => base.join(&self.api_keys_file),
            _ => self.api_keys_file.clone(),
        }
    }

    pub fn load_credentials(&self) -> Credentials {
        Credentials::load(&self.credentials_path())
    }

    /// The default export directory, if one is configured.
    pub fn export_directory(&self) -> Option<PathBuf> {
        let trimmed = self.default_export_directory.trim();
        (!trimmed.is_empty()).then(|| PathBuf::from(trimmed))
    }

    /// Export options seeded from this config.
    pub fn export_options(&self) -> Result<ExportOptions, CoverError> {
        ExportOptions::builder()
            .page_size(self.cover_page_size)
            .dpi(self.cover_dpi)
            .build()
    }

    pub fn generation_options(&self) -> GenerationOptions {
        GenerationOptions {
            model: self.ai_model.clone(),
            size: self.ai_image_size.clone(),
            quality: self.ai_quality.clone(),
        }
    }
}

// ── Credentials ──────────────────────────────────────────────────────────

/// API keys. An absent or blank key disables the matching provider.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub google_books_api_key: Option<String>,
    pub openai_api_key: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |k: &Option<String>| non_blank(k).map(|_| "<set>");
        f.debug_struct("Credentials")
            .field("google_books_api_key", &redact(&self.google_books_api_key))
            .field("openai_api_key", &redact(&self.openai_api_key))
            .finish()
    }
}

impl Credentials {
    /// Read a credentials file. Never fails: a missing or malformed file
    /// yields empty keys.
    pub fn load(path: &Path) -> Self {
        let text = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) => {
                debug!("No credentials at {} ({e})", path.display());
                return Self::default();
            }
        };
        match serde_json::from_str(&text) {
            Ok(c) => c,
            Err(e) => {
                warn!("Ignoring malformed credentials file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    pub fn google_books_key(&self) -> Option<&str> {
        non_blank(&self.google_books_api_key)
    }

    pub fn openai_key(&self) -> Option<&str> {
        non_blank(&self.openai_api_key)
    }
}

fn non_blank(key: &Option<String>) -> Option<&str> {
    key.as_deref().map(str::trim).filter(|k| !k.is_empty())
}

// ── Generation options ───────────────────────────────────────────────────

/// Image-generation parameters passed to a generation provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub model: String,
    /// `"<width>x<height>"`.
    pub size: String,
    pub quality: String,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        AppConfig::default().generation_options()
    }
}

// ── Export options ───────────────────────────────────────────────────────

/// How cover leaves are rendered and attached during an export batch.
///
/// Built via [`ExportOptions::builder()`] or [`ExportOptions::default()`].
///
/// ```rust
/// use pdfcover::{ExportOptions, PageSize};
///
/// let options = ExportOptions::builder()
///     .page_size(PageSize::Letter)
///     .dpi(150)
///     .replace_first_page(true)
///     .build()
///     .unwrap();
/// assert_eq!(options.dpi, 150);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportOptions {
    pub page_size: PageSize,
    /// Raster density of the cover image. Range: 72–600. Default: 300.
    pub dpi: u32,
    /// JPEG quality of the embedded cover. Range: 1–100. Default: 90.
    pub jpeg_quality: u8,
    /// Drop the source's first page before prepending. Ignored for
    /// single-page sources.
    pub replace_first_page: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            page_size: PageSize::A4,
            dpi: 300,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            replace_first_page: false,
        }
    }
}

impl ExportOptions {
    pub fn builder() -> ExportOptionsBuilder {
        ExportOptionsBuilder {
            options: Self::default(),
        }
    }
}

/// Builder for [`ExportOptions`].
#[derive(Debug)]
pub struct ExportOptionsBuilder {
    options: ExportOptions,
}

impl ExportOptionsBuilder {
    pub fn page_size(mut self, size: PageSize) -> Self {
        self.options.page_size = size;
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.options.dpi = dpi;
        self
    }

    pub fn jpeg_quality(mut self, q: u8) -> Self {
        self.options.jpeg_quality = q.clamp(1, 100);
        self
    }

    pub fn replace_first_page(mut self, v: bool) -> Self {
        self.options.replace_first_page = v;
        self
    }

    /// Build the options, validating constraints.
    pub fn build(self) -> Result<ExportOptions, CoverError> {
        let o = &self.options;
        if !DPI_RANGE.contains(&o.dpi) {
            return Err(CoverError::InvalidConfig(format!(
                "DPI must be {}–{}, got {}",
                DPI_RANGE.start(),
                DPI_RANGE.end(),
                o.dpi
            )));
        }
        Ok(self.options)
    }
}
