//! Intake normalizer: turns an uploaded file into canonical page images.
//!
//! Every page leaves intake as a bounded-size JPEG without alpha, together with the BLAKE3 hash
//! of those bytes, so hashing and analysis do not depend on the upload's original encoding.

pub mod pdf;
pub mod raster;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info_span, warn};

use crate::config::schema::IntakeConfig;
use crate::error::IntakeError;
use crate::sanitize;

/// MIME type of every normalized page.
pub const CANONICAL_MIME_TYPE: &str = "image/jpeg";

/// A file the user handed in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceFile {
    pub path: PathBuf,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = sanitize::redact_path(&path);
        let mime_type = detect_mime_type(&path);
        Self {
            path,
            name,
            mime_type,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}

/// Detects MIME type from the file name. Returns `None` for unknown extensions.
fn detect_mime_type(path: &Path) -> Option<String> {
    mime_guess::from_path(path).first().map(|m| m.to_string())
}

/// One canonical page image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedPage {
    /// Zero-based position of the page within its source file.
    pub page_index: usize,
    pub image_bytes: Vec<u8>,
    pub mime_type: String,
    pub content_hash: String,
    pub width: u32,
    pub height: u32,
}

/// Result of normalizing one file: one entry per page, failures kept in place as markers.
#[derive(Debug)]
pub struct IntakeBatch {
    pub source_file_id: Option<String>,
    pub file_name: String,
    pub pages: Vec<Result<NormalizedPage, IntakeError>>,
}

impl IntakeBatch {
    /// A batch whose only entry is the failure that stopped the whole file.
    pub fn failed(file: &SourceFile, source_file_id: Option<&str>, error: IntakeError) -> Self {
        Self {
            source_file_id: source_file_id.map(str::to_string),
            file_name: file.name.clone(),
            pages: vec![Err(error)],
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// Anything that can split a source file into normalized pages.
///
/// Implementations are synchronous and CPU-bound; the scheduler runs them on the blocking pool.
pub trait PageIntake: Send + Sync {
    fn normalize(&self, file: &SourceFile, source_file_id: Option<&str>) -> IntakeBatch;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceFormat {
    Image,
    Pdf,
}

const PDF_MAGIC: &[u8] = b"%PDF-";

fn detect_format(file: &SourceFile, bytes: &[u8]) -> Option<SourceFormat> {
    if bytes.starts_with(PDF_MAGIC) {
        return Some(SourceFormat::Pdf);
    }
    match file.mime_type.as_deref() {
        Some("application/pdf") => Some(SourceFormat::Pdf),
        Some(mime) if mime.starts_with("image/") => Some(SourceFormat::Image),
        _ => image::guess_format(bytes).ok().map(|_| SourceFormat::Image),
    }
}

#[derive(Debug, Clone)]
pub struct IntakeOptions {
    pub max_dimension: u32,
    pub jpeg_quality: u8,
    pub pdf_dpi: u32,
}

impl Default for IntakeOptions {
    fn default() -> Self {
        Self::from_config(&IntakeConfig::default())
    }
}

impl IntakeOptions {
    pub fn from_config(config: &IntakeConfig) -> Self {
        Self {
            max_dimension: config.max_dimension,
            jpeg_quality: config.jpeg_quality,
            pdf_dpi: config.pdf_dpi,
        }
    }
}

/// Production intake for raster images and PDFs.
pub struct IntakeNormalizer {
    options: IntakeOptions,
}

impl IntakeNormalizer {
    pub fn new(options: IntakeOptions) -> Self {
        Self { options }
    }

    /// Normalizes in-memory bytes; `normalize` reads the file and delegates here.
    pub fn normalize_bytes(
        &self,
        file: &SourceFile,
        bytes: &[u8],
        source_file_id: Option<&str>,
    ) -> IntakeBatch {
        let format = match detect_format(file, bytes) {
            Some(format) => format,
            None => {
                let described = file.mime_type.clone().unwrap_or_else(|| "unknown".to_string());
                return IntakeBatch::failed(
                    file,
                    source_file_id,
                    IntakeError::UnsupportedFormat(described),
                );
            }
        };

        match format {
            SourceFormat::Image => IntakeBatch {
                source_file_id: source_file_id.map(str::to_string),
                file_name: file.name.clone(),
                pages: vec![raster::normalize_image(bytes, 0, &self.options)],
            },
            SourceFormat::Pdf => {
                let rendered = pdf::render_pages(bytes, self.options.pdf_dpi);
                let pages: Vec<Result<NormalizedPage, IntakeError>> = rendered
                    .into_iter()
                    .enumerate()
                    .map(|(index, page)| {
                        page.and_then(|png| raster::normalize_image(&png, index, &self.options))
                    })
                    .collect();

                // Pages of one paginated source always stay together.
                let source_file_id = match source_file_id {
                    Some(id) => Some(id.to_string()),
                    None if pages.len() > 1 => Some(uuid::Uuid::new_v4().to_string()),
                    None => None,
                };

                IntakeBatch {
                    source_file_id,
                    file_name: file.name.clone(),
                    pages,
                }
            }
        }
    }
}

impl Default for IntakeNormalizer {
    fn default() -> Self {
        Self::new(IntakeOptions::default())
    }
}

impl PageIntake for IntakeNormalizer {
    fn normalize(&self, file: &SourceFile, source_file_id: Option<&str>) -> IntakeBatch {
        let _span = info_span!("intake.normalize", file = %file.name).entered();

        let bytes = match std::fs::read(&file.path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to read {}: {}", file.name, e);
                return IntakeBatch::failed(
                    file,
                    source_file_id,
                    IntakeError::ReadFile {
                        path: file.path.clone(),
                        source: e,
                    },
                );
            }
        };

        let batch = self.normalize_bytes(file, &bytes, source_file_id);
        let failed = batch.pages.iter().filter(|p| p.is_err()).count();
        if failed > 0 {
            warn!(
                "{} of {} pages of {} could not be normalized",
                failed,
                batch.page_count(),
                file.name
            );
        }
        batch
    }
}
