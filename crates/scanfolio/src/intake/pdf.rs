use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::IntakeError;

/// Renders every page of a PDF to PNG bytes.
///
/// A page that fails to render becomes an error entry at its position. A document that cannot
/// be opened at all yields a single error entry.
pub fn render_pages(pdf_bytes: &[u8], dpi: u32) -> Vec<Result<Vec<u8>, IntakeError>> {
    let _span = tracing::info_span!("intake.pdf", dpi).entered();

    let scratch = match ScratchPdf::write(pdf_bytes) {
        Ok(scratch) => scratch,
        Err(e) => return vec![Err(e)],
    };

    let page_count = match lopdf::Document::load_mem(pdf_bytes) {
        Ok(doc) => doc.get_pages().len(),
        Err(e) => {
            // poppler copes with more broken cross-reference tables than lopdf does.
            tracing::warn!("lopdf failed to parse PDF: {}. Asking pdfinfo instead.", e);
            match count_pages_with_pdfinfo(scratch.path()) {
                Ok(count) => count,
                Err(e) => return vec![Err(e)],
            }
        }
    };

    if page_count == 0 {
        return vec![Err(IntakeError::PdfProcessing(
            "PDF has no pages".to_string(),
        ))];
    }

    (1..=page_count as u32)
        .map(|page_num| render_page(scratch.path(), page_num, dpi))
        .collect()
}

/// The uploaded PDF copied to the temp directory for poppler; removed on drop.
struct ScratchPdf {
    path: PathBuf,
}

impl ScratchPdf {
    fn write(pdf_bytes: &[u8]) -> Result<Self, IntakeError> {
        let path = std::env::temp_dir().join(format!("scanfolio_{}.pdf", uuid::Uuid::new_v4()));
        std::fs::write(&path, pdf_bytes)
            .map_err(|e| IntakeError::PdfProcessing(format!("Failed to write temp PDF: {}", e)))?;
        Ok(Self { path })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchPdf {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

fn count_pages_with_pdfinfo(pdf_path: &Path) -> Result<usize, IntakeError> {
    let output = Command::new("pdfinfo").arg(pdf_path).output().map_err(|e| {
        IntakeError::PdfProcessing(format!(
            "Failed to run pdfinfo: {}. Make sure poppler-utils is installed.",
            e
        ))
    })?;

    if !output.status.success() {
        return Err(IntakeError::PdfProcessing(format!(
            "pdfinfo failed: {}",
            String::from_utf8_lossy(&output.stderr)
        )));
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .find_map(|line| line.strip_prefix("Pages:"))
        .and_then(|count| count.trim().parse::<usize>().ok())
        .ok_or_else(|| IntakeError::PdfProcessing("pdfinfo reported no page count".to_string()))
}

fn render_page(pdf_path: &Path, page_num: u32, dpi: u32) -> Result<Vec<u8>, IntakeError> {
    let output_prefix =
        std::env::temp_dir().join(format!("scanfolio_page_{}", uuid::Uuid::new_v4()));
    let page = page_num.to_string();

    let output = Command::new("pdftoppm")
        .arg("-png")
        .args(["-r", &dpi.to_string(), "-f", &page, "-l", &page])
        .arg(pdf_path)
        .arg(&output_prefix)
        .output()
        .map_err(|e| {
            IntakeError::PdfProcessing(format!(
                "Failed to run pdftoppm: {}. Make sure poppler-utils is installed.",
                e
            ))
        })?;

    if !output.status.success() {
        return Err(IntakeError::PdfProcessing(format!(
            "pdftoppm failed on page {}: {}",
            page_num,
            String::from_utf8_lossy(&output.stderr)
        )));
    }

    // pdftoppm zero-pads the page suffix to the width of the document's page count.
    let prefix = output_prefix.display();
    let candidates = [
        format!("{}-{}.png", prefix, page_num),
        format!("{}-{:02}.png", prefix, page_num),
        format!("{}-{:03}.png", prefix, page_num),
        format!("{}-{:04}.png", prefix, page_num),
    ];
    let image_path = candidates
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
        .ok_or_else(|| {
            IntakeError::PdfProcessing(format!("Rendered image for page {} not found", page_num))
        })?;

    let image_data = std::fs::read(&image_path).map_err(|e| {
        IntakeError::PdfProcessing(format!("Failed to read rendered image: {}", e))
    });
    let _ = std::fs::remove_file(&image_path);
    image_data
}
