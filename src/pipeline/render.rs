//! PDF access via pdfium: text-layer extraction and page rasterisation.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which is synchronous and
//! CPU-bound. Both entry points run on tokio's blocking pool so worker
//! threads keep driving the concurrent model calls.
//!
//! ## Library binding
//!
//! pdfium is loaded at runtime, in order: `PDFIUM_LIB_PATH`, the platform
//! library name in the working directory, then the system library.

use crate::error::FlashcardError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use tracing::{debug, info};

/// Extract the text layer of every page, in page order.
pub async fn extract_page_texts(
    bytes: Vec<u8>,
    password: Option<String>,
) -> Result<Vec<String>, FlashcardError> {
    tokio::task::spawn_blocking(move || extract_page_texts_blocking(bytes, password.as_deref()))
        .await
        .map_err(|e| FlashcardError::Internal(format!("Text extraction task panicked: {}", e)))?
}

/// Rasterise every page, longest edge capped at `max_pixels`.
pub async fn render_pages(
    bytes: Vec<u8>,
    password: Option<String>,
    max_pixels: u32,
) -> Result<Vec<DynamicImage>, FlashcardError> {
    tokio::task::spawn_blocking(move || render_pages_blocking(bytes, password.as_deref(), max_pixels))
        .await
        .map_err(|e| FlashcardError::Internal(format!("Render task panicked: {}", e)))?
}

fn bind_pdfium() -> Result<Pdfium, FlashcardError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(path) if !path.is_empty() => Pdfium::bind_to_library(&path),
        _ => {
            let local = Pdfium::pdfium_platform_library_name_at_path("./");
            Pdfium::bind_to_library(&local).or_else(|_| Pdfium::bind_to_system_library())
        }
    }
    .map_err(|e| FlashcardError::Parse {
        detail: format!(
            "Failed to bind to pdfium library: {:?}\nSet PDFIUM_LIB_PATH=/path/to/libpdfium.",
            e
        ),
    })?;
    Ok(Pdfium::new(bindings))
}

fn load_error(e: PdfiumError, password: Option<&str>) -> FlashcardError {
    let err_str = format!("{:?}", e);
    let detail = if err_str.contains("Password") || err_str.contains("password") {
        if password.is_some() {
            "wrong password for encrypted PDF".to_string()
        } else {
            "PDF is encrypted and requires a password (--password)".to_string()
        }
    } else {
        format!("corrupt PDF: {}", err_str)
    };
    FlashcardError::Parse { detail }
}

fn extract_page_texts_blocking(
    bytes: Vec<u8>,
    password: Option<&str>,
) -> Result<Vec<String>, FlashcardError> {
    let pdfium = bind_pdfium()?;
    let document = pdfium
        .load_pdf_from_byte_vec(bytes, password)
        .map_err(|e| load_error(e, password))?;

    let pages = document.pages();
    info!("PDF loaded: {} pages", pages.len());

    let mut texts = Vec::with_capacity(pages.len() as usize);
    for (idx, page) in pages.iter().enumerate() {
        let text = page
            .text()
            .map_err(|e| FlashcardError::Parse {
                detail: format!("text extraction failed for page {}: {:?}", idx + 1, e),
            })?
            .all();
        debug!("Page {}: {} chars of text", idx + 1, text.len());
        texts.push(text);
    }
    Ok(texts)
}

fn render_pages_blocking(
    bytes: Vec<u8>,
    password: Option<&str>,
    max_pixels: u32,
) -> Result<Vec<DynamicImage>, FlashcardError> {
    let pdfium = bind_pdfium()?;
    let document = pdfium
        .load_pdf_from_byte_vec(bytes, password)
        .map_err(|e| load_error(e, password))?;

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let pages = document.pages();
    let mut images = Vec::with_capacity(pages.len() as usize);
    for (idx, page) in pages.iter().enumerate() {
        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| FlashcardError::Parse {
                detail: format!("rasterisation failed for page {}: {:?}", idx + 1, e),
            })?;
        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );
        images.push(image);
    }
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_errors_are_explained() {
        let err = load_error(PdfiumError::PdfiumLibraryInternalError(
            PdfiumInternalError::PasswordError,
        ), None);
        assert!(err.to_string().contains("requires a password"), "got: {err}");

        let err = load_error(PdfiumError::PdfiumLibraryInternalError(
            PdfiumInternalError::PasswordError,
        ), Some("hunter2"));
        assert!(err.to_string().contains("wrong password"), "got: {err}");
    }

    #[test]
    fn other_load_errors_are_corrupt() {
        let err = load_error(PdfiumError::PdfiumLibraryInternalError(
            PdfiumInternalError::FormatError,
        ), None);
        assert!(err.to_string().contains("corrupt PDF"), "got: {err}");
        assert_eq!(err.stage(), Some(crate::error::Stage::Parse));
    }
}
