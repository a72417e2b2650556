//! First-page previews: rasterise page 1 of a PDF via pdfium.
//!
//! pdfium is a C++ library with thread-local state, so all calls run inside
//! `spawn_blocking`. The shared library is bound at runtime; the lookup order
//! is `PDFIUM_LIB_PATH`, then the working directory, then the system library
//! path.

use crate::error::CoverError;
use crate::pipeline::encode::encode_png;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Bind to a pdfium shared library.
pub fn bind_pdfium() -> Result<Pdfium, CoverError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(path) if !path.is_empty() => {
            debug!("Binding pdfium from PDFIUM_LIB_PATH={path}");
            Pdfium::bind_to_library(&path)
        }
        _ => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| CoverError::PdfiumBindingFailed(e.to_string()))?;
    Ok(Pdfium::new(bindings))
}

/// Rasterise page 1 of `pdf_path` with its longest edge capped at `max_pixels`.
pub async fn render_first_page(pdf_path: &Path, max_pixels: u32) -> Result<DynamicImage, CoverError> {
    let path = pdf_path.to_path_buf();
    tokio::task::spawn_blocking(move || render_first_page_blocking(&path, max_pixels))
        .await
        .map_err(|e| CoverError::Internal(format!("Preview task panicked: {e}")))?
}

/// Render page 1 and write it to `out_png`. Returns the pixel size.
pub async fn save_preview(
    pdf_path: &Path,
    out_png: &Path,
    max_pixels: u32,
) -> Result<(u32, u32), CoverError> {
    let image = render_first_page(pdf_path, max_pixels).await?;
    let png = encode_png(&image)?;
    let out: PathBuf = out_png.to_path_buf();
    tokio::fs::write(&out, &png)
        .await
        .map_err(|source| CoverError::OutputWriteFailed { path: out, source })?;
    info!(
        "Preview of {} written to {}",
        pdf_path.display(),
        out_png.display()
    );
    Ok((image.width(), image.height()))
}

fn render_first_page_blocking(pdf_path: &Path, max_pixels: u32) -> Result<DynamicImage, CoverError> {
    let pdfium = bind_pdfium()?;

    let document = pdfium.load_pdf_from_file(pdf_path, None).map_err(|e| {
        let detail = format!("{e:?}");
        if detail.contains("Password") || detail.contains("password") {
            CoverError::CorruptSource {
                detail: format!("'{}' is encrypted", pdf_path.display()),
            }
        } else {
            CoverError::CorruptSource {
                detail: format!("'{}': {detail}", pdf_path.display()),
            }
        }
    })?;

    let pages = document.pages();
    if pages.len() == 0 {
        return Err(CoverError::CorruptSource {
            detail: format!("'{}' has no pages", pdf_path.display()),
        });
    }

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let page = pages.get(0).map_err(|e| CoverError::RasterisationFailed {
        page: 1,
        detail: format!("{e:?}"),
    })?;
    let bitmap = page
        .render_with_config(&render_config)
        .map_err(|e| CoverError::RasterisationFailed {
            page: 1,
            detail: format!("{e:?}"),
        })?;

    let image = bitmap.as_image();
    debug!("Rendered preview → {}x{} px", image.width(), image.height());
    Ok(image)
}
