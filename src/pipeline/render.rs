//! pdfium access: binding, native text tokens, OCR rasterisation, info dict.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async contexts.
//! Every entry point here moves its work onto the blocking pool and opens its
//! own `Pdfium` handle there; the `thread_safe` feature serialises the calls.
//!
//! ## Binding order
//!
//! 1. `ExtractionConfig::pdfium_lib_path` (file or directory)
//! 2. `PDFIUM_LIB_PATH` environment variable
//! 3. the platform library name in the working directory
//! 4. the system library search path

use crate::config::ExtractionConfig;
use crate::error::VoterListError;
use crate::output::PdfInfo;
use crate::pipeline::tokens::{PageSource, PositionedToken};
use crate::progress::{CancelToken, ProgressReporter, Stage};
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable naming the pdfium shared library.
pub const PDFIUM_LIB_ENV: &str = "PDFIUM_LIB_PATH";

/// Everything needed to (re)open the source document on a blocking thread.
#[derive(Debug, Clone)]
pub struct PdfSource {
    pub path: PathBuf,
    pub password: Option<String>,
    pub pdfium_lib: Option<PathBuf>,
}

impl PdfSource {
    pub fn new(path: impl Into<PathBuf>, config: &ExtractionConfig) -> Self {
        Self {
            path: path.into(),
            password: config.password.clone(),
            pdfium_lib: config.pdfium_lib_path.clone(),
        }
    }
}

/// Bind to a pdfium library following the documented search order.
pub fn bind_pdfium(explicit: Option<&Path>) -> Result<Pdfium, VoterListError> {
    let configured = explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(PDFIUM_LIB_ENV).map(PathBuf::from));

    if let Some(path) = configured {
        let lib = if path.is_dir() {
            Pdfium::pdfium_platform_library_name_at_path(&path)
        } else {
            path.clone()
        };
        debug!("binding pdfium at {}", lib.display());
        return Pdfium::bind_to_library(&lib)
            .map(Pdfium::new)
            .map_err(|e| VoterListError::PdfiumBindingFailed(format!("{}: {e:?}", lib.display())));
    }

    Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| Pdfium::bind_to_system_library())
        .map(Pdfium::new)
        .map_err(|e| VoterListError::PdfiumBindingFailed(format!("{e:?}")))
}

/// Open the source document, classifying pdfium's failure.
pub fn open_document<'a>(
    pdfium: &'a Pdfium,
    src: &'a PdfSource,
) -> Result<PdfDocument<'a>, VoterListError> {
    pdfium
        .load_pdf_from_file(&src.path, src.password.as_deref())
        .map_err(|e| {
            let err_str = format!("{:?}", e);
            if err_str.contains("Password") || err_str.contains("password") {
                if src.password.is_some() {
                    VoterListError::WrongPassword {
                        path: src.path.clone(),
                    }
                } else {
                    VoterListError::PasswordRequired {
                        path: src.path.clone(),
                    }
                }
            } else {
                VoterListError::CorruptPdf {
                    path: src.path.clone(),
                    detail: err_str,
                }
            }
        })
}

/// Native text segments of one page as tokens.
///
/// `x` is the segment's left edge, `y` its bottom (baseline approximation),
/// `font_size` its box height and `width` its box width.
pub fn native_tokens(page: &PdfPage) -> Result<Vec<PositionedToken>, PdfiumError> {
    let text = page.text()?;
    let mut tokens = Vec::new();
    for segment in text.segments().iter() {
        let content = segment.text();
        if content.trim().is_empty() {
            continue;
        }
        let bounds = segment.bounds();
        tokens.push(PositionedToken {
            text: content,
            x: bounds.left().value,
            y: bounds.bottom().value,
            font_size: bounds.top().value - bounds.bottom().value,
            width: bounds.right().value - bounds.left().value,
        });
    }
    Ok(tokens)
}

/// Result of the native loading pass.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    /// Pages in the source document.
    pub total_pages: usize,
    /// Loaded pages in page order; shorter than `total_pages` if cancelled.
    pub pages: Vec<PageSource>,
}

/// Open the document and extract native tokens for every page.
pub(crate) async fn load_page_sources(
    src: &PdfSource,
    cancel: &CancelToken,
    progress: &ProgressReporter,
) -> Result<LoadedDocument, VoterListError> {
    let src = src.clone();
    let cancel = cancel.clone();
    let progress = progress.clone();

    tokio::task::spawn_blocking(move || load_page_sources_blocking(&src, &cancel, &progress))
        .await
        .map_err(|e| VoterListError::Internal(format!("Load task panicked: {}", e)))?
}

fn load_page_sources_blocking(
    src: &PdfSource,
    cancel: &CancelToken,
    progress: &ProgressReporter,
) -> Result<LoadedDocument, VoterListError> {
    let pdfium = bind_pdfium(src.pdfium_lib.as_deref())?;
    let document = open_document(&pdfium, src)?;
    progress.stage(Stage::Loading, 0.30, "document loaded");

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    let mut loaded = Vec::with_capacity(total_pages);
    for idx in 0..total_pages {
        if cancel.is_cancelled() {
            info!("Cancelled after {} of {} pages", idx, total_pages);
            break;
        }

        let page = pages
            .get(idx as u16)
            .map_err(|e| VoterListError::PageLoadFailed {
                page: idx + 1,
                detail: format!("{:?}", e),
            })?;

        let tokens = native_tokens(&page).unwrap_or_else(|e| {
            warn!("Page {}: no text layer ({:?})", idx + 1, e);
            Vec::new()
        });
        debug!("Page {}: {} native tokens", idx + 1, tokens.len());

        loaded.push(PageSource::native(
            idx,
            page.width().value,
            page.height().value,
            tokens,
        ));
        progress.page(Stage::TextExtraction, 0.20, 0.10, idx + 1, total_pages);
    }

    Ok(LoadedDocument {
        total_pages,
        pages: loaded,
    })
}

/// Rasterise one page at `scale` (points → pixels).
pub(crate) async fn render_page(
    src: &PdfSource,
    page_index: usize,
    scale: f32,
) -> Result<DynamicImage, VoterListError> {
    let src = src.clone();
    tokio::task::spawn_blocking(move || {
        let pdfium = bind_pdfium(src.pdfium_lib.as_deref())?;
        let document = open_document(&pdfium, &src)?;
        render_page_blocking(&document, page_index, scale)
    })
    .await
    .map_err(|e| VoterListError::Internal(format!("Render task panicked: {}", e)))?
}

/// Render a page of an already-open document.
pub fn render_page_blocking(
    document: &PdfDocument,
    page_index: usize,
    scale: f32,
) -> Result<DynamicImage, VoterListError> {
    let page = document
        .pages()
        .get(page_index as u16)
        .map_err(|e| VoterListError::RasterisationFailed {
            page: page_index + 1,
            detail: format!("{:?}", e),
        })?;

    let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);
    let bitmap = page.render_with_config(&render_config).map_err(|e| {
        VoterListError::RasterisationFailed {
            page: page_index + 1,
            detail: format!("{:?}", e),
        }
    })?;

    let image = bitmap.as_image();
    debug!(
        "Rendered page {} → {}x{} px",
        page_index + 1,
        image.width(),
        image.height()
    );
    Ok(image)
}

/// Read the information dictionary without touching page content.
pub(crate) async fn pdf_info(src: &PdfSource) -> Result<PdfInfo, VoterListError> {
    let src = src.clone();
    tokio::task::spawn_blocking(move || pdf_info_blocking(&src))
        .await
        .map_err(|e| VoterListError::Internal(format!("Metadata task panicked: {}", e)))?
}

fn pdf_info_blocking(src: &PdfSource) -> Result<PdfInfo, VoterListError> {
    let pdfium = bind_pdfium(src.pdfium_lib.as_deref())?;
    let document = open_document(&pdfium, src)?;

    let metadata = document.metadata();
    let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata
            .get(tag)
            .map(|t| t.value().to_string())
            .filter(|v| !v.is_empty())
    };

    Ok(PdfInfo {
        title: get_meta(PdfDocumentMetadataTagType::Title),
        author: get_meta(PdfDocumentMetadataTagType::Author),
        subject: get_meta(PdfDocumentMetadataTagType::Subject),
        creator: get_meta(PdfDocumentMetadataTagType::Creator),
        producer: get_meta(PdfDocumentMetadataTagType::Producer),
        creation_date: get_meta(PdfDocumentMetadataTagType::CreationDate),
        modification_date: get_meta(PdfDocumentMetadataTagType::ModificationDate),
        page_count: document.pages().len() as usize,
        pdf_version: format!("{:?}", document.version()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_missing_library_fails_to_bind() {
        let err = bind_pdfium(Some(Path::new("/nonexistent/libpdfium.so"))).unwrap_err();
        assert!(matches!(err, VoterListError::PdfiumBindingFailed(_)));
        assert!(err.to_string().contains("PDFIUM_LIB_PATH"));
    }

    #[test]
    fn source_copies_credentials_from_config() {
        let config = ExtractionConfig::builder()
            .password("secret")
            .pdfium_lib_path("/opt/pdfium")
            .build()
            .unwrap();
        let src = PdfSource::new("/tmp/roll.pdf", &config);
        assert_eq!(src.password.as_deref(), Some("secret"));
        assert_eq!(src.pdfium_lib.as_deref(), Some(Path::new("/opt/pdfium")));
    }
}
