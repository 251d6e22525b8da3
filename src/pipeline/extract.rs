//! PDF text extraction: pull the text layer of selected pages via pdfium.
//!
//! pdfium keeps thread-local state and every call blocks, so all work here
//! runs inside `tokio::task::spawn_blocking`. The document is opened once per
//! call; text and metadata come from the same handle.
//!
//! A page whose text layer cannot be read is logged and skipped. Failing to
//! open the document at all is fatal.

use crate::config::PageSelection;
use crate::error::ExplainError;
use crate::output::DocumentMetadata;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable pointing at a pdfium shared library (file or directory).
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Raw text of one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    /// 0-based page index within the document.
    pub page_index: usize,
    pub text: String,
}

impl PageText {
    pub fn new(page_index: usize, text: impl Into<String>) -> Self {
        Self {
            page_index,
            text: text.into(),
        }
    }
}

/// Everything read from the PDF in one pass.
#[derive(Debug, Clone)]
pub struct Extraction {
    /// Text of the selected pages, in page order.
    pub pages: Vec<PageText>,
    pub metadata: DocumentMetadata,
    /// Number of pages the selection resolved to.
    pub selected_pages: usize,
    /// Selected pages whose text could not be read.
    pub skipped_pages: usize,
}

/// Extract the text of the pages matched by `selection`.
pub async fn extract_text(
    pdf_path: &Path,
    password: Option<&str>,
    selection: &PageSelection,
) -> Result<Extraction, ExplainError> {
    let path = pdf_path.to_path_buf();
    let password = password.map(str::to_string);
    let selection = selection.clone();

    tokio::task::spawn_blocking(move || {
        extract_text_blocking(&path, password.as_deref(), &selection)
    })
    .await
    .map_err(|e| ExplainError::Internal(format!("Extraction task panicked: {}", e)))?
}

/// Read document metadata without touching page text.
pub async fn extract_metadata(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<DocumentMetadata, ExplainError> {
    let path = pdf_path.to_path_buf();
    let password = password.map(str::to_string);

    tokio::task::spawn_blocking(move || {
        let pdfium = bind_pdfium()?;
        let document = open_document(&pdfium, &path, password.as_deref())?;
        Ok(read_metadata(&document))
    })
    .await
    .map_err(|e| ExplainError::Internal(format!("Metadata task panicked: {}", e)))?
}

fn extract_text_blocking(
    pdf_path: &Path,
    password: Option<&str>,
    selection: &PageSelection,
) -> Result<Extraction, ExplainError> {
    let pdfium = bind_pdfium()?;
    let document = open_document(&pdfium, pdf_path, password)?;
    let metadata = read_metadata(&document);

    let total_pages = metadata.page_count;
    info!("PDF loaded: {} pages", total_pages);

    let indices = selection.to_indices(total_pages);
    if indices.is_empty() {
        return Err(ExplainError::NoPagesSelected { total: total_pages });
    }

    let pages = document.pages();
    let mut extracted = Vec::with_capacity(indices.len());
    let mut skipped = 0;

    for &idx in &indices {
        match page_text(pages, idx) {
            Ok(text) => {
                debug!("Extracted page {} ({} chars)", idx + 1, text.chars().count());
                extracted.push(PageText::new(idx, text));
            }
            Err(e) => {
                warn!("Skipping page {}: no readable text ({:?})", idx + 1, e);
                skipped += 1;
            }
        }
    }

    Ok(Extraction {
        pages: extracted,
        metadata,
        selected_pages: indices.len(),
        skipped_pages: skipped,
    })
}

fn page_text(pages: &PdfPages<'_>, idx: usize) -> Result<String, PdfiumError> {
    let page = pages.get(idx as u16)?;
    let text = page.text()?.all();
    Ok(text)
}

/// Bind to pdfium: `$PDFIUM_LIB_PATH`, then the working directory, then the
/// system library path.
fn bind_pdfium() -> Result<Pdfium, ExplainError> {
    let bindings = match std::env::var_os(PDFIUM_LIB_PATH_ENV) {
        Some(configured) => {
            let configured = PathBuf::from(configured);
            let library = if configured.is_dir() {
                Pdfium::pdfium_platform_library_name_at_path(&configured)
            } else {
                configured
            };
            debug!("Binding pdfium from {}", library.display());
            Pdfium::bind_to_library(&library).map_err(|e| {
                ExplainError::PdfiumBindingFailed(format!("{}: {:?}", library.display(), e))
            })?
        }
        None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library())
            .map_err(|e| ExplainError::PdfiumBindingFailed(format!("{:?}", e)))?,
    };
    Ok(Pdfium::new(bindings))
}

fn open_document<'a>(
    pdfium: &'a Pdfium,
    pdf_path: &Path,
    password: Option<&'a str>,
) -> Result<PdfDocument<'a>, ExplainError> {
    pdfium
        .load_pdf_from_file(pdf_path, password)
        .map_err(|e| classify_load_error(pdf_path, password.is_some(), format!("{:?}", e)))
}

/// Map a pdfium load failure onto the password / corruption errors.
fn classify_load_error(pdf_path: &Path, password_given: bool, detail: String) -> ExplainError {
    let path = pdf_path.to_path_buf();
    if detail.to_ascii_lowercase().contains("password") {
        if password_given {
            ExplainError::WrongPassword { path }
        } else {
            ExplainError::PasswordRequired { path }
        }
    } else {
        ExplainError::CorruptPdf { path, detail }
    }
}

fn read_metadata(document: &PdfDocument<'_>) -> DocumentMetadata {
    let metadata = document.metadata();
    let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata
            .get(tag)
            .map(|t| t.value().trim().to_string())
            .filter(|v| !v.is_empty())
    };

    DocumentMetadata {
        title: get_meta(PdfDocumentMetadataTagType::Title),
        author: get_meta(PdfDocumentMetadataTagType::Author),
        subject: get_meta(PdfDocumentMetadataTagType::Subject),
        creator: get_meta(PdfDocumentMetadataTagType::Creator),
        producer: get_meta(PdfDocumentMetadataTagType::Producer),
        creation_date: get_meta(PdfDocumentMetadataTagType::CreationDate),
        modification_date: get_meta(PdfDocumentMetadataTagType::ModificationDate),
        page_count: document.pages().len() as usize,
        pdf_version: format!("{:?}", document.version()),
    }
}
