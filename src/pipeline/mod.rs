//! Pipeline stages for explaining a PDF sentence by sentence.
//!
//! Each submodule implements one step and is tested on its own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ segment ──▶ cache ─(miss)─▶ llm ──▶ assemble
//! (URL/path) (pdfium)   (sentences)  (JSON file)    (model)  (md/html/pdf)
//! ```
//!
//! 1. [`input`]: canonicalise the user-supplied path or URL to a local file
//! 2. [`extract`]: read the text layer of the selected pages; runs in
//!    `spawn_blocking` because pdfium is not async-safe
//! 3. [`segment`]: split page text into paragraphs and sentences, each with
//!    its (page, paragraph, sentence) location
//! 4. [`cache`]: the persistent sentence → explanation map
//! 5. [`llm`]: ask the model on a cache miss, with retry/backoff; the
//!    only stage with network I/O
//! 6. [`assemble`]: render the explained sentences as a document
//!
//! [`postprocess`] holds the text cleanup used by `segment` and `llm`.

pub mod assemble;
pub mod cache;
pub mod extract;
pub mod input;
pub mod llm;
pub mod postprocess;
pub mod segment;
