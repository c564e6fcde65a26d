//! Pipeline stages for voter-list structure inference.
//!
//! Each submodule implements one step. The structural core (`layout`,
//! `validate`, `fields`, `metadata`, `aggregate`) is pure and works only on
//! positioned tokens, so it is testable without pdfium or an OCR engine.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ (ocr) ──▶ layout ──▶ validate ──▶ fields/metadata ──▶ aggregate
//! (URL/path) (pdfium)  (words)   (grid)     (verdict)    (records)            (document)
//!                                                                               │
//!                                                                   searchable ◀┘
//! ```
//!
//! 1. [`input`]  canonicalise the user-supplied path or URL to a local file
//! 2. [`render`] native text tokens and page rasters; runs in `spawn_blocking`
//!    because pdfium is not async-safe
//! 3. [`tokens`] the positioned-token model shared by both token sources
//! 4. [`ocr`]    OCR adapter for scanned pages
//! 5. [`layout`] line grouping, column discovery, grid projection
//! 6. [`validate`] decide whether a grid is a voter table
//! 7. [`fields`] and [`metadata`] map cells and page text to record fields
//! 8. [`aggregate`] assemble the per-document record set
//! 9. [`searchable`] write the image + invisible-text PDF

pub mod aggregate;
pub mod fields;
pub mod input;
pub mod layout;
pub mod metadata;
pub mod ocr;
pub mod render;
pub mod searchable;
pub mod tokens;
pub mod validate;
