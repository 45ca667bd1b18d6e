//! Pipeline stages for phrase-to-PDF generation.
//!
//! Each submodule implements exactly one transformation step. Only `fetch`
//! touches the network; everything before it is pure and runs before any I/O.
//!
//! ## Data Flow
//!
//! ```text
//! normalize ──▶ tokenize ──▶ validate ──▶ fetch ──▶ assemble
//!  (text)       (tokens)    (registry)   (HTTP)    (lopdf)
//! ```
//!
//! 1. [`normalize`] — lowercase, `.`-separated `a`–`z` text
//! 2. [`tokenize`]  — one token per character; word-initial `e`/`r` marked
//! 3. [`validate`]  — every token must resolve through the registry
//! 4. [`fetch`]     — cached get-or-fetch of fragment PDFs
//! 5. [`assemble`]  — append first pages in reverse token order

pub mod assemble;
pub mod fetch;
pub mod normalize;
pub mod tokenize;
pub mod validate;
