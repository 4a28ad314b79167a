//! Pipeline stages for the LaTeX → DOCX → LaTeX round trip.
//!
//! Each submodule implements one transformation step and is testable on its
//! own. Rewrites are pure `&str → String` functions; only [`input`],
//! [`assets`] and [`external`] touch the file system.
//!
//! ## Data Flow
//!
//! ```text
//! forward:  input ──▶ normalize ──▶ listings (tag, render) ──▶ [pandoc → DOCX]
//! reverse:  [pandoc → LaTeX] ──▶ repair ──▶ anchors ──▶ assets ──▶ preamble
//! ```
//!
//! 1. [`input`]     - enumerate `.tex` units in lexical path order; write-if-changed
//! 2. [`normalize`] - seven ordered rules that keep the converter from
//!    mangling figures, math scripts, labels and the title page
//! 3. [`classify`] + [`listings`] - tag code blocks as captioned listings,
//!    then render them with chapter-scoped numbers
//! 4. [`external`]  - the converter seam (pandoc)
//! 5. [`repair`]    - nine ordered stages that undo converter artifacts
//! 6. [`anchors`]   - re-attach `\label`s by caption text
//! 7. [`assets`]    - map renamed images back to originals by content hash
//! 8. [`preamble`]  - make the restored body compilable
//!
//! [`plaintext`] is a side tool for diffing an original against its round trip.

pub mod anchors;
pub mod assets;
pub mod classify;
pub mod external;
pub mod input;
pub mod listings;
pub mod normalize;
pub mod plaintext;
pub mod preamble;
pub mod repair;
pub(crate) mod tex;
