//! File I/O
//!
//! Loading statistics and topology documents, and persisting the labelled
//! configurations a search produces. JSON and YAML are supported, chosen by
//! file extension.

mod format;
mod load;
mod save;

#[cfg(test)]
mod tests;

pub use format::FileFormat;
pub use load::{load_document, parse_document};
pub use save::{artifact_path, save_document, save_outcome, LayerBits, QuantizedArtifact};
