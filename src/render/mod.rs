//! Rendering of the document model: DOCX packages plus JSON and plain-text dumps.

pub mod docx;
mod json;
mod options;
mod result;
mod text;

pub use docx::{to_docx, verify_package, write_docx, PackagePlan, PackageReport};
pub use json::{to_json, JsonFormat};
pub use options::{PageSelection, RenderOptions};
pub use result::ConversionStats;
pub use text::to_text;
