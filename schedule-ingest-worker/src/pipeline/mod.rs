//! The OCR → layout → normalize collaborator chain.

pub mod stub;
pub mod traits;
pub mod types;

pub use stub::{InMemoryLayoutParser, InMemoryOcrEngine, InMemoryShiftNormalizer};
pub use traits::{LayoutParser, OcrEngine, ShiftNormalizer};
pub use types::{ImageRef, RawEntry, TextBox};
