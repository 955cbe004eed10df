//! Wire types for the OCR → layout → normalize collaborator chain.
//! These are deliberately thin: the real implementations of each stage are
//! out of scope; this crate only needs a shape to pass between them.

/// A reference to one captured image, enough for a collaborator to locate
/// its bytes without this crate needing to know how object storage works.
#[derive(Debug, Clone)]
pub struct ImageRef {
    pub sequence: i32,
    pub r2_key: String,
}

/// One recognized text region.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBox {
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
    pub confidence: f64,
}

/// One layout-grouped schedule entry, before semantic normalization. Times are already folded to `HH:MM` by this stage.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEntry {
    pub start: Option<String>,
    pub end: Option<String>,
    pub title: Option<String>,
    pub location: Option<String>,
    pub address: Option<String>,
}
