//! Image preparation before transmission.
//!
//! - **normalize**: load and fit images inside a bounding box
//! - **payload**: base64 data URLs for request bodies

pub mod normalize;
pub mod payload;

pub use normalize::{fit_within, ImageNormalizer, NormalizedImage};
pub use payload::{encode_to_data_url, ImageInput};
