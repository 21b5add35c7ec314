//! Small helpers shared by the library and the CLI.
//!
//! - **Base URL validation**: HTTPS everywhere except loopback
//! - **Text**: terminal-safe, width-aware card labels

mod text;
mod url_validator;

pub use text::{card_label, display_width, sanitize, truncate_to_width};
pub use url_validator::{validate_base_url, UrlValidationError};
