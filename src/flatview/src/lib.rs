//! # flatview
//!
//! Schema-driven viewer library for FlatBuffers binary container files.
//!
//! This library provides functionality to:
//! - Select the schema used for decoding (embedded default or a persisted
//!   user override)
//! - Locate or provision the external `flatc` compiler across platforms
//! - Decode a binary payload to JSON by invoking `flatc` against scratch
//!   copies of the schema and payload
//! - Re-encode byte-array fields as base64 so they print safely as text
//!
//! ## Example
//!
//! ```no_run
//! use flatview::{Converter, FlatcLocator, SchemaSource};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let payload = std::fs::read("document.bin")?;
//!
//! let install_dir = FlatcLocator::default_install_dir().expect("no local data directory");
//! let locator = FlatcLocator::new(install_dir);
//! let source = SchemaSource::discover(&std::env::current_dir()?)?;
//!
//! let text = Converter::new(&locator, &source).convert(&payload)?;
//! println!("{text}");
//! # Ok(())
//! # }
//! ```

pub mod convert;
pub mod flatc;
pub mod rewrite;
pub mod schema;
pub mod source;

// Re-export commonly used items
#[doc(inline)]
pub use convert::{ConvertError, Converter};
#[doc(inline)]
pub use flatc::{FlatcError, FlatcLocator, FLATC_VERSION};
#[doc(inline)]
pub use rewrite::encode_binary_fields;
#[doc(inline)]
pub use schema::BinaryFieldClassifier;
#[doc(inline)]
pub use source::{SchemaSource, SchemaSourceError, DEFAULT_SCHEMA};
