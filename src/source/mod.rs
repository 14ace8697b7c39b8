//! Source resolution

pub mod resolver;

pub use resolver::{resolve_base64, resolve_path, ResolvedDocument};
