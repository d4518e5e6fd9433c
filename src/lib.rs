/// Byte sources for mesh files: memory, memory-mapped files and base64 text
pub mod data;
/// Error definitions
pub mod error;
/// Conversions from c2g meshes to interchange formats (glTF)
pub mod export;
/// The c2g mesh container: parsing, vertex layout and encoding
pub mod models;
/// Generic wrapper for values that may or may not match a known variant.
pub mod recognized;
/// Render context, renderer trait and frame scheduling.
pub mod render;
