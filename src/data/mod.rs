/// Shared winnow helpers
pub mod parser_utils;
/// Base64 text blob codec
pub mod text_blob;
/// Byte sources backed by files
pub mod wrappers;

use std::borrow::Cow;

use rootcause::prelude::*;
use tracing::debug;

use crate::error::ErrorKind;
use crate::models::c2g::{self, DecodeOptions, Mesh};

/// Somewhere raw container bytes come from.
pub trait MeshSource {
    fn bytes(&self) -> Result<Cow<'_, [u8]>, ErrorKind>;

    /// Short human-readable description for logs and error context.
    fn describe(&self) -> String {
        "<mesh source>".to_string()
    }
}

/// Bytes already in memory.
#[derive(Debug, Clone)]
pub struct InMemory(pub Vec<u8>);

impl MeshSource for InMemory {
    fn bytes(&self) -> Result<Cow<'_, [u8]>, ErrorKind> {
        Ok(Cow::Borrowed(&self.0))
    }

    fn describe(&self) -> String {
        format!("<{} bytes in memory>", self.0.len())
    }
}

/// A base64 text blob, decoded on every read.
#[derive(Debug, Clone)]
pub struct Base64Text {
    text: String,
}

impl Base64Text {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl MeshSource for Base64Text {
    fn bytes(&self) -> Result<Cow<'_, [u8]>, ErrorKind> {
        Ok(Cow::Owned(text_blob::decode_text(&self.text)?))
    }

    fn describe(&self) -> String {
        format!("<{} characters of base64>", self.text.len())
    }
}

/// A source that defers to a closure, e.g. a text box in a host UI.
pub struct SourceWithCallback<F> {
    callback: F,
}

impl<F> SourceWithCallback<F>
where
    F: Fn() -> Result<Vec<u8>, ErrorKind>,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> MeshSource for SourceWithCallback<F>
where
    F: Fn() -> Result<Vec<u8>, ErrorKind>,
{
    fn bytes(&self) -> Result<Cow<'_, [u8]>, ErrorKind> {
        (self.callback)().map(Cow::Owned)
    }
}

/// Read a source and decode it.
pub fn load_mesh(source: &dyn MeshSource, options: &DecodeOptions) -> Result<Mesh, Report> {
    let name = source.describe();
    debug!("loading mesh from {name}");

    let bytes = source
        .bytes()
        .context(format!("Could not read mesh bytes from {name}"))?;

    let mesh = c2g::decode_with(&bytes, options).context(format!(
        "Could not decode {name} as a revision {} c2g mesh",
        options.revision
    ))?;

    Ok(mesh)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::models::c2g::Revision;
    use crate::models::writer::{encode, encode_revision, mesh_from_arrays};

    fn triangle_bytes() -> Vec<u8> {
        let mesh = mesh_from_arrays(vec![1.0; 18], vec![0, 1, 2], 0, 0).unwrap();
        encode(&mesh).unwrap()
    }

    #[test]
    fn load_from_memory() {
        let mesh = load_mesh(&InMemory(triangle_bytes()), &DecodeOptions::default()).unwrap();
        assert_eq!(mesh.triangle_count(), 1);
    }

    #[test]
    fn load_from_base64() {
        let text = text_blob::encode_text(&triangle_bytes());
        let mesh = load_mesh(&Base64Text::new(text), &DecodeOptions::default()).unwrap();
        assert_eq!(mesh.indices, vec![0, 1, 2]);
    }

    #[test]
    fn load_legacy_through_callback() {
        let plain = mesh_from_arrays(vec![2.0; 12], vec![0, 1, 1], 0, 0).unwrap();
        let legacy = encode_revision(&plain, Revision::Minimal).unwrap();
        let source = SourceWithCallback::new(move || Ok(legacy.clone()));
        let options = DecodeOptions::builder().revision(Revision::Minimal).build();
        let mesh = load_mesh(&source, &options).unwrap();
        assert_eq!(mesh.vertex_count(), 2);
    }

    #[test]
    fn decode_failures_are_reported() {
        let mut bytes = triangle_bytes();
        bytes.pop();
        assert!(load_mesh(&InMemory(bytes), &DecodeOptions::default()).is_err());
        assert!(load_mesh(&Base64Text::new("@@@"), &DecodeOptions::default()).is_err());
    }
}
