//! The GPU collaborator.
//!
//! This crate never talks to a graphics API. A host implements [`Renderer`]
//! on top of WebGL, wgpu or whatever it has, and [`super::RenderContext`]
//! drives it.

use std::fmt;

use thiserror::Error;

use crate::models::vertex_format::VertexFormat;
use crate::render::uniforms::SceneUniforms;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("{0} shader source is empty")]
    EmptySource(ShaderStage),
    #[error("{stage} shader failed to compile: {log}")]
    Compile { stage: ShaderStage, log: String },
    #[error("shader program failed to link: {0}")]
    Link(String),
    #[error("GPU upload failed: {0}")]
    Upload(String),
    #[error("draw failed: {0}")]
    Draw(String),
}

/// Vertex and fragment shader text. The crate does not look inside it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShaderSources {
    pub vertex: String,
    pub fragment: String,
}

impl ShaderSources {
    pub fn new(vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            vertex: vertex.into(),
            fragment: fragment.into(),
        }
    }

    pub fn source(&self, stage: ShaderStage) -> &str {
        match stage {
            ShaderStage::Vertex => &self.vertex,
            ShaderStage::Fragment => &self.fragment,
        }
    }

    /// Reject blank sources before they reach the driver.
    pub fn validate(&self) -> Result<(), RenderError> {
        for stage in [ShaderStage::Vertex, ShaderStage::Fragment] {
            if self.source(stage).trim().is_empty() {
                return Err(RenderError::EmptySource(stage));
            }
        }
        Ok(())
    }
}

/// Uploaded geometry as the renderer's own buffer handles.
#[derive(Debug)]
pub struct GpuMesh<V, I> {
    pub vertices: V,
    pub indices: I,
    pub format: VertexFormat,
    pub index_count: u32,
}

/// Graphics backend that can build programs, take vertex/index arrays and
/// draw them.
pub trait Renderer {
    type Program;
    type VertexBuffer;
    type IndexBuffer;

    fn link_program(&mut self, sources: &ShaderSources) -> Result<Self::Program, RenderError>;

    /// Upload interleaved vertex floats. `format` gives the attribute
    /// components, byte stride and byte offsets.
    fn upload_vertices(
        &mut self,
        vertices: &[f32],
        format: &VertexFormat,
    ) -> Result<Self::VertexBuffer, RenderError>;

    fn upload_indices(&mut self, indices: &[u16]) -> Result<Self::IndexBuffer, RenderError>;

    fn delete_program(&mut self, program: Self::Program);

    fn delete_vertex_buffer(&mut self, buffer: Self::VertexBuffer);

    fn delete_index_buffer(&mut self, buffer: Self::IndexBuffer);

    /// Draw `mesh` as indexed triangles.
    fn draw(
        &mut self,
        program: &Self::Program,
        mesh: &GpuMesh<Self::VertexBuffer, Self::IndexBuffer>,
        uniforms: &SceneUniforms,
    ) -> Result<(), RenderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_sources_are_rejected() {
        let sources = ShaderSources::new("void main() {}", "  \n");
        assert_eq!(
            sources.validate(),
            Err(RenderError::EmptySource(ShaderStage::Fragment))
        );
        assert!(ShaderSources::new("a", "b").validate().is_ok());
        assert_eq!(
            ShaderSources::default().validate(),
            Err(RenderError::EmptySource(ShaderStage::Vertex))
        );
    }
}
