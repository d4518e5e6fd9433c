//! Attribute layout of c2g vertex records.
//!
//! Every record starts with position and normal. Color components follow,
//! then texture coordinate components; whatever is left of the record is
//! kept as opaque extra data. All components are float32 and offsets are in
//! bytes from the start of the record.

use crate::models::c2g::MeshHeader;

/// Semantic meaning of a vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AttributeSemantic {
    Position,
    Normal,
    Color,
    TexCoord,
    Extra,
}

impl AttributeSemantic {
    /// Name of the shader input the demo shaders bind this attribute to.
    pub fn shader_attribute(self) -> Option<&'static str> {
        match self {
            AttributeSemantic::Position => Some("aVertexPosition"),
            AttributeSemantic::Normal => Some("aVertexNormal"),
            AttributeSemantic::Color => Some("aVertexColor"),
            AttributeSemantic::TexCoord => Some("aTextureCoord"),
            AttributeSemantic::Extra => None,
        }
    }
}

/// A single vertex attribute descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VertexAttribute {
    pub semantic: AttributeSemantic,
    /// Number of float32 components.
    pub components: usize,
    /// Byte offset within the vertex record.
    pub offset: usize,
}

impl VertexAttribute {
    pub fn byte_len(&self) -> usize {
        self.components * 4
    }
}

/// What a GPU attribute binding needs: component count, byte stride and
/// byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributePointer {
    pub components: usize,
    pub stride: usize,
    pub offset: usize,
}

/// Vertex layout with all attributes and the record stride.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VertexFormat {
    pub attributes: Vec<VertexAttribute>,
    pub stride: usize,
}

impl VertexFormat {
    /// Derive the layout a header declares.
    ///
    /// Channels that would run past `vertex_size` are cut short; decoding
    /// rejects such headers, so this only matters for unvalidated input.
    pub fn from_header(header: &MeshHeader) -> Self {
        let stride = usize::from(header.vertex_size);
        let mut attributes = Vec::with_capacity(5);
        let mut offset = 0usize;

        let mut push = |semantic, components: usize| {
            let available = stride.saturating_sub(offset) / 4;
            let components = components.min(available);
            if components > 0 {
                attributes.push(VertexAttribute {
                    semantic,
                    components,
                    offset,
                });
                offset += components * 4;
            }
        };

        push(AttributeSemantic::Position, 3);
        push(AttributeSemantic::Normal, 3);
        push(
            AttributeSemantic::Color,
            usize::from(header.num_colors_per_vertex),
        );
        push(
            AttributeSemantic::TexCoord,
            usize::from(header.num_tex_coords_per_vertex),
        );
        push(AttributeSemantic::Extra, usize::MAX);

        VertexFormat { attributes, stride }
    }

    pub fn attribute(&self, semantic: AttributeSemantic) -> Option<&VertexAttribute> {
        self.attributes.iter().find(|a| a.semantic == semantic)
    }

    pub fn attribute_pointer(&self, semantic: AttributeSemantic) -> Option<AttributePointer> {
        self.attribute(semantic).map(|a| AttributePointer {
            components: a.components,
            stride: self.stride,
            offset: a.offset,
        })
    }

    pub fn has(&self, semantic: AttributeSemantic) -> bool {
        self.attribute(semantic).is_some()
    }
}
