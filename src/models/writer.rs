//! Encoder for c2g containers.
//!
//! Writes the exact layout [`crate::models::c2g`] reads. Reserved header
//! bytes are written as zero.

use thiserror::Error;
use tracing::info;

use crate::error::ErrorKind;
use crate::models::c2g::{self, BASE_VERTEX_SIZE, FormatIssue, Mesh, MeshHeader, Revision};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("vertex array holds {actual} floats but the header declares {expected}")]
    VertexCountMismatch { expected: usize, actual: usize },
    #[error("index array holds {actual} indices but the header declares {expected}")]
    IndexCountMismatch { expected: usize, actual: usize },
    #[error("{count} {what} do not fit in a 32-bit header field")]
    CountOverflow { what: &'static str, count: usize },
    #[error("revision {revision} only stores position + normal, got {vertex_size}-byte vertices")]
    LegacyChannels { revision: Revision, vertex_size: u16 },
    #[error("invalid header: {0}")]
    InvalidHeader(#[from] FormatIssue),
}

/// Build a revision C mesh from interleaved vertex floats and indices.
///
/// `vertices` must hold whole records of position, normal, then the given
/// number of color and texcoord components.
pub fn mesh_from_arrays(
    vertices: Vec<f32>,
    indices: Vec<u16>,
    num_colors_per_vertex: u16,
    num_tex_coords_per_vertex: u16,
) -> Result<Mesh, EncodeError> {
    let mut header = MeshHeader::extended(num_colors_per_vertex, num_tex_coords_per_vertex, 0, 0);
    header.validate()?;

    let floats_per_vertex = header.floats_per_vertex();
    if vertices.len() % floats_per_vertex != 0 {
        return Err(EncodeError::VertexCountMismatch {
            expected: vertices.len().next_multiple_of(floats_per_vertex),
            actual: vertices.len(),
        });
    }

    let vertex_count = vertices.len() / floats_per_vertex;
    header.num_vertices = u32::try_from(vertex_count).map_err(|_| EncodeError::CountOverflow {
        what: "vertices",
        count: vertex_count,
    })?;
    header.num_indices = u32::try_from(indices.len()).map_err(|_| EncodeError::CountOverflow {
        what: "indices",
        count: indices.len(),
    })?;

    Ok(Mesh {
        header,
        vertices,
        indices,
    })
}

/// Encode a mesh in the revision its header names.
pub fn encode(mesh: &Mesh) -> Result<Vec<u8>, EncodeError> {
    encode_revision(mesh, mesh.header.revision)
}

/// Encode a mesh in the given revision.
///
/// Legacy revisions can only carry 24-byte position + normal vertices.
pub fn encode_revision(mesh: &Mesh, revision: Revision) -> Result<Vec<u8>, EncodeError> {
    let header = MeshHeader {
        revision,
        ..mesh.header
    };
    header.validate()?;

    if revision.is_legacy()
        && (header.vertex_size != BASE_VERTEX_SIZE || header.channel_bytes() != 0)
    {
        return Err(EncodeError::LegacyChannels {
            revision,
            vertex_size: header.vertex_size,
        });
    }

    let expected_floats = header.num_vertices as usize * header.floats_per_vertex();
    if mesh.vertices.len() != expected_floats {
        return Err(EncodeError::VertexCountMismatch {
            expected: expected_floats,
            actual: mesh.vertices.len(),
        });
    }
    if mesh.indices.len() != header.num_indices as usize {
        return Err(EncodeError::IndexCountMismatch {
            expected: header.num_indices as usize,
            actual: mesh.indices.len(),
        });
    }

    let mut out = Vec::with_capacity(header.total_size().unwrap_or_default());
    out.extend_from_slice(&[0u8; 8]);
    match revision {
        Revision::Extended => {
            out.extend_from_slice(&header.num_colors_per_vertex.to_le_bytes());
            out.extend_from_slice(&header.num_tex_coords_per_vertex.to_le_bytes());
            out.extend_from_slice(&header.vertex_size.to_le_bytes());
            out.extend_from_slice(&header.index_size.to_le_bytes());
            out.extend_from_slice(&header.num_vertices.to_le_bytes());
            out.extend_from_slice(&header.num_indices.to_le_bytes());
        }
        Revision::Minimal | Revision::Strided => {
            out.extend_from_slice(&header.num_vertices.to_le_bytes());
            out.extend_from_slice(&0u32.to_le_bytes());
            out.extend_from_slice(&header.num_indices.to_le_bytes());
        }
    }
    debug_assert_eq!(out.len(), revision.header_size());

    for v in &mesh.vertices {
        out.extend_from_slice(&v.to_le_bytes());
    }
    for i in &mesh.indices {
        out.extend_from_slice(&i.to_le_bytes());
    }

    Ok(out)
}

/// Re-encode a legacy (revision A or B) file as revision C.
pub fn upgrade(data: &[u8], from: Revision) -> Result<Vec<u8>, ErrorKind> {
    let mesh = c2g::decode_revision(data, from)?;
    let out = encode_revision(&mesh, Revision::Extended)?;
    info!(
        from = %from,
        vertices = mesh.header.num_vertices,
        indices = mesh.header.num_indices,
        "upgraded c2g mesh to revision C"
    );
    Ok(out)
}
