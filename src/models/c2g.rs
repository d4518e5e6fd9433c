//! Parser for c2g mesh containers.
//!
//! A c2g file is a fixed-size header followed by an interleaved float32
//! vertex block and a uint16 index block. Three header revisions exist and
//! they are not compatible with each other. There is no magic number or
//! version tag in the file, so the caller picks the revision explicitly;
//! [`Revision::Extended`] (revision C) is the current one.
//!
//! Layout of a revision C file:
//!
//! | Offset | Size | Field |
//! |---|---|---|
//! | 0x00 | 8 | reserved |
//! | 0x08 | 2 | `num_colors_per_vertex` |
//! | 0x0A | 2 | `num_tex_coords_per_vertex` |
//! | 0x0C | 2 | `vertex_size` (bytes per vertex record) |
//! | 0x0E | 2 | `index_size` (bytes per index, always 2) |
//! | 0x10 | 4 | `num_vertices` |
//! | 0x14 | 4 | `num_indices` |
//! | 0x18 | `vertex_size * num_vertices` | vertex data |
//! | ... | `index_size * num_indices` | index data |

use std::fmt;
use std::ops::Range;

use bon::Builder;
use itertools::Itertools;
use thiserror::Error;
use tracing::debug;
use winnow::Parser;
use winnow::binary::{le_f32, le_u16, le_u32};
use winnow::combinator::repeat;
use winnow::token::take;

use crate::data::parser_utils::{WResult, region};
use crate::models::vertex_format::VertexFormat;
use crate::recognized::Recognized;

/// Header size of revision C files.
pub const HEADER_SIZE: usize = 0x18;
/// Header size of revision A and B files.
pub const LEGACY_HEADER_SIZE: usize = 0x14;
/// Bytes taken by position + normal, the part of a vertex every file has.
pub const BASE_VERTEX_SIZE: u16 = 24;
/// The only index width any revision uses.
pub const INDEX_SIZE: u16 = 2;

const RESERVED_SIZE: usize = 8;

/// Header revision of a c2g container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Revision {
    /// Revision A: 20-byte header, fixed position + normal vertices.
    Minimal,
    /// Revision B: same bytes as A. Readers bind attributes with a 24-byte
    /// stride instead of element counts.
    Strided,
    /// Revision C: 24-byte header with explicit vertex/index sizes and
    /// optional color and texture coordinate channels.
    #[default]
    Extended,
}

impl Revision {
    pub const ALL: [Revision; 3] = [Revision::Minimal, Revision::Strided, Revision::Extended];

    pub const fn header_size(self) -> usize {
        match self {
            Revision::Minimal | Revision::Strided => LEGACY_HEADER_SIZE,
            Revision::Extended => HEADER_SIZE,
        }
    }

    pub const fn is_legacy(self) -> bool {
        !matches!(self, Revision::Extended)
    }

    pub const fn letter(self) -> char {
        match self {
            Revision::Minimal => 'A',
            Revision::Strided => 'B',
            Revision::Extended => 'C',
        }
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// Index element types a header can name.
///
/// 32-bit indices are recognized so they can be reported by name, but no
/// revision allows them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IndexFormat {
    U16,
    U32,
}

impl IndexFormat {
    pub fn from_size(size: u16) -> Recognized<IndexFormat, u16> {
        match size {
            2 => Recognized::Known(IndexFormat::U16),
            4 => Recognized::Known(IndexFormat::U32),
            other => Recognized::Unknown(other),
        }
    }

    /// Bytes per index.
    pub const fn size(self) -> u16 {
        match self {
            IndexFormat::U16 => 2,
            IndexFormat::U32 => 4,
        }
    }
}

impl fmt::Display for IndexFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexFormat::U16 => f.write_str("u16"),
            IndexFormat::U32 => f.write_str("u32"),
        }
    }
}

/// Header values that are readable but not decodable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FormatIssue {
    #[error("index size {} is not supported (expected 2)", index_size_label(.0))]
    IndexSize(Recognized<IndexFormat, u16>),
    #[error("vertex size {0} is smaller than position + normal (24 bytes)")]
    VertexSizeTooSmall(u16),
    #[error("vertex size {0} is not a whole number of float32 components")]
    VertexSizeMisaligned(u16),
    #[error(
        "declared color/texcoord channels need {required} bytes per vertex but vertex size is {vertex_size}"
    )]
    ChannelsExceedVertexSize { vertex_size: u16, required: usize },
    #[error("{extra} unexpected bytes follow the index block")]
    TrailingBytes { extra: usize },
}

fn index_size_label(format: &Recognized<IndexFormat, u16>) -> String {
    match format {
        Recognized::Known(known) => format!("{} ({known})", known.size()),
        Recognized::Unknown(raw) => raw.to_string(),
    }
}

/// Errors produced while decoding a container.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("truncated buffer: need {needed} bytes, have {available}")]
    TruncatedBuffer { needed: usize, available: usize },
    #[error("unsupported format: {0}")]
    UnsupportedFormat(#[from] FormatIssue),
}

/// Knobs for [`decode_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Builder)]
pub struct DecodeOptions {
    /// Header revision to read the buffer as.
    #[builder(default)]
    pub revision: Revision,
    /// Accept bytes after the index block instead of failing.
    #[builder(default = true)]
    pub allow_trailing_bytes: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        DecodeOptions::builder().build()
    }
}

/// Decoded header fields.
///
/// Legacy revisions report the values their fixed layout implies: no color
/// or texcoord channels, 24-byte vertices and 2-byte indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MeshHeader {
    pub revision: Revision,
    /// Float32 color components per vertex (e.g. 4 for RGBA).
    pub num_colors_per_vertex: u16,
    /// Float32 texture coordinate components per vertex (e.g. 2 for UV).
    pub num_tex_coords_per_vertex: u16,
    /// Bytes per vertex record.
    pub vertex_size: u16,
    /// Bytes per index.
    pub index_size: u16,
    pub num_vertices: u32,
    pub num_indices: u32,
}

impl MeshHeader {
    /// A revision C header whose vertex size is exactly what the channels need.
    pub fn extended(
        num_colors_per_vertex: u16,
        num_tex_coords_per_vertex: u16,
        num_vertices: u32,
        num_indices: u32,
    ) -> Self {
        let channels = 4 * (u32::from(num_colors_per_vertex) + u32::from(num_tex_coords_per_vertex));
        MeshHeader {
            revision: Revision::Extended,
            num_colors_per_vertex,
            num_tex_coords_per_vertex,
            vertex_size: u16::try_from(u32::from(BASE_VERTEX_SIZE) + channels).unwrap_or(u16::MAX),
            index_size: INDEX_SIZE,
            num_vertices,
            num_indices,
        }
    }

    /// A position + normal header in the given revision.
    pub fn plain(revision: Revision, num_vertices: u32, num_indices: u32) -> Self {
        MeshHeader {
            revision,
            num_colors_per_vertex: 0,
            num_tex_coords_per_vertex: 0,
            vertex_size: BASE_VERTEX_SIZE,
            index_size: INDEX_SIZE,
            num_vertices,
            num_indices,
        }
    }

    pub fn header_size(&self) -> usize {
        self.revision.header_size()
    }

    pub fn index_format(&self) -> Recognized<IndexFormat, u16> {
        IndexFormat::from_size(self.index_size)
    }

    pub fn floats_per_vertex(&self) -> usize {
        usize::from(self.vertex_size) / 4
    }

    pub fn triangle_count(&self) -> u32 {
        self.num_indices / 3
    }

    /// Bytes per vertex taken by the declared color and texcoord channels.
    pub fn channel_bytes(&self) -> usize {
        4 * (usize::from(self.num_colors_per_vertex) + usize::from(self.num_tex_coords_per_vertex))
    }

    pub fn vertex_block_len(&self) -> Option<usize> {
        usize::from(self.vertex_size).checked_mul(usize::try_from(self.num_vertices).ok()?)
    }

    pub fn index_block_len(&self) -> Option<usize> {
        usize::from(self.index_size).checked_mul(usize::try_from(self.num_indices).ok()?)
    }

    /// Byte range of the vertex block. `None` if the size overflows.
    pub fn vertex_region(&self) -> Option<Range<usize>> {
        region(self.header_size(), self.vertex_block_len()?)
    }

    /// Byte range of the index block. `None` if the size overflows.
    pub fn index_region(&self) -> Option<Range<usize>> {
        region(self.vertex_region()?.end, self.index_block_len()?)
    }

    /// Total bytes the header declares, header included.
    pub fn total_size(&self) -> Option<usize> {
        Some(self.index_region()?.end)
    }

    /// Checks the fields that do not depend on the buffer length.
    pub fn validate(&self) -> Result<(), FormatIssue> {
        if self.index_size != INDEX_SIZE {
            return Err(FormatIssue::IndexSize(self.index_format()));
        }
        if self.vertex_size < BASE_VERTEX_SIZE {
            return Err(FormatIssue::VertexSizeTooSmall(self.vertex_size));
        }
        if self.vertex_size % 4 != 0 {
            return Err(FormatIssue::VertexSizeMisaligned(self.vertex_size));
        }
        let required = usize::from(BASE_VERTEX_SIZE) + self.channel_bytes();
        if required > usize::from(self.vertex_size) {
            return Err(FormatIssue::ChannelsExceedVertexSize {
                vertex_size: self.vertex_size,
                required,
            });
        }
        Ok(())
    }

    pub fn vertex_format(&self) -> VertexFormat {
        VertexFormat::from_header(self)
    }
}

/// A decoded container: header plus the raw interleaved vertex floats and
/// the index list.
///
/// `vertices` is not split into channels; use [`Mesh::vertex_format`] to get
/// the stride/offset map.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Mesh {
    pub header: MeshHeader,
    pub vertices: Vec<f32>,
    pub indices: Vec<u16>,
}

impl Mesh {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / self.floats_per_vertex().max(1)
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn floats_per_vertex(&self) -> usize {
        self.header.floats_per_vertex()
    }

    pub fn vertex_format(&self) -> VertexFormat {
        self.header.vertex_format()
    }

    /// All floats of vertex `i`.
    pub fn vertex(&self, i: usize) -> Option<&[f32]> {
        let stride = self.floats_per_vertex();
        let start = i.checked_mul(stride)?;
        self.vertices.get(start..start.checked_add(stride)?)
    }

    pub fn position(&self, i: usize) -> Option<[f32; 3]> {
        self.vertex(i)?.get(0..3).map(|p| [p[0], p[1], p[2]])
    }

    pub fn normal(&self, i: usize) -> Option<[f32; 3]> {
        self.vertex(i)?.get(3..6).map(|n| [n[0], n[1], n[2]])
    }

    /// Color components of vertex `i`, if the mesh has any.
    pub fn color(&self, i: usize) -> Option<&[f32]> {
        let colors = usize::from(self.header.num_colors_per_vertex);
        self.channel(i, 6, colors)
    }

    /// Texture coordinate components of vertex `i`, if the mesh has any.
    pub fn tex_coord(&self, i: usize) -> Option<&[f32]> {
        let start = 6 + usize::from(self.header.num_colors_per_vertex);
        let tex_coords = usize::from(self.header.num_tex_coords_per_vertex);
        self.channel(i, start, tex_coords)
    }

    // Offsets in floats; mirrors the layout `VertexFormat::from_header` reports.
    fn channel(&self, i: usize, start: usize, len: usize) -> Option<&[f32]> {
        if len == 0 {
            return None;
        }
        self.vertex(i)?.get(start..start.checked_add(len)?)
    }

    /// Positions of every whole vertex record.
    pub fn positions(&self) -> impl Iterator<Item = [f32; 3]> + '_ {
        self.vertices
            .chunks_exact(self.floats_per_vertex().max(1))
            .filter_map(|v| v.get(0..3))
            .map(|p| [p[0], p[1], p[2]])
    }

    /// Index triples. A trailing partial triple is ignored.
    pub fn triangles(&self) -> impl Iterator<Item = [u16; 3]> + '_ {
        self.indices
            .iter()
            .copied()
            .tuples::<(u16, u16, u16)>()
            .map(|(a, b, c)| [a, b, c])
    }

    pub fn max_index(&self) -> Option<u16> {
        self.indices.iter().copied().max()
    }

    /// Number of indices that point past the last vertex.
    pub fn out_of_range_indices(&self) -> usize {
        let count = self.vertex_count();
        self.indices.iter().filter(|&&i| usize::from(i) >= count).count()
    }

    /// Axis-aligned bounds of the positions as `(min, max)`.
    pub fn bounds(&self) -> Option<([f32; 3], [f32; 3])> {
        let mut positions = self.positions().map(glam::Vec3::from_array);
        let first = positions.next()?;
        let (min, max) = positions.fold((first, first), |(min, max), p| (min.min(p), max.max(p)));
        Some((min.to_array(), max.to_array()))
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}

// --- Winnow parsers ---

fn parse_extended_header(input: &mut &[u8]) -> WResult<MeshHeader> {
    let _reserved: &[u8] = take(RESERVED_SIZE).parse_next(input)?;
    let num_colors_per_vertex = le_u16.parse_next(input)?;
    let num_tex_coords_per_vertex = le_u16.parse_next(input)?;
    let vertex_size = le_u16.parse_next(input)?;
    let index_size = le_u16.parse_next(input)?;
    let num_vertices = le_u32.parse_next(input)?;
    let num_indices = le_u32.parse_next(input)?;
    Ok(MeshHeader {
        revision: Revision::Extended,
        num_colors_per_vertex,
        num_tex_coords_per_vertex,
        vertex_size,
        index_size,
        num_vertices,
        num_indices,
    })
}

fn parse_legacy_header(input: &mut &[u8], revision: Revision) -> WResult<MeshHeader> {
    let _reserved: &[u8] = take(RESERVED_SIZE).parse_next(input)?;
    let num_vertices = le_u32.parse_next(input)?;
    let _unused = le_u32.parse_next(input)?;
    let num_indices = le_u32.parse_next(input)?;
    Ok(MeshHeader::plain(revision, num_vertices, num_indices))
}

fn parse_vertex_block(input: &mut &[u8], count: usize) -> WResult<Vec<f32>> {
    repeat(count, le_f32).parse_next(input)
}

fn parse_index_block(input: &mut &[u8], count: usize) -> WResult<Vec<u16>> {
    repeat(count, le_u16).parse_next(input)
}

/// Read and validate the header of `data` as the given revision.
pub fn parse_header(data: &[u8], revision: Revision) -> Result<MeshHeader, DecodeError> {
    let header_size = revision.header_size();
    let truncated = DecodeError::TruncatedBuffer {
        needed: header_size,
        available: data.len(),
    };
    if data.len() < header_size {
        return Err(truncated);
    }

    let input = &mut &data[..header_size];
    let header = match revision {
        Revision::Extended => parse_extended_header(input),
        Revision::Minimal | Revision::Strided => parse_legacy_header(input, revision),
    }
    .map_err(|_| truncated)?;

    header.validate()?;
    Ok(header)
}

/// Decode a revision C container.
pub fn decode(data: &[u8]) -> Result<Mesh, DecodeError> {
    decode_with(data, &DecodeOptions::default())
}

/// Decode a container of a specific revision.
pub fn decode_revision(data: &[u8], revision: Revision) -> Result<Mesh, DecodeError> {
    decode_with(data, &DecodeOptions::builder().revision(revision).build())
}

/// Decode a container. Never reads outside the size the header declares.
pub fn decode_with(data: &[u8], options: &DecodeOptions) -> Result<Mesh, DecodeError> {
    let header = parse_header(data, options.revision)?;

    // Overflowing sizes cannot be satisfied by any buffer.
    let (vertex_region, index_region) = match (header.vertex_region(), header.index_region()) {
        (Some(v), Some(i)) => (v, i),
        _ => {
            return Err(DecodeError::TruncatedBuffer {
                needed: usize::MAX,
                available: data.len(),
            });
        }
    };

    let needed = index_region.end;
    if data.len() < needed {
        return Err(DecodeError::TruncatedBuffer {
            needed,
            available: data.len(),
        });
    }

    let extra = data.len() - needed;
    if extra > 0 {
        if !options.allow_trailing_bytes {
            return Err(FormatIssue::TrailingBytes { extra }.into());
        }
        debug!(extra, "ignoring bytes after the index block");
    }

    let truncated = |_| DecodeError::TruncatedBuffer {
        needed,
        available: data.len(),
    };

    let float_count = vertex_region.len() / 4;
    let vertices = parse_vertex_block(&mut &data[vertex_region], float_count).map_err(truncated)?;

    let index_count = header.num_indices as usize;
    let indices = parse_index_block(&mut &data[index_region], index_count).map_err(truncated)?;

    debug!(
        revision = %header.revision,
        vertices = header.num_vertices,
        indices = header.num_indices,
        vertex_size = header.vertex_size,
        "decoded c2g mesh"
    );

    Ok(Mesh {
        header,
        vertices,
        indices,
    })
}
