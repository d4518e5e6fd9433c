//! Export a decoded c2g mesh to glTF binary (GLB).

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::io::Write;

use gltf_json as json;
use json::validation::Checked::Valid;
use json::validation::USize64;
use rootcause::Report;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::c2g::Mesh;
use crate::models::vertex_format::AttributeSemantic;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("mesh has no vertices")]
    EmptyMesh,
    #[error("glTF serialization error: {0}")]
    Serialize(String),
    #[error("I/O error: {0}")]
    Io(String),
}

/// Write `mesh` as a single-primitive GLB named `name`.
///
/// Positions and normals are always exported. Colors become `COLOR_0` when
/// they have 3 or 4 components, and the first two texcoord components become
/// `TEXCOORD_0`. Extra vertex bytes are dropped.
pub fn export_glb(mesh: &Mesh, name: &str, writer: &mut impl Write) -> Result<(), Report<ExportError>> {
    if mesh.vertex_count() == 0 {
        return Err(Report::new(ExportError::EmptyMesh));
    }
    let out_of_range = mesh.out_of_range_indices();
    if out_of_range > 0 {
        warn!(out_of_range, "mesh has indices past the last vertex; exporting anyway");
    }

    let mut root = json::Root::default();
    root.asset = json::Asset {
        version: "2.0".to_string(),
        generator: Some("c2gview".to_string()),
        ..Default::default()
    };

    let mut bin_data: Vec<u8> = Vec::new();
    let primitive = add_mesh_to_root(&mut root, &mut bin_data, mesh, name);

    pad_to_4(&mut bin_data);
    let buffer = root.push(json::Buffer {
        byte_length: USize64::from(bin_data.len()),
        uri: None,
        name: None,
        extensions: Default::default(),
        extras: Default::default(),
    });
    for bv in root.buffer_views.iter_mut() {
        bv.buffer = buffer;
    }

    let gltf_mesh = root.push(json::Mesh {
        primitives: vec![primitive],
        weights: None,
        name: Some(name.to_string()),
        extensions: Default::default(),
        extras: Default::default(),
    });
    let node = root.push(json::Node {
        mesh: Some(gltf_mesh),
        name: Some(name.to_string()),
        ..Default::default()
    });
    let scene = root.push(json::Scene {
        nodes: vec![node],
        name: None,
        extensions: Default::default(),
        extras: Default::default(),
    });
    root.scene = Some(scene);

    let json_string = json::serialize::to_string(&root)
        .map_err(|e| Report::new(ExportError::Serialize(e.to_string())))?;

    debug!(bin_bytes = bin_data.len(), json_bytes = json_string.len(), "writing GLB");

    let glb = gltf::binary::Glb {
        header: gltf::binary::Header {
            magic: *b"glTF",
            version: 2,
            length: 0, // to_writer computes this
        },
        json: Cow::Owned(json_string.into_bytes()),
        bin: Some(Cow::Owned(bin_data)),
    };

    glb.to_writer(writer)
        .map_err(|e| Report::new(ExportError::Io(e.to_string())))?;

    Ok(())
}

fn add_mesh_to_root(
    root: &mut json::Root,
    bin_data: &mut Vec<u8>,
    mesh: &Mesh,
    name: &str,
) -> json::mesh::Primitive {
    let format = mesh.vertex_format();
    let vertex_count = mesh.vertex_count();
    let mut attributes = BTreeMap::new();

    let pos = push_float_accessor(
        root,
        bin_data,
        mesh.positions().flatten(),
        vertex_count,
        json::accessor::Type::Vec3,
        mesh.bounds(),
    );
    attributes.insert(Valid(json::mesh::Semantic::Positions), pos);

    let normals = (0..vertex_count).filter_map(|i| mesh.normal(i)).flatten();
    let norm = push_float_accessor(root, bin_data, normals, vertex_count, json::accessor::Type::Vec3, None);
    attributes.insert(Valid(json::mesh::Semantic::Normals), norm);

    if let Some(color) = format.attribute(AttributeSemantic::Color) {
        let type_ = match color.components {
            3 => Some(json::accessor::Type::Vec3),
            4 => Some(json::accessor::Type::Vec4),
            n => {
                warn!(components = n, "COLOR_0 needs 3 or 4 components; skipping colors");
                None
            }
        };
        if let Some(type_) = type_ {
            let colors = (0..vertex_count)
                .filter_map(|i| mesh.color(i))
                .flatten()
                .copied();
            let acc = push_float_accessor(root, bin_data, colors, vertex_count, type_, None);
            attributes.insert(Valid(json::mesh::Semantic::Colors(0)), acc);
        }
    }

    if let Some(tex) = format.attribute(AttributeSemantic::TexCoord) {
        if tex.components >= 2 {
            let uvs = (0..vertex_count)
                .filter_map(|i| mesh.tex_coord(i))
                .flat_map(|t| t[..2].iter().copied());
            let acc = push_float_accessor(root, bin_data, uvs, vertex_count, json::accessor::Type::Vec2, None);
            attributes.insert(Valid(json::mesh::Semantic::TexCoords(0)), acc);
        } else {
            warn!(components = tex.components, "TEXCOORD_0 needs 2 components; skipping texcoords");
        }
    }

    let indices = if mesh.indices.is_empty() {
        None
    } else {
        Some(push_indices(root, bin_data, &mesh.indices))
    };

    let material = root.push(json::Material {
        name: Some(format!("{name}_material")),
        double_sided: true,
        ..Default::default()
    });

    json::mesh::Primitive {
        attributes,
        indices,
        material: Some(material),
        mode: Valid(json::mesh::Mode::Triangles),
        targets: None,
        extensions: None,
        extras: Default::default(),
    }
}

fn push_view(
    root: &mut json::Root,
    byte_offset: usize,
    byte_length: usize,
    target: json::buffer::Target,
) -> json::Index<json::buffer::View> {
    root.push(json::buffer::View {
        buffer: json::Index::new(0),
        byte_length: USize64::from(byte_length),
        byte_offset: Some(USize64::from(byte_offset)),
        byte_stride: None,
        target: Some(Valid(target)),
        name: None,
        extensions: Default::default(),
        extras: Default::default(),
    })
}

fn push_float_accessor(
    root: &mut json::Root,
    bin_data: &mut Vec<u8>,
    values: impl Iterator<Item = f32>,
    count: usize,
    type_: json::accessor::Type,
    bounds: Option<([f32; 3], [f32; 3])>,
) -> json::Index<json::Accessor> {
    let byte_offset = bin_data.len();
    for v in values {
        bin_data.extend_from_slice(&v.to_le_bytes());
    }
    let byte_length = bin_data.len() - byte_offset;
    pad_to_4(bin_data);

    let bv = push_view(root, byte_offset, byte_length, json::buffer::Target::ArrayBuffer);
    root.push(json::Accessor {
        buffer_view: Some(bv),
        byte_offset: Some(USize64(0)),
        count: USize64::from(count),
        component_type: Valid(json::accessor::GenericComponentType(
            json::accessor::ComponentType::F32,
        )),
        type_: Valid(type_),
        min: bounds.map(|(min, _)| json::Value::from(min.to_vec())),
        max: bounds.map(|(_, max)| json::Value::from(max.to_vec())),
        name: None,
        normalized: false,
        sparse: None,
        extensions: Default::default(),
        extras: Default::default(),
    })
}

fn push_indices(
    root: &mut json::Root,
    bin_data: &mut Vec<u8>,
    indices: &[u16],
) -> json::Index<json::Accessor> {
    let byte_offset = bin_data.len();
    bin_data.extend_from_slice(bytemuck::cast_slice(indices));
    let byte_length = bin_data.len() - byte_offset;
    pad_to_4(bin_data);

    let bv = push_view(root, byte_offset, byte_length, json::buffer::Target::ElementArrayBuffer);
    root.push(json::Accessor {
        buffer_view: Some(bv),
        byte_offset: Some(USize64(0)),
        count: USize64::from(indices.len()),
        component_type: Valid(json::accessor::GenericComponentType(
            json::accessor::ComponentType::U16,
        )),
        type_: Valid(json::accessor::Type::Scalar),
        min: None,
        max: None,
        name: None,
        normalized: false,
        sparse: None,
        extensions: Default::default(),
        extras: Default::default(),
    })
}

fn pad_to_4(data: &mut Vec<u8>) {
    while data.len() % 4 != 0 {
        data.push(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::writer::mesh_from_arrays;

    #[test]
    fn writes_glb() {
        #[rustfmt::skip]
        let vertices = vec![
            0.0, 0.0, 0.0,  0.0, 0.0, 1.0,  1.0, 0.0, 0.0, 1.0,  0.0, 0.0,
            1.0, 0.0, 0.0,  0.0, 0.0, 1.0,  0.0, 1.0, 0.0, 1.0,  1.0, 0.0,
            0.0, 1.0, 0.0,  0.0, 0.0, 1.0,  0.0, 0.0, 1.0, 1.0,  0.0, 1.0,
        ];
        let mesh = mesh_from_arrays(vertices, vec![0, 1, 2], 4, 2).unwrap();

        let mut out = Vec::new();
        export_glb(&mesh, "triangle", &mut out).unwrap();
        assert_eq!(&out[..4], b"glTF");

        let glb = gltf::binary::Glb::from_slice(&out).unwrap();
        let json = std::str::from_utf8(&glb.json).unwrap();
        assert!(json.contains("COLOR_0"));
        assert!(json.contains("TEXCOORD_0"));
        assert!(json.contains(r#""min":[0.0,0.0,0.0]"#));
        assert!(json.contains(r#""max":[1.0,1.0,0.0]"#));
        // 3 * (12 + 12 + 16 + 8) vertex bytes, 6 index bytes padded to 8.
        assert_eq!(glb.bin.map(|b| b.len()), Some(152));
    }

    #[test]
    fn empty_mesh_is_rejected() {
        let mesh = mesh_from_arrays(Vec::new(), Vec::new(), 0, 0).unwrap();
        let mut out = Vec::new();
        assert!(export_glb(&mesh, "empty", &mut out).is_err());
        assert!(out.is_empty());
    }
}
