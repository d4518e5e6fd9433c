#[cfg(feature = "models")]
pub mod gltf_export;
