pub mod c2g;
pub mod vertex_format;
pub mod writer;
