//! Render state owned by the caller.
//!
//! [`RenderContext`] holds the renderer and whatever was last loaded into it.
//! Nothing is global: draw code gets the context passed in.

use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::c2g::{self, DecodeError, DecodeOptions};
use crate::render::backend::{GpuMesh, RenderError, Renderer, ShaderSources};
use crate::render::uniforms::{SceneUniforms, Viewport};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReloadError {
    #[error("failed to build shader program: {0}")]
    Program(#[source] RenderError),
    #[error("failed to decode mesh: {0}")]
    Mesh(#[from] DecodeError),
    #[error("failed to upload mesh: {0}")]
    Upload(#[source] RenderError),
}

struct LoadedScene<R: Renderer> {
    program: R::Program,
    mesh: GpuMesh<R::VertexBuffer, R::IndexBuffer>,
}

pub struct RenderContext<R: Renderer> {
    renderer: R,
    viewport: Viewport,
    decode_options: DecodeOptions,
    started: Instant,
    scene: Option<LoadedScene<R>>,
}

impl<R: Renderer> RenderContext<R> {
    pub fn new(renderer: R, viewport: Viewport) -> Self {
        Self {
            renderer,
            viewport,
            decode_options: DecodeOptions::default(),
            started: Instant::now(),
            scene: None,
        }
    }

    pub fn with_decode_options(mut self, options: DecodeOptions) -> Self {
        self.decode_options = options;
        self
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn is_loaded(&self) -> bool {
        self.scene.is_some()
    }

    /// Index count of the mesh currently on the GPU.
    pub fn loaded_index_count(&self) -> Option<u32> {
        self.scene.as_ref().map(|s| s.mesh.index_count)
    }

    /// Build a program from `shaders`, decode `mesh_bytes` and upload it.
    ///
    /// The previous program and mesh stay in place unless every step
    /// succeeds. The mesh is decoded before the renderer is touched, and
    /// anything created by a failed reload is released again. On success
    /// the replaced program and buffers are released.
    pub fn reload(&mut self, shaders: &ShaderSources, mesh_bytes: &[u8]) -> Result<(), ReloadError> {
        let result = self.build_scene(shaders, mesh_bytes);
        match result {
            Ok(scene) => {
                info!(
                    indices = scene.mesh.index_count,
                    stride = scene.mesh.format.stride,
                    "reloaded scene"
                );
                if let Some(old) = self.scene.replace(scene) {
                    self.release(old);
                }
                Ok(())
            }
            Err(e) => {
                warn!("reload failed, keeping previous scene: {e}");
                Err(e)
            }
        }
    }

    fn build_scene(
        &mut self,
        shaders: &ShaderSources,
        mesh_bytes: &[u8],
    ) -> Result<LoadedScene<R>, ReloadError> {
        shaders.validate().map_err(ReloadError::Program)?;

        let mesh = c2g::decode_with(mesh_bytes, &self.decode_options)?;
        let format = mesh.vertex_format();
        debug!(
            vertices = mesh.vertex_count(),
            triangles = mesh.triangle_count(),
            "uploading mesh"
        );

        let program = self
            .renderer
            .link_program(shaders)
            .map_err(ReloadError::Program)?;

        let vertices = match self.renderer.upload_vertices(&mesh.vertices, &format) {
            Ok(vertices) => vertices,
            Err(e) => {
                self.renderer.delete_program(program);
                return Err(ReloadError::Upload(e));
            }
        };
        let indices = match self.renderer.upload_indices(&mesh.indices) {
            Ok(indices) => indices,
            Err(e) => {
                self.renderer.delete_vertex_buffer(vertices);
                self.renderer.delete_program(program);
                return Err(ReloadError::Upload(e));
            }
        };

        Ok(LoadedScene {
            program,
            mesh: GpuMesh {
                vertices,
                indices,
                format,
                index_count: mesh.header.num_indices,
            },
        })
    }

    fn release(&mut self, scene: LoadedScene<R>) {
        self.renderer.delete_index_buffer(scene.mesh.indices);
        self.renderer.delete_vertex_buffer(scene.mesh.vertices);
        self.renderer.delete_program(scene.program);
    }

    /// Time since the context was created.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Draw the loaded scene. Does nothing before the first successful
    /// reload.
    pub fn render_frame(&mut self) -> Result<(), RenderError> {
        self.render_frame_at(self.elapsed())
    }

    /// Draw the loaded scene as of `elapsed` since start.
    pub fn render_frame_at(&mut self, elapsed: Duration) -> Result<(), RenderError> {
        let Some(scene) = &self.scene else {
            return Ok(());
        };
        let uniforms = SceneUniforms::new(self.viewport, elapsed.as_secs_f32());
        self.renderer.draw(&scene.program, &scene.mesh, &uniforms)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::vertex_format::{AttributeSemantic, VertexFormat};
    use crate::models::writer::{encode, mesh_from_arrays};

    /// Records what it was asked to do.
    #[derive(Default)]
    pub(crate) struct RecordingRenderer {
        pub programs_linked: usize,
        pub vertex_uploads: Vec<(usize, usize)>,
        pub index_uploads: Vec<usize>,
        pub draws: Vec<(u32, u32, f32)>,
        pub deleted_programs: Vec<u32>,
        pub deleted_vertex_buffers: Vec<u32>,
        pub deleted_index_buffers: Vec<u32>,
        pub fail_link: bool,
        pub fail_index_upload: bool,
        pub fail_draw: bool,
    }

    impl RecordingRenderer {
        /// Programs linked and not deleted.
        pub fn live_programs(&self) -> usize {
            self.programs_linked - self.deleted_programs.len()
        }
    }

    impl Renderer for RecordingRenderer {
        type Program = u32;
        type VertexBuffer = u32;
        type IndexBuffer = u32;

        fn link_program(&mut self, _sources: &ShaderSources) -> Result<u32, RenderError> {
            if self.fail_link {
                return Err(RenderError::Link("missing main".to_string()));
            }
            self.programs_linked += 1;
            Ok(self.programs_linked as u32)
        }

        fn upload_vertices(
            &mut self,
            vertices: &[f32],
            format: &VertexFormat,
        ) -> Result<u32, RenderError> {
            self.vertex_uploads.push((vertices.len(), format.stride));
            Ok(self.vertex_uploads.len() as u32)
        }

        fn upload_indices(&mut self, indices: &[u16]) -> Result<u32, RenderError> {
            if self.fail_index_upload {
                return Err(RenderError::Upload("out of memory".to_string()));
            }
            self.index_uploads.push(indices.len());
            Ok(self.index_uploads.len() as u32)
        }

        fn delete_program(&mut self, program: u32) {
            self.deleted_programs.push(program);
        }

        fn delete_vertex_buffer(&mut self, buffer: u32) {
            self.deleted_vertex_buffers.push(buffer);
        }

        fn delete_index_buffer(&mut self, buffer: u32) {
            self.deleted_index_buffers.push(buffer);
        }

        fn draw(
            &mut self,
            program: &u32,
            mesh: &GpuMesh<u32, u32>,
            uniforms: &SceneUniforms,
        ) -> Result<(), RenderError> {
            if self.fail_draw {
                return Err(RenderError::Draw("context lost".to_string()));
            }
            assert!(mesh.format.has(AttributeSemantic::Position));
            self.draws.push((*program, mesh.index_count, uniforms.time));
            Ok(())
        }
    }

    pub(crate) fn shaders() -> ShaderSources {
        ShaderSources::new("attribute vec3 aVertexPosition;", "void main() {}")
    }

    pub(crate) fn triangle_bytes() -> Vec<u8> {
        let mesh = mesh_from_arrays(vec![0.25; 18], vec![0, 1, 2], 0, 0).unwrap();
        encode(&mesh).unwrap()
    }

    #[test]
    fn reload_uploads_and_draws() {
        let mut ctx = RenderContext::new(RecordingRenderer::default(), Viewport::new(640, 480));
        ctx.render_frame().unwrap();
        assert!(ctx.renderer().draws.is_empty());

        ctx.reload(&shaders(), &triangle_bytes()).unwrap();
        assert!(ctx.is_loaded());
        assert_eq!(ctx.renderer().vertex_uploads, vec![(18, 24)]);
        assert_eq!(ctx.renderer().index_uploads, vec![3]);

        ctx.render_frame_at(Duration::from_millis(500)).unwrap();
        assert_eq!(ctx.renderer().draws, vec![(1, 3, 0.5)]);
    }

    #[test]
    fn failed_reload_keeps_previous_scene() {
        let mut ctx = RenderContext::new(RecordingRenderer::default(), Viewport::new(1, 1));
        ctx.reload(&shaders(), &triangle_bytes()).unwrap();

        let mut truncated = triangle_bytes();
        truncated.pop();
        let err = ctx.reload(&shaders(), &truncated).unwrap_err();
        assert!(matches!(
            err,
            ReloadError::Mesh(DecodeError::TruncatedBuffer { .. })
        ));
        // A bad mesh never reaches the renderer.
        assert_eq!(ctx.renderer().programs_linked, 1);
        assert_eq!(ctx.renderer().vertex_uploads.len(), 1);

        ctx.renderer_mut().fail_link = true;
        let err = ctx.reload(&shaders(), &triangle_bytes()).unwrap_err();
        assert!(matches!(err, ReloadError::Program(RenderError::Link(_))));

        let err = ctx
            .reload(&ShaderSources::new("", "x"), &triangle_bytes())
            .unwrap_err();
        assert!(matches!(err, ReloadError::Program(RenderError::EmptySource(_))));

        // Still drawing with the first program and mesh.
        ctx.render_frame_at(Duration::ZERO).unwrap();
        assert_eq!(ctx.renderer().draws, vec![(1, 3, 0.0)]);
        assert_eq!(ctx.loaded_index_count(), Some(3));
        assert!(ctx.renderer().deleted_programs.is_empty());
    }

    #[test]
    fn failed_upload_releases_what_it_created() {
        let mut ctx = RenderContext::new(RecordingRenderer::default(), Viewport::new(1, 1));
        ctx.reload(&shaders(), &triangle_bytes()).unwrap();

        ctx.renderer_mut().fail_index_upload = true;
        let err = ctx.reload(&shaders(), &triangle_bytes()).unwrap_err();
        assert!(matches!(err, ReloadError::Upload(RenderError::Upload(_))));

        let renderer = ctx.renderer();
        assert_eq!(renderer.programs_linked, 2);
        assert_eq!(renderer.deleted_programs, vec![2]);
        assert_eq!(renderer.deleted_vertex_buffers, vec![2]);
        assert!(renderer.deleted_index_buffers.is_empty());
        assert_eq!(renderer.live_programs(), 1);

        ctx.render_frame_at(Duration::ZERO).unwrap();
        assert_eq!(ctx.renderer().draws, vec![(1, 3, 0.0)]);
    }

    #[test]
    fn successful_reload_releases_previous_scene() {
        let mut ctx = RenderContext::new(RecordingRenderer::default(), Viewport::new(1, 1));
        ctx.reload(&shaders(), &triangle_bytes()).unwrap();
        ctx.reload(&shaders(), &triangle_bytes()).unwrap();

        let renderer = ctx.renderer();
        assert_eq!(renderer.deleted_programs, vec![1]);
        assert_eq!(renderer.deleted_vertex_buffers, vec![1]);
        assert_eq!(renderer.deleted_index_buffers, vec![1]);
        assert_eq!(renderer.live_programs(), 1);

        ctx.render_frame_at(Duration::ZERO).unwrap();
        assert_eq!(ctx.renderer().draws, vec![(2, 3, 0.0)]);
    }

    #[test]
    fn decode_options_apply() {
        let mut bytes = triangle_bytes();
        bytes.push(0);
        let strict = DecodeOptions::builder().allow_trailing_bytes(false).build();
        let mut ctx = RenderContext::new(RecordingRenderer::default(), Viewport::new(1, 1))
            .with_decode_options(strict);
        assert!(ctx.reload(&shaders(), &bytes).is_err());
        assert!(!ctx.is_loaded());
        assert_eq!(ctx.renderer().programs_linked, 0);
    }
}
