//! Host-agnostic rendering plumbing: the renderer a host provides, the
//! context that owns what has been uploaded, per-frame uniforms and an
//! explicitly controlled animation loop.

pub mod backend;
pub mod context;
pub mod scheduler;
pub mod uniforms;

pub use backend::{GpuMesh, RenderError, Renderer, ShaderSources, ShaderStage};
pub use context::{ReloadError, RenderContext};
pub use scheduler::{AnimationLoop, FrameRequest, FrameScheduler, LoopState};
pub use uniforms::{SceneUniforms, Viewport};
