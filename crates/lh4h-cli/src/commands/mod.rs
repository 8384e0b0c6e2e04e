pub mod render;

pub use render::RenderCommand;
