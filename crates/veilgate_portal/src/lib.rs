pub mod backend;
pub mod clipping;
pub mod error;
pub mod executor;
pub mod frame;
pub mod placement;
pub mod pool;
pub mod portal;
pub mod registry;
pub mod renderer;
pub mod resolver;
pub mod settings;
pub mod surface;
pub mod transporter;
