//! Scene loading: documents to live nodes, and back to text

mod builder;
mod dump;
mod error;
mod suggest;

pub use builder::{build_scene, Scene, SceneBuilder};
pub use dump::dump;
pub use error::BuildError;
