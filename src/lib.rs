#[cfg(feature = "cli")]
pub mod cli;
pub mod compile;
pub mod config;
pub mod dot;
pub mod error;
pub mod extract;
pub mod geometry;
pub mod ir;
pub mod layout_dump;
pub mod model;
pub mod parser;
pub mod pipeline;
pub mod preprocess;
pub mod solver;

#[cfg(feature = "cli")]
pub use cli::run;
pub use compile::{CompileOptions, Hyperparameters, compile, has_path};
pub use config::{Config, load_config};
pub use error::{Error, Result};
pub use geometry::{Boundary, Obstacle, Opening};
pub use ir::{AlignEdge, Band, Edge, EdgeType, Orientation, SceneGraph, Vertex};
pub use parser::{Scene, load_scene, parse_scene};
pub use pipeline::{SolveReport, solve_scene};
pub use preprocess::{normalize, split2, split4};
pub use solver::{GoodLpEngine, SolveStatus, SolverEngine};
