mod change;
mod config;
mod core;
mod error;
mod keys;
mod node;
mod ops;
pub mod path;
mod plugin;
mod point;
mod queries;
mod serde_value;
pub mod text;
mod transforms;

pub use crate::change::*;
pub use crate::config::*;
pub use crate::core::*;
pub use crate::error::*;
pub use crate::keys::*;
pub use crate::node::*;
pub use crate::ops::*;
pub use crate::path::{Affinity, Path};
pub use crate::plugin::*;
pub use crate::point::*;
pub use crate::serde_value::*;
pub use crate::transforms::*;
