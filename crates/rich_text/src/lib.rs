mod config;
mod decorate;
mod editor;
mod element;
mod error;
mod host;
mod hotkeys;
mod ime;
mod input;
mod remote;
mod scheduler;
mod selection;
mod state;
mod view;

pub use config::*;
pub use decorate::*;
pub use editor::*;
pub use element::*;
pub use error::*;
pub use host::*;
pub use hotkeys::*;
pub use ime::*;
pub use input::*;
pub use remote::*;
pub use scheduler::*;
pub use selection::*;
pub use state::*;
pub use view::*;
