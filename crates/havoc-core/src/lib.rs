pub mod action;
pub mod context;
pub mod error;
pub mod lock;
pub mod providers;
pub mod registry;
pub mod runner;
pub mod selection;

pub use error::{HavocError, Result};
