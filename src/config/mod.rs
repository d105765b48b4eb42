//! Desired-state configuration: typed model, restriction rules, and the
//! layered YAML loader.

pub mod model;
pub mod parser;
pub mod restrictions;

pub use self::model::{Channel, ChannelTemplate, Config, Usergroup};
pub use self::parser::Parser;
pub use self::restrictions::Restriction;
