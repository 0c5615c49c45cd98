pub mod change;
pub mod commands;
pub mod common;
pub mod config;
pub mod descriptors;
pub mod error;
pub mod families;
pub mod generator;
pub mod library;
pub mod orphans;
pub mod query;
pub mod session;
pub mod tracker;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use descriptors::PlaylistDescriptor;
pub use error::{ListenError, ListenExpectedError, Result};
pub use library::{Album, AlbumStore, Item, Library, Record};
pub use session::ListenSession;

#[cfg(test)]
mod change_test;
#[cfg(test)]
mod orphans_test;
#[cfg(test)]
mod tracker_test;
