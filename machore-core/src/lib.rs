pub mod analysis;
pub mod config;
pub mod container;
pub mod cursor;
pub mod dylib;
pub mod error;
pub mod header;
pub mod load_command;
pub mod sections;
pub mod strings;

pub use analysis::*;
pub use config::*;
pub use container::{ContainerKind, FatArchTable, FatSlice};
pub use dylib::{decode_version, DylibDependency, DylibKind, PackedVersion};
pub use error::{Error, Result};
pub use header::{Architecture, FileType, MachHeader};
pub use sections::*;
pub use strings::ExtractedString;
