pub mod config;
pub mod display;
pub mod error;
pub mod index;
pub mod manifest;
pub mod record;
pub mod symbol_resolver;

pub use config::{ArchiveConfig, load_config};
pub use error::{ArchiveError, Result};
pub use index::{ArchiveIndex, ArchiveReader};
pub use manifest::{ArchiveLayout, DayKey, ManifestEntry, build_file_path, parse_entry};
pub use record::{Record, TimestampZone};
pub use symbol_resolver::{CollisionPolicy, Pair, SymbolResolver};
