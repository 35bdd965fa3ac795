//! Reading GalaxyEmu achievement files and republishing them for Goldberg.

pub mod reader;
pub mod transform;
pub mod writer;

pub use reader::StableFileReader;
pub use transform::{transform, transform_at, DestinationDocument, EarnedAchievement};
pub use writer::{destination_path, write_destination, ACHIEVEMENTS_FILE};
