mod nut_type;
mod role;
mod version;

pub use nut_type::NutType;
pub use role::EngineRole;
pub use version::VersionNumber;
