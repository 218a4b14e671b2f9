pub mod layout;
pub mod loader;
pub mod schema;

pub use layout::DataLayout;
pub use loader::{load_settings, load_settings_from_str, resolve_settings};
pub use schema::{
    ExtractionSettings, PathSettings, QualitySettings, Settings, ValidationSettings,
};
