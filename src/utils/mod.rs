pub mod settings;

pub use settings::{GenSettings, PoolBackend, load_settings, save_settings};
