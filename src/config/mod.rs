pub mod engine;

pub use engine::{default_config_path, load as load_engine_config, EngineConfig};
