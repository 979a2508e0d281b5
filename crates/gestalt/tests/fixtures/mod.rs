use gestalt::prelude::*;

#[derive(DecodeConfig, Clone, Debug, PartialEq)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub timeout: Option<u64>,
}

#[derive(DecodeConfig, Clone, Debug, PartialEq)]
pub struct PoolConfig {
    #[config(rename = "maxTotal")]
    pub max_total: u32,
    #[config(default = 3)]
    pub retries: u32,
    #[config(default)]
    pub label: String,
}

#[derive(DecodeConfig, Clone, Debug, PartialEq, Eq)]
pub enum Mode {
    Primary,
    Replica,
    #[config(rename = "stand-by")]
    Standby,
}

/// Builds a loaded instance backed by a single in-memory source.
#[must_use]
pub fn setup_gestalt(pairs: &[(&str, &str)]) -> Gestalt {
    let gestalt = GestaltBuilder::new()
        .add_source(MapSource::new("test", pairs.iter().copied()))
        .build()
        .expect("builder should produce an instance");
    gestalt.load_configs().expect("initial load should succeed");
    gestalt
}
