//! Standard paths used by Memguard tools

use std::path::PathBuf;

/// Standard Memguard paths
pub struct Paths {
    /// Data directory (~/.local/share/memguard)
    pub data: PathBuf,
    /// Config directory (~/.config/memguard)
    pub config: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}

impl Paths {
    pub fn new() -> Self {
        let data = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("memguard");

        let config = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("memguard");

        Self { data, config }
    }

    /// Get config file path for a tool
    pub fn config_file(&self, tool: &str) -> PathBuf {
        self.config.join(format!("{}.yaml", tool))
    }
}
