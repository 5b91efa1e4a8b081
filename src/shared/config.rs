//! Application configuration. Storage location, demo toggles.

use serde::Deserialize;

#[derive(Debug, Deserialize, Default)]
pub struct AppConfig {
    /// Directory for the SQLite database. Unset = in-memory stores
    /// (nothing survives a restart). Read from FAIRSHARE_DATA_DIR.
    #[serde(default)]
    pub data_dir: Option<String>,

    /// Skip the demo scenario in main (wiring only). Read from
    /// FAIRSHARE_SKIP_DEMO.
    #[serde(default)]
    pub skip_demo: Option<bool>,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenv::dotenv().ok();
        let mut c = config::Config::builder();
        c = c.add_source(config::Environment::with_prefix("FAIRSHARE"));
        if let Ok(path) = std::env::var("FAIRSHARE_CONFIG") {
            c = c.add_source(config::File::with_name(&path));
        }
        let mut cfg: Self = c.build()?.try_deserialize()?;
        // Booleans arrive as strings from the environment source; parse by hand.
        if let Ok(s) = std::env::var("FAIRSHARE_SKIP_DEMO") {
            if let Ok(b) = s.parse::<bool>() {
                cfg.skip_demo = Some(b);
            }
        }
        Ok(cfg)
    }

    /// Returns true when the demo scenario should run (default).
    pub fn run_demo(&self) -> bool {
        !self.skip_demo.unwrap_or(false)
    }
}
