//! Configuration loaders covering the bootstrap failure paths.

use std::ffi::OsString;
use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use switchyard_config::Config;

use crate::bootstrap::ConfigLoader;

/// Loader that fails by passing an unparseable CLI value.
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let args = vec![
            OsString::from("switchyard"),
            OsString::from("--dedup-window-ms"),
            OsString::from("soon"),
        ];
        Config::load_from_iter(args)
    }
}

/// Loader that succeeds with a configuration the bridge cannot run with.
pub struct InvalidConfigLoader;

impl ConfigLoader for InvalidConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(Config {
            dedup_capacity: 0,
            ..Config::default()
        })
    }
}
