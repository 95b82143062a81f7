use std::fs::File;

use failure::{Fallible, ResultExt};
use stackdep::wrapper::{Config, TomlRead};

/// Read a configuration file and make its paths relative to it.
pub fn read_config(filename: &str) -> Fallible<Config> {
    let config_file = File::open(filename)
        .with_context(|e| format!("Cannot open configuration file '{}': {}", filename, e))?;
    let mut config = Config::from_toml_read(config_file)?;
    config.relativize_paths(filename)?;
    Ok(config)
}
