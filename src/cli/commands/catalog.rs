//! Catalog command implementation
//!
//! Writes the field catalog in effect (built-in tables plus configured
//! overrides) as TOML, as a starting point for a versioned catalog file.

use crate::config::{parse_config, MappingConfig};
use crate::core::process::load_catalog;
use clap::Args;
use std::path::{Path, PathBuf};

/// Arguments for the catalog command
#[derive(Args, Debug)]
pub struct CatalogArgs {
    /// Write the catalog here instead of standard output
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Ignore the configuration file and write the built-in tables
    #[arg(long)]
    pub builtin: bool,
}

impl CatalogArgs {
    /// Execute the catalog command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let mapping = if !self.builtin && Path::new(config_path).exists() {
            match parse_config(config_path) {
                Ok(config) => config.mapping,
                Err(e) => {
                    eprintln!("Failed to load configuration: {e}");
                    return Ok(2);
                }
            }
        } else {
            MappingConfig::default()
        };

        let catalog = match load_catalog(&mapping) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load field catalog: {e}");
                return Ok(2);
            }
        };
        let toml = catalog.to_toml_string()?;

        match &self.output {
            Some(path) => {
                std::fs::write(path, toml)?;
                eprintln!(
                    "Catalog {} ({} rules) written to {}",
                    catalog.version,
                    catalog.rule_count(),
                    path.display()
                );
            }
            None => print!("{toml}"),
        }
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::FieldCatalog;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_written_catalog_loads_back() {
        let temp = TempDir::new().unwrap();
        let output = temp.path().join("catalog.toml");
        let args = CatalogArgs {
            output: Some(output.clone()),
            builtin: true,
        };

        assert_eq!(args.execute("ltcf.toml").await.unwrap(), 0);

        let loaded = FieldCatalog::from_toml_file(&output).unwrap();
        let standard = FieldCatalog::standard().unwrap();
        assert_eq!(loaded.version, standard.version);
        assert_eq!(loaded.rule_count(), standard.rule_count());
    }
}
