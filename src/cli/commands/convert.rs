//! Convert command implementation
//!
//! Transforms a single flat file and writes the XML bundle, without
//! submitting it or moving the source file.

use crate::adapters::flatfile;
use crate::config::{parse_config, MappingConfig};
use crate::core::bundle::AssemblyOptions;
use crate::core::process::{load_catalog, render};
use crate::domain::{AdminMetadata, IdSource, RandomIdSource, SequentialIdSource};
use clap::Args;
use std::path::{Path, PathBuf};

/// Arguments for the convert command
#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Flat file to convert
    pub file: PathBuf,

    /// Write the XML here instead of standard output
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Use deterministic identifiers (00000000-0000-0000-0000-000000000001, ...)
    #[arg(long)]
    pub sequential_ids: bool,
}

impl ConvertArgs {
    /// Execute the convert command
    ///
    /// The mapping section of the configuration is used when the file
    /// exists; otherwise the built-in defaults apply.
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let mapping = if Path::new(config_path).exists() {
            match parse_config(config_path) {
                Ok(config) => config.mapping,
                Err(e) => {
                    eprintln!("Failed to load configuration: {e}");
                    return Ok(2);
                }
            }
        } else {
            tracing::debug!(config_path = %config_path, "No configuration file; using default mapping");
            MappingConfig::default()
        };

        let catalog = match load_catalog(&mapping) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load field catalog: {e}");
                return Ok(2);
            }
        };
        let options = AssemblyOptions {
            sentinel_policy: mapping.sentinel_policy,
            strict_update_ids: mapping.strict_update_ids,
        };

        let mut random = RandomIdSource;
        let mut sequential = SequentialIdSource::default();
        let ids: &mut dyn IdSource = if self.sequential_ids {
            &mut sequential
        } else {
            &mut random
        };

        let rendered = match flatfile::parse_file(&self.file)
            .await
            .and_then(|record| {
                let admin = AdminMetadata::from_record(&record)?;
                render(&catalog, options, &record, &admin, ids)
            }) {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(file = %self.file.display(), error = %e, "Conversion failed");
                eprintln!("Conversion failed: {e}");
                return Ok(1);
            }
        };

        match &self.output {
            Some(path) => {
                std::fs::write(path, &rendered.xml)?;
                eprintln!("Bundle written to {}", path.display());
            }
            None => println!("{}", rendered.xml),
        }

        for identity in rendered.assembled.identities.iter() {
            eprintln!(
                "  {} {} {}{}",
                identity.resource,
                identity.operation,
                identity.reference,
                if identity.included { "" } else { " (not included)" }
            );
        }
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_convert_writes_xml() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("a.txt");
        std::fs::write(&input, "[PATIENT]\nA3=1950-01-01\n[SECTION C]\nC1=1\n").unwrap();
        let output = temp.path().join("a.xml");

        let args = ConvertArgs {
            file: input.clone(),
            output: Some(output.clone()),
            sequential_ids: true,
        };
        let missing_config = temp.path().join("ltcf.toml");
        let code = args.execute(missing_config.to_str().unwrap()).await.unwrap();

        assert_eq!(code, 0);
        let xml = std::fs::read_to_string(&output).unwrap();
        assert!(xml.contains("<Bundle xmlns=\"http://hl7.org/fhir\">"));
        assert!(input.exists());
    }

    #[tokio::test]
    async fn test_convert_reports_parse_failure() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("bad.txt");
        std::fs::write(&input, "no header\n").unwrap();

        let args = ConvertArgs {
            file: input,
            output: None,
            sequential_ids: false,
        };
        let missing_config = temp.path().join("ltcf.toml");
        let code = args.execute(missing_config.to_str().unwrap()).await.unwrap();
        assert_eq!(code, 1);
    }
}
