//! Checkpoint weight converter entry point
//!
//! Converts a pretrained checkpoint into a parameter file and lists the
//! stored parameters on stdout.

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use checkpoint::{convert, ConversionReport};
use convert_core::config::{ConverterConfig, DEFAULT_DESTINATION_PATH, DEFAULT_SOURCE_PATH};

#[derive(Parser, Debug)]
#[command(name = "convert-weights")]
#[command(version, about = "Convert pretrained checkpoint weights to a parameter file", long_about = None)]
struct Cli {
    /// Path to the pretrained checkpoint
    #[arg(long, default_value = DEFAULT_SOURCE_PATH)]
    pre_trained_model: PathBuf,

    /// Path of the parameter file to write
    #[arg(long, default_value = DEFAULT_DESTINATION_PATH)]
    save_path: PathBuf,
}

impl From<Cli> for ConverterConfig {
    fn from(cli: Cli) -> Self {
        ConverterConfig::new(cli.pre_trained_model, cli.save_path)
    }
}

/// Write the stored parameter listing followed by the completion line
fn write_listing<W: Write>(report: &ConversionReport, out: &mut W) -> io::Result<()> {
    for param in &report.converted {
        writeln!(out, "{} {:?}", param.name, param.shape)?;
    }
    writeln!(out, "\nWeight conversion complete.")
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "convert_cli=info,checkpoint=info,distributed=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = ConverterConfig::from(Cli::parse());
    tracing::info!(
        source = %config.source_path.display(),
        destination = %config.destination_path.display(),
        "Starting weight conversion"
    );

    let source = config.source_path.display().to_string();
    let report = convert(config).with_context(|| format!("converting {}", source))?;

    let stdout = io::stdout();
    write_listing(&report, &mut stdout.lock()).context("writing parameter listing")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_flags() {
        let cli = Cli::try_parse_from(["convert-weights"]).unwrap();
        let config = ConverterConfig::from(cli);
        assert_eq!(config, ConverterConfig::default());
    }

    #[test]
    fn test_explicit_flags() {
        let cli = Cli::try_parse_from([
            "convert-weights",
            "--pre-trained-model",
            "model.safetensors",
            "--save-path",
            "out/jsigan.h5",
        ])
        .unwrap();
        assert_eq!(cli.pre_trained_model, PathBuf::from("model.safetensors"));
        assert_eq!(cli.save_path, PathBuf::from("out/jsigan.h5"));
    }

    #[test]
    fn test_listing_output() {
        let param = |name: &str, shape: Vec<usize>, transposed| checkpoint::ConvertedParam {
            source_name: String::new(),
            name: name.to_string(),
            shape,
            transposed,
        };
        let report = ConversionReport {
            converted: vec![
                param("NetworkA/conv1/conv/b", vec![32], false),
                param("NetworkA/conv1/conv/W", vec![32, 3, 3, 16], true),
            ],
            skipped: 2,
            bytes_written: 0,
        };

        let mut out = Vec::new();
        write_listing(&report, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "NetworkA/conv1/conv/b [32]\n\
             NetworkA/conv1/conv/W [32, 3, 3, 16]\n\
             \n\
             Weight conversion complete.\n"
        );
    }

    #[test]
    fn test_listing_empty_report() {
        let mut out = Vec::new();
        write_listing(&ConversionReport::default(), &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "\nWeight conversion complete.\n");
    }

    #[test]
    fn test_unknown_flag_rejected() {
        assert!(Cli::try_parse_from(["convert-weights", "--workers", "4"]).is_err());
    }
}
