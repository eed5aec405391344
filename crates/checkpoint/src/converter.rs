//! Checkpoint to parameter store conversion

use std::path::Path;

use convert_core::{ConversionRules, ConverterConfig, Result, Shape};
use tracing::{debug, info, instrument};

use crate::reader::CheckpointReader;
use crate::rules::{is_included, is_kernel, rename};
use crate::safetensors_io::SafetensorsCheckpoint;
use crate::store::{ParameterSet, ParameterStore};

/// One parameter written to the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedParam {
    /// Name in the source checkpoint
    pub source_name: String,

    /// Name in the parameter store
    pub name: String,

    /// Shape in the parameter store
    pub shape: Shape,

    /// Whether the kernel axis permutation was applied
    pub transposed: bool,
}

/// Summary of a conversion run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversionReport {
    /// Converted parameters in store insertion order
    pub converted: Vec<ConvertedParam>,

    /// Records rejected by the filter
    pub skipped: usize,

    /// Size of the written artifact
    pub bytes_written: u64,
}

impl ConversionReport {
    /// Number of parameters that were transposed
    pub fn transposed(&self) -> usize {
        self.converted.iter().filter(|p| p.transposed).count()
    }
}

/// Applies conversion rules to checkpoint records
#[derive(Debug, Clone, Default)]
pub struct Converter {
    rules: ConversionRules,
}

impl Converter {
    pub fn new(rules: ConversionRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &ConversionRules {
        &self.rules
    }

    /// Filter, transform and register every eligible record into `store`
    ///
    /// Records are visited in sorted name order, which is also the order in
    /// which entries are declared in the store. Invalid rules fail before the
    /// reader is touched.
    pub fn populate<R, S>(&self, reader: &R, store: &mut S) -> Result<ConversionReport>
    where
        R: CheckpointReader + ?Sized,
        S: ParameterStore + ?Sized,
    {
        self.rules.validate()?;

        let mut names = reader.list_names()?;
        names.sort_by(|a, b| a.0.cmp(&b.0));

        let mut report = ConversionReport::default();

        for (source_name, _) in names {
            if !is_included(&self.rules, &source_name) {
                debug!(name = %source_name, "Skipping record");
                report.skipped += 1;
                continue;
            }

            let mut tensor = reader.get_tensor(&source_name)?;
            let transposed = is_kernel(&self.rules, tensor.shape());
            if transposed {
                tensor = tensor.permute(&self.rules.kernel_axes)?;
            }

            let name = rename(&self.rules.name_map, &source_name);
            let shape = tensor.shape().to_vec();

            store.declare(&name, &shape)?;
            store.set_data(&name, tensor)?;

            debug!(
                source = %source_name,
                name = %name,
                shape = ?shape,
                transposed,
                "Converted record"
            );

            report.converted.push(ConvertedParam {
                source_name,
                name,
                shape,
                transposed,
            });
        }

        Ok(report)
    }

    /// Populate `store` from `reader` and save it to `destination`
    #[instrument(skip_all, fields(source = %reader.location(), destination = %destination.display()))]
    pub fn convert_with<R, S>(
        &self,
        reader: &R,
        store: &mut S,
        destination: &Path,
    ) -> Result<ConversionReport>
    where
        R: CheckpointReader + ?Sized,
        S: ParameterStore + ?Sized,
    {
        let start = std::time::Instant::now();

        let mut report = self.populate(reader, store)?;
        report.bytes_written = store.save(destination)?;

        info!(
            converted = report.converted.len(),
            transposed = report.transposed(),
            skipped = report.skipped,
            size_bytes = report.bytes_written,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Checkpoint conversion complete"
        );

        Ok(report)
    }
}

/// Convert a safetensors checkpoint into a parameter file with default rules
pub fn convert(config: ConverterConfig) -> Result<ConversionReport> {
    let reader = SafetensorsCheckpoint::open(&config.source_path)?;
    let mut store = ParameterSet::new();
    Converter::default().convert_with(&reader, &mut store, &config.destination_path)
}
