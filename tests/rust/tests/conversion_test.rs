use anyhow::Result;
use checkpoint::{
    convert, read_param_file, CheckpointReader, Converter, ParameterSet, SafetensorsCheckpoint,
};
use convert_core::{ConverterConfig, DType, Error, Tensor};
use integration_tests::{init_tracing, iota, scenario_records, write_checkpoint};

#[test]
fn test_end_to_end_scenario() -> Result<()> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let source = write_checkpoint(dir.path(), "jsigan.safetensors", &scenario_records());
    let destination = dir.path().join("jsigan_x4.h5");

    let report = convert(ConverterConfig::new(&source, &destination))?;
    assert_eq!(report.converted.len(), 2);
    assert_eq!(report.skipped, 2);
    assert_eq!(report.bytes_written, std::fs::metadata(&destination)?.len());

    let stored = read_param_file(&destination)?;
    let summary: Vec<(&str, &[usize])> = stored
        .iter()
        .map(|(name, t)| (name.as_str(), t.shape()))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("NetworkA/conv1/conv/b", &[32][..]),
            ("NetworkA/conv1/conv/W", &[32, 3, 3, 16][..]),
        ]
    );
    Ok(())
}

#[test]
fn test_kernel_transpose_values() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let (h, w, cin, cout) = (3, 2, 4, 5);
    let kernel = iota(vec![h, w, cin, cout]);
    let records = vec![("Network/conv/w".to_string(), kernel.clone())];
    let source = write_checkpoint(dir.path(), "kernel.safetensors", &records);
    let destination = dir.path().join("kernel.h5");

    convert(ConverterConfig::new(&source, &destination))?;
    let stored = read_param_file(&destination)?;
    let (name, converted) = &stored[0];
    assert_eq!(name, "Network/conv/conv/W");
    assert_eq!(converted.shape(), &[cout, h, w, cin]);

    let src = kernel.to_f32_vec()?;
    let dst = converted.to_f32_vec()?;
    for o in 0..cout {
        for y in 0..h {
            for x in 0..w {
                for i in 0..cin {
                    assert_eq!(
                        dst[((o * h + y) * w + x) * cin + i],
                        src[((y * w + x) * cin + i) * cout + o]
                    );
                }
            }
        }
    }
    Ok(())
}

#[test]
fn test_non_kernel_tensors_pass_through() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let half = Tensor::new(DType::F16, vec![2, 3], vec![7u8; 12])?;
    let records = vec![
        ("Network/bn/gamma".to_string(), iota(vec![8])),
        ("Network/dense/w".to_string(), iota(vec![3, 5])),
        ("Network/embed/table".to_string(), iota(vec![2, 2, 2])),
        ("Network/half".to_string(), half.clone()),
    ];
    let source = write_checkpoint(dir.path(), "mixed.safetensors", &records);
    let destination = dir.path().join("mixed.h5");

    convert(ConverterConfig::new(&source, &destination))?;
    let stored = read_param_file(&destination)?;

    let lookup = |name: &str| stored.iter().find(|(n, _)| n == name).map(|(_, t)| t.clone());
    assert_eq!(lookup("Network/bn/gamma"), Some(records[0].1.clone()));
    assert_eq!(lookup("Network/dense/conv/W"), Some(records[1].1.clone()));
    assert_eq!(lookup("Network/embed/table"), Some(records[2].1.clone()));
    assert_eq!(lookup("Network/half"), Some(half));
    Ok(())
}

#[test]
fn test_conversion_is_idempotent() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let source = write_checkpoint(dir.path(), "model.safetensors", &scenario_records());
    let destination = dir.path().join("out.h5");

    convert(ConverterConfig::new(&source, &destination))?;
    let first = std::fs::read(&destination)?;
    convert(ConverterConfig::new(&source, &destination))?;
    let second = std::fs::read(&destination)?;

    assert_eq!(first, second);
    Ok(())
}

#[test]
fn test_safetensors_destination() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let source = write_checkpoint(dir.path(), "model.safetensors", &scenario_records());
    let destination = dir.path().join("converted.safetensors");

    convert(ConverterConfig::new(&source, &destination))?;

    let converted = SafetensorsCheckpoint::open(&destination)?;
    let names = converted.list_names()?;
    assert_eq!(
        names,
        vec![
            ("NetworkA/conv1/conv/W".to_string(), vec![32, 3, 3, 16]),
            ("NetworkA/conv1/conv/b".to_string(), vec![32]),
        ]
    );
    Ok(())
}

#[test]
fn test_missing_source_is_unreadable() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let destination = dir.path().join("out.h5");

    let result = convert(ConverterConfig::new(dir.path().join("missing"), &destination));
    assert!(matches!(result, Err(Error::SourceUnreadable { .. })));
    assert!(!destination.exists());
    Ok(())
}

#[test]
fn test_unwritable_destination_fails_cleanly() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let source = write_checkpoint(dir.path(), "model.safetensors", &scenario_records());
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"")?;

    let result = convert(ConverterConfig::new(&source, blocker.join("out.h5")));
    let err = result.unwrap_err();
    assert!(err.is_destination_error(), "unexpected error: {err}");
    Ok(())
}

#[test]
fn test_existing_destination_overwritten() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let source = write_checkpoint(dir.path(), "model.safetensors", &scenario_records());
    let destination = dir.path().join("out.h5");
    std::fs::write(&destination, b"stale contents")?;

    convert(ConverterConfig::new(&source, &destination))?;
    assert_eq!(read_param_file(&destination)?.len(), 2);
    Ok(())
}

#[test]
fn test_populate_without_saving() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let source = write_checkpoint(dir.path(), "model.safetensors", &scenario_records());
    let reader = SafetensorsCheckpoint::open(&source)?;

    let mut store = ParameterSet::new();
    let report = Converter::default().populate(&reader, &mut store)?;
    assert_eq!(report.bytes_written, 0);
    assert_eq!(store.len(), 2);
    Ok(())
}
