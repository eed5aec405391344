//! Shared fixtures for the integration tests

use std::path::{Path, PathBuf};

use checkpoint::safetensors_io::encode_safetensors;
use convert_core::{Shape, Tensor};

/// Tensor whose elements are `0, 1, 2, ...` in row-major order
pub fn iota(shape: Shape) -> Tensor {
    let n: usize = shape.iter().product();
    let values: Vec<f32> = (0..n).map(|i| i as f32).collect();
    Tensor::from_f32(shape, &values).expect("iota tensor")
}

/// Records of the reference conversion scenario
pub fn scenario_records() -> Vec<(String, Tensor)> {
    vec![
        ("NetworkA/conv1/w".to_string(), iota(vec![3, 3, 16, 32])),
        ("NetworkA/conv1/b".to_string(), iota(vec![32])),
        ("NetworkA/conv1/w/Adam".to_string(), iota(vec![3, 3, 16, 32])),
        ("OtherScope/x".to_string(), iota(vec![4, 4])),
    ]
}

/// Write records as a safetensors checkpoint under `dir`
pub fn write_checkpoint(dir: &Path, file_name: &str, records: &[(String, Tensor)]) -> PathBuf {
    let path = dir.join(file_name);
    let bytes = encode_safetensors(records.iter().map(|(n, t)| (n.as_str(), t)))
        .expect("encode checkpoint");
    std::fs::write(&path, bytes).expect("write checkpoint");
    path
}

/// Install a test subscriber once; later calls are ignored
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("checkpoint=debug")
        .try_init();
}
