//! Synthetic checkpoints for benchmarks

use checkpoint::MemoryCheckpoint;
use convert_core::Tensor;

/// Checkpoint shaped like a stack of 3x3 convolution layers
///
/// Each layer has a kernel, a bias and two optimizer slots, plus one
/// out-of-scope record per layer.
pub fn conv_stack(layers: usize, channels: usize) -> MemoryCheckpoint {
    let mut ckpt = MemoryCheckpoint::new();
    for layer in 0..layers {
        let kernel_shape = vec![3, 3, channels, channels];
        let kernel_len: usize = kernel_shape.iter().product();
        let kernel = Tensor::from_f32(kernel_shape.clone(), &vec![0.5; kernel_len])
            .expect("kernel tensor");
        let bias = Tensor::from_f32(vec![channels], &vec![0.1; channels]).expect("bias tensor");

        let scope = format!("Network/conv{}", layer);
        ckpt.insert(format!("{}/w", scope), kernel.clone());
        ckpt.insert(format!("{}/b", scope), bias.clone());
        ckpt.insert(format!("{}/w/Adam", scope), kernel.clone());
        ckpt.insert(format!("{}/w/Adam_1", scope), kernel);
        ckpt.insert(format!("Discriminator/conv{}/b", layer), bias);
    }
    ckpt
}
