use std::thread;

use anyhow::Result;
use convert_core::{Error, Tensor};
use distributed::{immediate_dirs, Communicator, CommunicatorWrapper, ComputeContext, LocalGroup};

#[test]
fn test_data_parallel_gradient_average() -> Result<()> {
    let world = 4;
    let handles: Vec<_> = LocalGroup::new(world)?
        .into_iter()
        .map(|comm| {
            thread::spawn(move || -> convert_core::Result<(usize, String, Vec<f32>)> {
                let ctx = ComputeContext::extension("cudnn", "0", "half")?;
                let wrapper =
                    CommunicatorWrapper::new(ctx, |_| Ok(Box::new(comm) as Box<dyn Communicator>))?;

                let rank = wrapper.rank() as f32;
                let mut grads = vec![Tensor::from_f32(vec![2, 2], &[rank, rank, 1.0, 2.0])?];
                wrapper.all_reduce(&mut grads, true)?;

                Ok((
                    wrapper.rank(),
                    wrapper.ctx_float().backends[0].clone(),
                    grads[0].to_f32_vec()?,
                ))
            })
        })
        .collect();

    for handle in handles {
        let (rank, backend, grads) = handle.join().expect("rank thread panicked")?;
        assert!(rank < world);
        assert_eq!(backend, "cudnn:float");
        assert_eq!(grads, vec![1.5, 1.5, 1.0, 2.0]);
    }
    Ok(())
}

#[test]
fn test_single_process_fallback() -> Result<()> {
    let wrapper = CommunicatorWrapper::new(ComputeContext::default(), |_| {
        Err(Error::Communicator {
            message: "no launcher".to_string(),
        })
    })?;
    assert_eq!((wrapper.n_procs(), wrapper.rank()), (1, 0));

    let mut params = vec![Tensor::from_f32(vec![1], &[5.0])?];
    wrapper.all_reduce(&mut params, true)?;
    assert_eq!(params[0].to_f32_vec()?, vec![5.0]);
    Ok(())
}

#[test]
fn test_immediate_dirs_lists_speakers() -> Result<()> {
    let dir = tempfile::tempdir()?;
    for name in ["p225", "p226"] {
        std::fs::create_dir(dir.path().join(name))?;
    }
    std::fs::write(dir.path().join("README"), b"")?;

    assert_eq!(immediate_dirs(dir.path())?, vec!["p225", "p226"]);
    Ok(())
}
