//! Single-process / multi-process communicator wrapper

use convert_core::{Result, Tensor};
use tracing::{info, warn};

use crate::communicator::Communicator;
use crate::context::ComputeContext;

/// Uniform view over single-process and data-parallel execution
///
/// When no communicator can be created the wrapper runs as a single process
/// with rank 0 and every collective becomes a no-op.
pub struct CommunicatorWrapper {
    n_procs: usize,
    rank: usize,
    ctx: ComputeContext,
    ctx_float: ComputeContext,
    comm: Option<Box<dyn Communicator>>,
}

impl CommunicatorWrapper {
    /// Try to create a communicator, falling back to a single process
    pub fn new<F>(ctx: ComputeContext, factory: F) -> Result<Self>
    where
        F: FnOnce(&ComputeContext) -> Result<Box<dyn Communicator>>,
    {
        match factory(&ctx) {
            Ok(comm) => {
                let n_procs = comm.size();
                let rank = comm.rank();
                let mut ctx = ctx;
                ctx.device_id = rank.to_string();
                let ctx_float = ctx.float_context()?;

                info!(rank, n_procs, device_id = %ctx.device_id, "Communicator initialized");

                Ok(Self {
                    n_procs,
                    rank,
                    ctx,
                    ctx_float,
                    comm: Some(comm),
                })
            }
            Err(e) => {
                warn!(error = %e, "No communicator found");
                warn!(
                    "Running with a single process. If you run this with multiple \
                     processes, all processes will perform exactly the same work."
                );
                Self::single_process(ctx)
            }
        }
    }

    /// Wrapper without a communicator
    pub fn single_process(ctx: ComputeContext) -> Result<Self> {
        let ctx_float = ctx.float_context()?;
        Ok(Self {
            n_procs: 1,
            rank: 0,
            ctx,
            ctx_float,
            comm: None,
        })
    }

    pub fn n_procs(&self) -> usize {
        self.n_procs
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Context of this process
    pub fn ctx(&self) -> &ComputeContext {
        &self.ctx
    }

    /// Float variant of [`ctx`](Self::ctx)
    pub fn ctx_float(&self) -> &ComputeContext {
        &self.ctx_float
    }

    pub fn is_distributed(&self) -> bool {
        self.comm.is_some()
    }

    pub fn comm(&self) -> Option<&dyn Communicator> {
        self.comm.as_deref()
    }

    /// All-reduce `params` across processes; no-op for a single process
    pub fn all_reduce(&self, params: &mut [Tensor], division: bool) -> Result<()> {
        match &self.comm {
            Some(comm) if self.n_procs > 1 => comm.all_reduce(params, division),
            _ => Ok(()),
        }
    }
}

impl std::fmt::Debug for CommunicatorWrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommunicatorWrapper")
            .field("n_procs", &self.n_procs)
            .field("rank", &self.rank)
            .field("ctx", &self.ctx)
            .field("ctx_float", &self.ctx_float)
            .field("distributed", &self.comm.is_some())
            .finish()
    }
}
