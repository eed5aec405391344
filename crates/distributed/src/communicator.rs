//! Communicator interface and an in-process group implementation

use std::sync::Arc;

use convert_core::{DType, Error, Result, Shape, Tensor};
use parking_lot::{Condvar, Mutex};
use tracing::debug;

/// Handle to a group of cooperating ranks
pub trait Communicator: Send + Sync {
    /// Number of ranks in the group
    fn size(&self) -> usize;

    /// Rank of this participant, in `0..size()`
    fn rank(&self) -> usize;

    /// Element-wise sum of `tensors` across all ranks, written back in place
    ///
    /// With `division` the sum is divided by the group size. Blocks until
    /// every rank has contributed. If any rank's tensors cannot be reduced,
    /// or dtypes and shapes differ between ranks, every rank gets an error.
    fn all_reduce(&self, tensors: &mut [Tensor], division: bool) -> Result<()>;
}

type RoundResult = std::result::Result<Vec<Vec<f64>>, String>;

/// What one rank brings to a round
struct Contribution {
    layout: Vec<(DType, Shape)>,
    values: Vec<Vec<f64>>,
}

impl Contribution {
    fn from_tensors(tensors: &[Tensor]) -> Result<Self> {
        let layout = tensors
            .iter()
            .map(|t| (t.dtype(), t.shape().to_vec()))
            .collect();
        let values = tensors
            .iter()
            .map(|t| t.to_f64_vec())
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { layout, values })
    }
}

/// State of the current all-reduce round
#[derive(Default)]
struct RoundState {
    /// Completed rounds
    generation: u64,

    /// Ranks that have contributed to the current round
    arrived: usize,

    /// Running sums per tensor
    sums: Vec<Vec<f64>>,

    /// Dtypes and shapes of the first accepted contribution
    layout: Option<Vec<(DType, Shape)>>,

    /// First contribution error of the current round
    error: Option<String>,

    /// Outcome of the last completed round
    result: Option<Arc<RoundResult>>,
}

impl RoundState {
    fn accumulate(&mut self, rank: usize, contribution: Contribution) {
        match &self.layout {
            None => {
                self.layout = Some(contribution.layout);
                self.sums = contribution.values;
            }
            Some(expected) if *expected != contribution.layout => {
                self.error = Some(format!(
                    "rank {} contributed {:?}, expected {:?}",
                    rank, contribution.layout, expected
                ));
            }
            Some(_) => {
                for (sum, values) in self.sums.iter_mut().zip(&contribution.values) {
                    for (s, v) in sum.iter_mut().zip(values) {
                        *s += v;
                    }
                }
            }
        }
    }

    /// Close the round and reset for the next one
    fn finish(&mut self) -> Arc<RoundResult> {
        let outcome = match self.error.take() {
            Some(message) => Err(message),
            None => Ok(std::mem::take(&mut self.sums)),
        };
        let outcome = Arc::new(outcome);
        self.result = Some(Arc::clone(&outcome));
        self.arrived = 0;
        self.sums.clear();
        self.layout = None;
        self.generation += 1;
        outcome
    }
}

struct Rendezvous {
    size: usize,
    state: Mutex<RoundState>,
    released: Condvar,
}

impl Rendezvous {
    /// Join the current round and wait for it to complete
    ///
    /// Every rank must call this once per round, including ranks whose
    /// contribution failed, or the others never get released.
    fn contribute(
        &self,
        rank: usize,
        contribution: std::result::Result<Contribution, String>,
    ) -> Arc<RoundResult> {
        let mut state = self.state.lock();
        let generation = state.generation;

        if state.error.is_none() {
            match contribution {
                Ok(contribution) => state.accumulate(rank, contribution),
                Err(reason) => state.error = Some(format!("rank {}: {}", rank, reason)),
            }
        }
        state.arrived += 1;

        if state.arrived == self.size {
            let outcome = state.finish();
            self.released.notify_all();
            debug!(generation = state.generation, "All-reduce round released");
            return outcome;
        }

        while state.generation == generation {
            self.released.wait(&mut state);
        }
        // the next round cannot complete before this rank joins it
        state
            .result
            .clone()
            .unwrap_or_else(|| Arc::new(Err("all-reduce result missing".to_string())))
    }
}

/// Factory for in-process communicators sharing one rendezvous
pub struct LocalGroup;

impl LocalGroup {
    /// Create `size` communicators, one per participating thread
    pub fn new(size: usize) -> Result<Vec<LocalCommunicator>> {
        if size == 0 {
            return Err(Error::InvalidConfig {
                message: "communicator group size must be at least 1".to_string(),
            });
        }

        let shared = Arc::new(Rendezvous {
            size,
            state: Mutex::new(RoundState::default()),
            released: Condvar::new(),
        });

        Ok((0..size)
            .map(|rank| LocalCommunicator {
                rank,
                size,
                shared: Arc::clone(&shared),
            })
            .collect())
    }
}

/// Member of a [`LocalGroup`]
pub struct LocalCommunicator {
    rank: usize,
    size: usize,
    shared: Arc<Rendezvous>,
}

impl Communicator for LocalCommunicator {
    fn size(&self) -> usize {
        self.size
    }

    fn rank(&self) -> usize {
        self.rank
    }

    fn all_reduce(&self, tensors: &mut [Tensor], division: bool) -> Result<()> {
        let contribution = Contribution::from_tensors(tensors).map_err(|e| e.to_string());
        let outcome = self.shared.contribute(self.rank, contribution);
        let sums = match outcome.as_ref() {
            Ok(sums) => sums,
            Err(message) => {
                return Err(Error::Communicator {
                    message: message.clone(),
                })
            }
        };

        let scale = if division { self.size as f64 } else { 1.0 };
        for (tensor, sum) in tensors.iter_mut().zip(sums) {
            let reduced: Vec<f64> = sum.iter().map(|v| v / scale).collect();
            *tensor = tensor.with_f64_values(&reduced)?;
        }
        Ok(())
    }
}
