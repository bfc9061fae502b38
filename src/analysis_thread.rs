use std::sync::Arc;
use std::thread::{spawn, JoinHandle};

use crate::analysis::{ConsensusAggregator, FaultAnalysis, FaultOf};
use crate::error::DfaError;
use crossbeam_channel::{unbounded, Receiver, Sender};
use log::trace;

/// Candidate sets of one fault plus the number of discarded hypotheses.
pub type AnalysisResult<A> = (ConsensusAggregator<<A as FaultAnalysis>::Candidate>, usize);

/// Workload message sent to the analysis worker threads.
///
/// # Fields
///
/// * `fault` - Classified fault to generate key candidates for.
pub struct AnalysisWorkload<A: FaultAnalysis> {
    pub fault: FaultOf<A>,
}

/// Worker pool running candidate generation for many faults in parallel.
///
/// Every worker takes faults from a shared workload queue, computes the
/// candidate sets of that single fault and returns them through the result
/// channel. The coordinator merges the sets by counter addition, so the
/// outcome does not depend on the number of workers or on the order in
/// which results arrive.
///
/// # Usage Pattern
///
/// 1. Create with `new()` providing a result collection channel
/// 2. Start worker threads with `start_worker_threads()`
/// 3. Distribute faults using `send_analysis_workload()`
/// 4. Close the queue with `close_workload()` and receive one result per fault
/// 5. Dropping the pool joins the workers
///
/// The result channel disconnects once every worker has exited, so a worker
/// that panics shows up as a receive error on the coordinator side.
pub struct AnalysisThread<A: FaultAnalysis> {
    /// Sender for workloads, taken on drop to stop the workers.
    workload_sender: Option<Sender<AnalysisWorkload<A>>>,
    /// Receiver shared among all worker threads.
    workload_receiver: Receiver<AnalysisWorkload<A>>,
    /// Channel for returning per fault candidate sets, handed to the workers on start.
    result_sender: Option<Sender<AnalysisResult<A>>>,
    handles: Option<Vec<JoinHandle<()>>>,
}

impl<A: FaultAnalysis> AnalysisThread<A> {
    /// Creates a new AnalysisThread instance with a result channel.
    ///
    /// No worker threads are spawned at this stage.
    ///
    /// # Arguments
    ///
    /// * `result_sender` - Channel for sending candidate sets back to the coordinator.
    ///
    /// # Returns
    ///
    /// * `Ok(AnalysisThread)` - Pool with its workload channel set up.
    pub fn new(result_sender: Sender<AnalysisResult<A>>) -> Result<Self, DfaError> {
        // Create a channel for sending analysis workloads to threads
        let (workload_sender, workload_receiver): (
            Sender<AnalysisWorkload<A>>,
            Receiver<AnalysisWorkload<A>>,
        ) = unbounded();

        Ok(AnalysisThread {
            workload_sender: Some(workload_sender),
            workload_receiver,
            result_sender: Some(result_sender),
            handles: None,
        })
    }

    /// Starts the specified number of worker threads.
    ///
    /// # Arguments
    ///
    /// * `number_of_threads` - Number of worker threads to spawn (must be > 0).
    /// * `analysis` - Shared cipher analysis holding the reference output.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Worker threads successfully started.
    /// * `Err(DfaError::Thread)` - Thread count is zero or the workers were already started.
    pub fn start_worker_threads(
        &mut self,
        number_of_threads: usize,
        analysis: Arc<A>,
    ) -> Result<(), DfaError> {
        // Check that number of threads is greater than 0
        if number_of_threads == 0 {
            return Err(DfaError::Thread(
                "Number of threads must be greater than 0".to_string(),
            ));
        }

        // Only the workers keep result senders alive
        let result_sender = self.result_sender.take().ok_or_else(|| {
            DfaError::Thread("Analysis worker threads already started".to_string())
        })?;

        let mut handles = Vec::with_capacity(number_of_threads);
        for worker in 0..number_of_threads {
            // Copy data to be moved into threads
            let receiver = self.workload_receiver.clone();
            let analysis = Arc::clone(&analysis);
            let result_sender = result_sender.clone();

            let handle = spawn(move || {
                // Loop until the workload receiver is closed
                while let Ok(msg) = receiver.recv() {
                    let AnalysisWorkload { fault } = msg;
                    trace!("Worker {} analysing {:?}", worker, fault.location);

                    let mut sets = ConsensusAggregator::new(analysis.segments());
                    let discarded = analysis.generate_candidates(&fault, &mut sets);
                    // Coordinator is gone, nothing left to report to
                    if result_sender.send((sets, discarded)).is_err() {
                        break;
                    }
                }
            });
            handles.push(handle);
        }
        self.handles = Some(handles);

        Ok(())
    }

    /// Queues one classified fault for candidate generation.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Workload successfully sent to worker threads.
    /// * `Err(DfaError::Thread)` - The workload channel is closed.
    pub fn send_analysis_workload(&self, fault: FaultOf<A>) -> Result<(), DfaError> {
        if let Some(sender) = &self.workload_sender {
            sender
                .send(AnalysisWorkload { fault })
                .map_err(|e| DfaError::Thread(format!("Failed to send analysis workload: {}", e)))
        } else {
            Err(DfaError::Thread(
                "Analysis workload sender channel is closed".to_string(),
            ))
        }
    }

    /// Closes the workload queue. Workers exit after draining it.
    pub fn close_workload(&mut self) {
        drop(self.workload_sender.take());
    }
}

impl<A: FaultAnalysis> Drop for AnalysisThread<A> {
    fn drop(&mut self) {
        // Signal worker threads to stop
        self.close_workload();

        // Wait for all worker threads to complete
        if let Some(handles) = self.handles.take() {
            for handle in handles {
                let _ = handle.join();
            }
        }
    }
}
