//! Chunked, demand-driven execution of an operation graph.

use crate::device::{ClDevice, CpuDevice, Device};
use crate::graph::{OperationGraph, OperationId};
use crate::write_buffer::MemoryProxy;
use rastermill_core::{BufferArea, MemoryBuffer, Quality, Result, SharedMemoryBuffer};
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One unit of schedulable work: one operation and one output chunk.
#[derive(Debug, Clone, Copy)]
pub struct WorkPackage {
    pub operation: OperationId,
    pub area: BufferArea,
}

/// Cooperative cancellation flag, polled at chunk granularity.
///
/// Cancellation is not an error: completed chunks remain valid, remaining
/// chunks are simply never computed.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Execution configuration for one compositor run.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct ExecutorConfig {
    /// Chunk edge length in pixels.
    pub chunk_size: i32,
    /// Process-wide quality level, read by every operation.
    pub quality: Quality,
    /// Preferred canvas handed to source operations that have no intrinsic
    /// extent.
    pub preferred_area: BufferArea,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            chunk_size: 256,
            quality: Quality::High,
            preferred_area: BufferArea::default(),
        }
    }
}

/// Runs a graph: canvas pass, demanded-area pass, then chunk-parallel fill
/// per operation in topological order.
pub struct Executor {
    config: ExecutorConfig,
    cpu: CpuDevice,
    cl: Option<ClDevice>,
}

impl Executor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self {
            config,
            cpu: CpuDevice,
            cl: None,
        }
    }

    /// Attach an accelerator device; operations flagged `open_cl` dispatch
    /// through it, everything else stays on the CPU pool.
    pub fn with_cl_device(mut self, device: ClDevice) -> Self {
        self.cl = Some(device);
        self
    }

    /// Execute the graph, materializing each operation's demanded area.
    ///
    /// `outputs` names the sink operations and the rectangles requested of
    /// them (typically their full canvas). Returns the frozen buffer of
    /// every executed operation.
    pub fn execute(
        &self,
        graph: &mut OperationGraph,
        outputs: &[(OperationId, BufferArea)],
        cancel: &CancelToken,
    ) -> Result<HashMap<OperationId, SharedMemoryBuffer>> {
        graph.validate()?;
        let order = graph.topological_order()?;
        let canvases = graph.determine_canvases(self.config.preferred_area)?;

        // First init phase for every operation before the demanded-area
        // pass: areas of interest depend on radii derived here.
        for &id in &order {
            let canvas = canvases[id.0 as usize];
            graph.op_mut(id).init_data(canvas, self.config.quality);
        }
        let demanded = graph.demanded_areas(&canvases, outputs)?;
        info!(
            ops = order.len(),
            threads = num_cpus::get(),
            "execution plan compiled"
        );

        let mut results: HashMap<OperationId, SharedMemoryBuffer> = HashMap::new();
        for id in order {
            let area = demanded[id.0 as usize];
            let canvas = canvases[id.0 as usize];

            // Constants fold even when nothing demanded an area of them: a
            // consumer may still read them anywhere (they have no extent of
            // their own).
            let constant_candidate = graph.op(id).flags().can_be_constant;
            if area.is_empty() && !constant_candidate {
                continue;
            }

            // Second init phase runs single-threaded to completion before
            // any chunk of this operation is scheduled.
            graph.op_mut(id).init_execution();

            let op = graph.op(id);
            if constant_candidate {
                if let Some(elem) = op.constant_elem() {
                    let buffer = MemoryBuffer::single_elem(op.output_type(), canvas, &elem);
                    results.insert(id, MemoryProxy::from_buffer(buffer).freeze());
                    graph.op_mut(id).deinit_execution();
                    continue;
                }
            }
            if area.is_empty() {
                graph.op_mut(id).deinit_execution();
                continue;
            }

            let inputs: Vec<SharedMemoryBuffer> = graph
                .inputs_of(id)
                .iter()
                .enumerate()
                .map(|(socket, input)| {
                    let input = input.expect("validated graph");
                    results.get(&input).cloned().unwrap_or_else(|| {
                        // Producer skipped (empty demanded area): a constant
                        // zero stands in; a correct consumer never reads it.
                        let ty = graph.op(id).input_sockets()[socket];
                        Arc::new(MemoryBuffer::single_elem(
                            ty,
                            canvases[input.0 as usize],
                            &vec![0.0; ty.channels()],
                        ))
                    })
                })
                .collect();
            let input_refs: Vec<&MemoryBuffer> = inputs.iter().map(|b| b.as_ref()).collect();

            let op = graph.op(id);
            let use_cl = op.flags().open_cl && self.cl.is_some();
            let device: &dyn Device = if use_cl {
                self.cl.as_ref().expect("checked") as &dyn Device
            } else {
                &self.cpu
            };

            let chunks = partition(area, self.config.chunk_size);
            debug!(
                op = op.name(),
                chunks = chunks.len(),
                accelerated = use_cl,
                "scheduling operation"
            );

            let proxy = MemoryProxy::new(op.output_type(), area);
            let (tx, rx) = crossbeam_channel::unbounded::<MemoryBuffer>();
            rayon::join(
                || {
                    chunks.par_iter().for_each_with(tx, |tx, &chunk| {
                        if cancel.is_cancelled() {
                            return;
                        }
                        let package = WorkPackage {
                            operation: id,
                            area: chunk,
                        };
                        let buffer = device.execute(op, package.area, &input_refs);
                        let _ = tx.send(buffer);
                    });
                },
                || {
                    for buffer in rx.iter() {
                        proxy.merge(&buffer);
                    }
                },
            );

            graph.op_mut(id).deinit_execution();
            results.insert(id, proxy.freeze());

            if cancel.is_cancelled() {
                warn!(op = graph.op(id).name(), "execution interrupted");
                break;
            }
        }
        Ok(results)
    }
}

/// Split an area into chunk rectangles of at most `chunk_size` per side.
fn partition(area: BufferArea, chunk_size: i32) -> Vec<BufferArea> {
    let chunk_size = chunk_size.max(1);
    let mut chunks = Vec::new();
    let mut y = area.y_min;
    while y < area.y_max {
        let y_max = (y + chunk_size).min(area.y_max);
        let mut x = area.x_min;
        while x < area.x_max {
            let x_max = (x + chunk_size).min(area.x_max);
            chunks.push(BufferArea::new(x, y, x_max, y_max));
            x = x_max;
        }
        y = y_max;
    }
    chunks
}
