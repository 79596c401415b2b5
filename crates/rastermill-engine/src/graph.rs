//! The operation graph: typed links, traversal order, area propagation.

use crate::operation::NodeOperation;
use rastermill_core::{BufferArea, Error, Result};
use smallvec::SmallVec;
use tracing::debug;

/// Unique identifier for an operation in a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationId(pub u32);

struct Node {
    op: Box<dyn NodeOperation>,
    /// Upstream producer per input socket, in socket order.
    inputs: SmallVec<[Option<OperationId>; 4]>,
}

/// A directed acyclic graph of operations with typed socket connections.
///
/// The graph owns all operations; links are non-owning references used for
/// reading. Consumers hold input producers by id, never by pointer.
#[derive(Default)]
pub struct OperationGraph {
    nodes: Vec<Node>,
}

impl OperationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an operation and return its id.
    pub fn add_operation(&mut self, op: Box<dyn NodeOperation>) -> OperationId {
        let id = OperationId(self.nodes.len() as u32);
        let sockets = op.input_sockets().len();
        self.nodes.push(Node {
            op,
            inputs: SmallVec::from_elem(None, sockets),
        });
        id
    }

    /// Connect `from`'s output to input socket `input_index` of `to`.
    ///
    /// Socket pixel types must match; mismatches are graph-construction
    /// errors, not kernel-time conditions.
    pub fn connect(&mut self, from: OperationId, to: OperationId, input_index: usize) -> Result<()> {
        let from_type = self.node(from)?.op.output_type();
        let to_node = self.node(to)?;
        let expected = *to_node.op.input_sockets().get(input_index).ok_or_else(|| {
            Error::DanglingInput(format!(
                "{} has no input socket {input_index}",
                to_node.op.name()
            ))
        })?;
        if from_type != expected {
            return Err(Error::SocketMismatch(format!(
                "{} output {:?} into {} input {input_index} {:?}",
                self.node(from)?.op.name(),
                from_type,
                self.node(to)?.op.name(),
                expected,
            )));
        }
        self.nodes[to.0 as usize].inputs[input_index] = Some(from);
        Ok(())
    }

    fn node(&self, id: OperationId) -> Result<&Node> {
        self.nodes
            .get(id.0 as usize)
            .ok_or_else(|| Error::UnknownOperation(format!("id {}", id.0)))
    }

    /// Number of operations.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Borrow an operation.
    pub fn op(&self, id: OperationId) -> &dyn NodeOperation {
        self.nodes[id.0 as usize].op.as_ref()
    }

    /// Mutably borrow an operation (init/deinit phases).
    pub fn op_mut(&mut self, id: OperationId) -> &mut dyn NodeOperation {
        self.nodes[id.0 as usize].op.as_mut()
    }

    /// Producers feeding `id`, in socket order.
    pub fn inputs_of(&self, id: OperationId) -> &[Option<OperationId>] {
        &self.nodes[id.0 as usize].inputs
    }

    /// Ensure every input socket is connected.
    pub fn validate(&self) -> Result<()> {
        for (i, node) in self.nodes.iter().enumerate() {
            for (socket, input) in node.inputs.iter().enumerate() {
                if input.is_none() {
                    return Err(Error::DanglingInput(format!(
                        "{} (id {i}) input {socket}",
                        node.op.name()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Execution order via Kahn's algorithm, deterministic tie-break.
    pub fn topological_order(&self) -> Result<Vec<OperationId>> {
        let n = self.nodes.len();
        let mut in_degree = vec![0usize; n];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (i, node) in self.nodes.iter().enumerate() {
            for input in node.inputs.iter().flatten() {
                in_degree[i] += 1;
                dependents[input.0 as usize].push(i);
            }
        }

        let mut queue: Vec<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
        // Largest id last so pop() yields the smallest first.
        queue.sort_unstable_by(|a, b| b.cmp(a));

        let mut order = Vec::with_capacity(n);
        while let Some(i) = queue.pop() {
            order.push(OperationId(i as u32));
            for &dep in &dependents[i] {
                in_degree[dep] -= 1;
                if in_degree[dep] == 0 {
                    queue.push(dep);
                    queue.sort_unstable_by(|a, b| b.cmp(a));
                }
            }
        }

        if order.len() == n {
            Ok(order)
        } else {
            Err(Error::GraphCycle)
        }
    }

    /// Forward canvas-determination pass. Returns one canvas per operation.
    pub fn determine_canvases(&self, preferred: BufferArea) -> Result<Vec<BufferArea>> {
        let order = self.topological_order()?;
        let mut canvases = vec![BufferArea::default(); self.nodes.len()];
        for id in order {
            let input_canvases: SmallVec<[BufferArea; 4]> = self
                .inputs_of(id)
                .iter()
                .map(|input| input.map(|i| canvases[i.0 as usize]).unwrap_or_default())
                .collect();
            canvases[id.0 as usize] = self.op(id).determine_canvas(preferred, &input_canvases);
        }
        Ok(canvases)
    }

    /// Backward demanded-area pass.
    ///
    /// Starting from the requested output areas, unions each consumer's
    /// clamped area-of-interest request into its producers. The result is
    /// the exact rectangle each operation must materialize.
    pub fn demanded_areas(
        &self,
        canvases: &[BufferArea],
        outputs: &[(OperationId, BufferArea)],
    ) -> Result<Vec<BufferArea>> {
        let order = self.topological_order()?;
        let mut demanded = vec![BufferArea::default(); self.nodes.len()];
        for &(id, area) in outputs {
            let clamped = area.clamp_to(canvases[id.0 as usize]);
            demanded[id.0 as usize] = demanded[id.0 as usize].union_with(clamped);
        }
        for &id in order.iter().rev() {
            let area = demanded[id.0 as usize];
            if area.is_empty() {
                continue;
            }
            for (socket, input) in self.inputs_of(id).iter().enumerate() {
                let Some(input) = *input else { continue };
                let request = self
                    .op(id)
                    .area_of_interest(socket, area)
                    .clamp_to(canvases[input.0 as usize]);
                demanded[input.0 as usize] = demanded[input.0 as usize].union_with(request);
            }
        }
        debug!(ops = self.nodes.len(), "demanded areas resolved");
        Ok(demanded)
    }

    /// Tiled-protocol dependency search.
    ///
    /// Starting from `op` with `output_area` requested, recursively expands
    /// areas of interest while searching depth-first for `target`. Unions
    /// every rectangle requested *of the target* into `acc` and reports
    /// whether the target was reached.
    pub fn depending_area_of_interest(
        &self,
        canvases: &[BufferArea],
        op: OperationId,
        output_area: BufferArea,
        target: OperationId,
        acc: &mut Option<BufferArea>,
    ) -> bool {
        if op == target {
            *acc = Some(match *acc {
                Some(a) => a.union_with(output_area),
                None => output_area,
            });
            return true;
        }
        let mut found = false;
        for (socket, input) in self.inputs_of(op).iter().enumerate() {
            let Some(input) = *input else { continue };
            let request = self
                .op(op)
                .area_of_interest(socket, output_area)
                .clamp_to(canvases[input.0 as usize]);
            if self.depending_area_of_interest(canvases, input, request, target, acc) {
                found = true;
            }
        }
        found
    }
}
