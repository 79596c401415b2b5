//! Rastermill Engine - Execution core for the operation graph
//!
//! The engine takes a compiled graph of pixel operations, determines each
//! operation's canvas and the areas its consumers actually demand, then
//! fills those areas chunk-by-chunk on a shared thread pool or an external
//! accelerator. Buffers follow a single-writer discipline: an operation's
//! output is merged chunk-wise behind a `MemoryProxy`, frozen into an `Arc`,
//! and read lock-free by every consumer.

pub mod device;
pub mod executor;
pub mod graph;
pub mod operation;
pub mod write_buffer;

pub use device::{ClDevice, CpuDevice, Device, DispatchError, KernelArg, KernelCall, KernelDispatcher};
pub use executor::{CancelToken, Executor, ExecutorConfig, WorkPackage};
pub use graph::{OperationGraph, OperationId};
pub use operation::{NodeOperation, OperationFlags};
pub use write_buffer::{BufferSourceOperation, MemoryProxy, SetColorOperation, SetValueOperation};
