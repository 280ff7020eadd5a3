/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Guest images.
//!
//! A guest image describes the static code of a guest (traces of basic blocks
//! of instructions and their memory operands) together with a script for each
//! guest thread saying which blocks it executes, and in which order. Images
//! are plain serde types; the on-disk format is JSON:
//!
//! ```json
//! {
//!   "name": "toy",
//!   "traces": [
//!     { "blocks": [
//!       { "instructions": [
//!         { "address": 4096, "memory_operands": [{ "access": "read", "address": 65536 }] },
//!         { "address": 4100 }
//!       ] }
//!     ] }
//!   ],
//!   "threads": [
//!     { "steps": [{ "run": { "block": 4096 } }] }
//!   ]
//! }
//! ```

use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::io::BufReader;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use bitvec::vec::BitVec;
use inscount::BasicBlock;
use inscount::Instruction;
use inscount::MemoryAccess;
use inscount::MemoryOperand;
use inscount::Trace;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

/// An error found while loading or validating a guest image.
#[derive(Error, Debug)]
pub enum ImageError {
    /// The image file could not be read.
    #[error("failed to read guest image {path:?}")]
    Read {
        /// The image path.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// The image is not well-formed JSON or does not match the schema.
    #[error("malformed guest image: {0}")]
    Parse(#[from] serde_json::Error),

    /// The image has no threads to run.
    #[error("guest image has no threads")]
    NoThreads,

    /// A trace has no blocks.
    #[error("trace {0} has no blocks")]
    EmptyTrace(usize),

    /// A block has no instructions.
    #[error("block {block} of trace {trace} has no instructions")]
    EmptyBlock {
        /// Trace index.
        trace: usize,
        /// Block index within the trace.
        block: usize,
    },

    /// Two blocks start at the same address.
    #[error("duplicate block at {0:#x}")]
    DuplicateBlock(u64),

    /// A thread refers to a block that does not exist.
    #[error("thread {thread} refers to unknown block {block:#x}")]
    UnknownBlock {
        /// Thread index.
        thread: usize,
        /// The missing block address.
        block: u64,
    },

    /// A thread predicates off an instruction that is out of range or not
    /// predicated.
    #[error(
        "thread {thread} predicates off instruction {instruction} of block {block:#x}, which is not a predicated instruction"
    )]
    NotPredicated {
        /// Thread index.
        thread: usize,
        /// Block address.
        block: u64,
        /// Instruction index within the block.
        instruction: usize,
    },
}

/// How a memory operand accesses memory.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    /// Reads memory.
    Read,
    /// Writes memory.
    Write,
    /// Reads and writes memory.
    ReadWrite,
}

impl From<Access> for MemoryAccess {
    fn from(access: Access) -> Self {
        match access {
            Access::Read => MemoryAccess::READ,
            Access::Write => MemoryAccess::WRITE,
            Access::ReadWrite => MemoryAccess::READ | MemoryAccess::WRITE,
        }
    }
}

/// A memory operand.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub struct OperandSpec {
    /// Kind of access.
    pub access: Access,
    /// Effective address.
    #[serde(default)]
    pub address: u64,
}

/// An instruction.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct InstructionSpec {
    /// Address of the instruction.
    pub address: u64,
    /// Whether execution of the instruction can be predicated off.
    #[serde(default)]
    pub predicated: bool,
    /// Memory operands.
    #[serde(default)]
    pub memory_operands: Vec<OperandSpec>,
}

impl InstructionSpec {
    /// An instruction without memory operands.
    pub fn new(address: u64) -> Self {
        Self {
            address,
            predicated: false,
            memory_operands: Vec::new(),
        }
    }

    /// Marks the instruction as predicated.
    pub fn predicated(mut self) -> Self {
        self.predicated = true;
        self
    }

    /// Adds a memory operand.
    pub fn operand(mut self, access: Access, address: u64) -> Self {
        self.memory_operands.push(OperandSpec { access, address });
        self
    }

    /// Adds a read operand.
    pub fn read(self, address: u64) -> Self {
        self.operand(Access::Read, address)
    }

    /// Adds a write operand.
    pub fn write(self, address: u64) -> Self {
        self.operand(Access::Write, address)
    }
}

/// A basic block. Its address is the address of its first instruction.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct BlockSpec {
    /// Instructions, in execution order.
    pub instructions: Vec<InstructionSpec>,
}

impl BlockSpec {
    /// A block made of the given instructions.
    pub fn new(instructions: Vec<InstructionSpec>) -> Self {
        Self { instructions }
    }

    /// A block of `count` 4-byte instructions without memory operands,
    /// starting at `address`.
    pub fn straight_line(address: u64, count: u64) -> Self {
        Self::new(
            (0..count)
                .map(|i| InstructionSpec::new(address + 4 * i))
                .collect(),
        )
    }

    /// Address of the block.
    pub fn address(&self) -> Option<u64> {
        self.instructions.first().map(|ins| ins.address)
    }
}

/// A trace: blocks the host instruments together.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct TraceSpec {
    /// Blocks of the trace.
    pub blocks: Vec<BlockSpec>,
}

impl TraceSpec {
    /// A trace made of the given blocks.
    pub fn new(blocks: Vec<BlockSpec>) -> Self {
        Self { blocks }
    }
}

fn one() -> u64 {
    1
}

/// One step of a guest thread's script.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Executes the block at `block`, `repeat` times in a row.
    Run {
        /// Block address.
        block: u64,
        /// Indexes of predicated instructions whose predicate is false during
        /// these executions.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        predicated_off: Vec<usize>,
        /// How many times the block runs.
        #[serde(default = "one")]
        repeat: u64,
    },
    /// Flushes the instrumented code of the trace containing `block` from the
    /// code cache. Its next execution is instrumented again.
    Invalidate {
        /// Any block address of the trace.
        block: u64,
    },
}

impl Step {
    /// Executes `block` once.
    pub fn run(block: u64) -> Self {
        Self::repeat(block, 1)
    }

    /// Executes `block` `repeat` times.
    pub fn repeat(block: u64, repeat: u64) -> Self {
        Step::Run {
            block,
            predicated_off: Vec::new(),
            repeat,
        }
    }

    /// Executes `block` once with the given predicated instructions
    /// suppressed.
    pub fn run_predicated_off(block: u64, predicated_off: Vec<usize>) -> Self {
        Step::Run {
            block,
            predicated_off,
            repeat: 1,
        }
    }

    /// Invalidates the trace containing `block`.
    pub fn invalidate(block: u64) -> Self {
        Step::Invalidate { block }
    }
}

/// The script of one guest thread.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ThreadSpec {
    /// Steps, in order.
    pub steps: Vec<Step>,
}

impl ThreadSpec {
    /// A thread running the given steps.
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }
}

/// A complete guest image.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct GuestImage {
    /// Name of the guest, used in logs.
    #[serde(default)]
    pub name: String,
    /// Static code.
    pub traces: Vec<TraceSpec>,
    /// Guest threads. All threads start together.
    pub threads: Vec<ThreadSpec>,
    /// Exit code of the guest once every thread finished.
    #[serde(default)]
    pub exit_code: i32,
}

impl GuestImage {
    /// Creates an image.
    pub fn new<S: Into<String>>(name: S, traces: Vec<TraceSpec>, threads: Vec<ThreadSpec>) -> Self {
        Self {
            name: name.into(),
            traces,
            threads,
            exit_code: 0,
        }
    }

    /// Sets the exit code. (Consuming builder.)
    pub fn exit_code(mut self, code: i32) -> Self {
        self.exit_code = code;
        self
    }

    /// Checks the image the same way spawning an engine does, without
    /// running it.
    pub fn validate(&self) -> Result<(), ImageError> {
        Program::load(self.clone()).map(drop)
    }

    /// Parses a JSON image.
    pub fn from_json(s: &str) -> Result<Self, ImageError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Reads a JSON image from a file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ImageError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ImageError::Read {
            path: path.to_owned(),
            source,
        })?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    /// Serializes the image to JSON.
    pub fn to_json(&self) -> Result<String, ImageError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// A block's position in the program.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub(crate) struct BlockRef {
    pub trace: usize,
    pub block: usize,
}

/// A resolved thread step.
#[derive(Debug, Clone)]
pub(crate) enum Op {
    Run {
        at: BlockRef,
        /// Bit `i` is set if instruction `i` is predicated off.
        predicated_off: Option<BitVec>,
        repeat: u64,
    },
    Invalidate {
        trace: usize,
    },
}

/// A validated guest image, ready to run.
#[derive(Debug)]
pub(crate) struct Program {
    pub name: String,
    pub traces: Vec<Arc<Trace>>,
    pub threads: Vec<Vec<Op>>,
    pub exit_code: i32,
}

impl Program {
    pub fn load(image: GuestImage) -> Result<Self, ImageError> {
        if image.threads.is_empty() {
            return Err(ImageError::NoThreads);
        }

        let mut index = HashMap::new();
        let mut traces = Vec::with_capacity(image.traces.len());

        for (t, trace) in image.traces.into_iter().enumerate() {
            if trace.blocks.is_empty() {
                return Err(ImageError::EmptyTrace(t));
            }

            let mut blocks = Vec::with_capacity(trace.blocks.len());
            for (b, block) in trace.blocks.into_iter().enumerate() {
                let address = block.address().ok_or(ImageError::EmptyBlock {
                    trace: t,
                    block: b,
                })?;
                if index
                    .insert(address, BlockRef { trace: t, block: b })
                    .is_some()
                {
                    return Err(ImageError::DuplicateBlock(address));
                }
                blocks.push(BasicBlock::new(
                    block.instructions.into_iter().map(instruction).collect(),
                ));
            }
            traces.push(Arc::new(Trace::new(blocks)));
        }

        let mut threads = Vec::with_capacity(image.threads.len());
        for (thread, spec) in image.threads.into_iter().enumerate() {
            let resolve = |block: u64| {
                index
                    .get(&block)
                    .copied()
                    .ok_or(ImageError::UnknownBlock { thread, block })
            };

            let mut ops = Vec::with_capacity(spec.steps.len());
            for step in spec.steps {
                let op = match step {
                    Step::Run {
                        block,
                        predicated_off,
                        repeat,
                    } => {
                        let at = resolve(block)?;
                        let bbl = &traces[at.trace].blocks()[at.block];
                        let predicated_off = predicate_mask(bbl, &predicated_off)
                            .map_err(|instruction| ImageError::NotPredicated {
                                thread,
                                block,
                                instruction,
                            })?;
                        Op::Run {
                            at,
                            predicated_off,
                            repeat,
                        }
                    }
                    Step::Invalidate { block } => Op::Invalidate {
                        trace: resolve(block)?.trace,
                    },
                };
                ops.push(op);
            }
            threads.push(ops);
        }

        Ok(Program {
            name: image.name,
            traces,
            threads,
            exit_code: image.exit_code,
        })
    }
}

fn instruction(spec: InstructionSpec) -> Instruction {
    Instruction {
        address: spec.address,
        predicated: spec.predicated,
        memory_operands: spec
            .memory_operands
            .into_iter()
            .map(|op| MemoryOperand {
                access: op.access.into(),
                address: op.address,
            })
            .collect(),
    }
}

/// Builds the predicated-off mask of a block, or returns the first index that
/// does not name a predicated instruction.
fn predicate_mask(bbl: &BasicBlock, predicated_off: &[usize]) -> Result<Option<BitVec>, usize> {
    if predicated_off.is_empty() {
        return Ok(None);
    }

    let mut mask = BitVec::repeat(false, bbl.instructions().len());
    for &i in predicated_off {
        match bbl.instructions().get(i) {
            Some(ins) if ins.predicated => mask.set(i, true),
            _ => return Err(i),
        }
    }
    Ok(Some(mask))
}
