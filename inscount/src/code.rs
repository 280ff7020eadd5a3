/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Static code units handed to a tool at analysis time.

use bitflags::bitflags;

bitflags! {
    /// How an instruction operand accesses memory. An operand may both read
    /// and write (e.g., `add [rax], 1`).
    #[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Hash)]
    pub struct MemoryAccess: u8 {
        /// The operand reads memory.
        const READ = 1;
        /// The operand writes memory.
        const WRITE = 2;
    }
}

/// A memory operand of an instruction.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct MemoryOperand {
    /// Read, write or both.
    pub access: MemoryAccess,
    /// The effective address the operand touches.
    pub address: u64,
}

impl MemoryOperand {
    /// A read-only memory operand.
    pub const fn read(address: u64) -> Self {
        Self {
            access: MemoryAccess::READ,
            address,
        }
    }

    /// A write-only memory operand.
    pub const fn write(address: u64) -> Self {
        Self {
            access: MemoryAccess::WRITE,
            address,
        }
    }

    /// An operand that is both read and written.
    pub const fn read_write(address: u64) -> Self {
        Self {
            access: MemoryAccess::READ.union(MemoryAccess::WRITE),
            address,
        }
    }

    /// Returns true if the operand reads memory.
    #[inline]
    pub fn is_read(&self) -> bool {
        self.access.contains(MemoryAccess::READ)
    }

    /// Returns true if the operand writes memory.
    #[inline]
    pub fn is_written(&self) -> bool {
        self.access.contains(MemoryAccess::WRITE)
    }
}

/// A single instruction.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Instruction {
    /// Address of the instruction.
    pub address: u64,

    /// True if the instruction's effect may be suppressed at runtime by a
    /// predicate (conditional moves, masked stores, `rep` prefixes with a
    /// zero count and the like).
    pub predicated: bool,

    /// Memory operands, in operand order.
    pub memory_operands: Vec<MemoryOperand>,
}

impl Instruction {
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

    /// Appends a memory operand.
    pub fn operand(mut self, operand: MemoryOperand) -> Self {
        self.memory_operands.push(operand);
        self
    }

    /// Number of memory operands.
    #[inline]
    pub fn memory_operand_count(&self) -> usize {
        self.memory_operands.len()
    }

    /// Returns true if memory operand `index` is read. Out of range operands
    /// are neither read nor written.
    #[inline]
    pub fn memory_operand_is_read(&self, index: usize) -> bool {
        self.memory_operands
            .get(index)
            .is_some_and(MemoryOperand::is_read)
    }

    /// Returns true if memory operand `index` is written.
    #[inline]
    pub fn memory_operand_is_written(&self, index: usize) -> bool {
        self.memory_operands
            .get(index)
            .is_some_and(MemoryOperand::is_written)
    }
}

/// A single-entry, single-exit run of instructions.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct BasicBlock {
    /// Address of the first instruction.
    pub address: u64,
    /// Instructions in execution order. Never empty.
    pub instructions: Vec<Instruction>,
}

impl BasicBlock {
    /// Creates a block. The block's address is the address of its first
    /// instruction.
    pub fn new(instructions: Vec<Instruction>) -> Self {
        let address = instructions.first().map_or(0, |ins| ins.address);
        Self {
            address,
            instructions,
        }
    }

    /// Static instruction count of the block.
    #[inline]
    pub fn num_instructions(&self) -> u32 {
        u32::try_from(self.instructions.len()).unwrap_or(u32::MAX)
    }

    /// Instructions of the block.
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }
}

/// A group of basic blocks that the host instruments in one pass.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Trace {
    blocks: Vec<BasicBlock>,
}

impl Trace {
    /// Creates a trace from its blocks, in layout order.
    pub fn new(blocks: Vec<BasicBlock>) -> Self {
        Self { blocks }
    }

    /// Address of the trace (its first block).
    pub fn address(&self) -> u64 {
        self.blocks.first().map_or(0, |bbl| bbl.address)
    }

    /// Blocks of the trace.
    pub fn blocks(&self) -> &[BasicBlock] {
        &self.blocks
    }

    /// Total static instruction count of the trace.
    pub fn num_instructions(&self) -> u64 {
        self.blocks
            .iter()
            .map(|bbl| u64::from(bbl.num_instructions()))
            .sum()
    }
}
