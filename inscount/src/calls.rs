/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Call insertion. A tool's analysis callbacks describe the probes that should
//! run for a code unit by filling in a [`TraceCalls`] or
//! [`InstructionCalls`]. The host owns the result and fires the probes.

use crate::code::Instruction;

/// Where a call runs relative to its code unit.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Hash)]
pub enum IPoint {
    /// Before the first instruction of the unit executes.
    #[default]
    Before,
    /// After the last instruction of the unit executes (on fall-through).
    After,
}

/// A call to insert into guest code.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct InsertCall<P> {
    probe: P,
    point: IPoint,
    predicated: bool,
    memory_operand: Option<usize>,
}

impl<P> InsertCall<P> {
    /// A call that runs `probe` before its unit, unconditionally.
    pub fn new(probe: P) -> Self {
        Self {
            probe,
            point: IPoint::Before,
            predicated: false,
            memory_operand: None,
        }
    }

    /// Run the probe before the unit executes.
    pub fn before(mut self) -> Self {
        self.point = IPoint::Before;
        self
    }

    /// Run the probe after the unit executes.
    pub fn after(mut self) -> Self {
        self.point = IPoint::After;
        self
    }

    /// Skip the probe whenever the instruction is predicated off. Has no
    /// effect on block-level calls.
    pub fn predicated(mut self) -> Self {
        self.predicated = true;
        self
    }

    /// Pass the effective address of memory operand `index` to the probe.
    pub fn memory_operand(mut self, index: usize) -> Self {
        self.memory_operand = Some(index);
        self
    }

    /// The probe to fire.
    #[inline]
    pub fn probe(&self) -> &P {
        &self.probe
    }

    /// The insertion point.
    #[inline]
    pub fn point(&self) -> IPoint {
        self.point
    }

    /// True if the call honors the instruction's predicate.
    #[inline]
    pub fn is_predicated(&self) -> bool {
        self.predicated
    }

    /// The memory operand whose effective address is passed to the probe.
    #[inline]
    pub fn memory_operand_index(&self) -> Option<usize> {
        self.memory_operand
    }
}

/// Calls inserted for the blocks of one trace, indexed like
/// [`Trace::blocks`](crate::Trace::blocks).
#[derive(Debug, Clone)]
pub struct TraceCalls<P> {
    blocks: Vec<Vec<InsertCall<P>>>,
}

impl<P> TraceCalls<P> {
    /// An empty set of calls for a trace with `num_blocks` blocks.
    pub fn new(num_blocks: usize) -> Self {
        Self {
            blocks: (0..num_blocks).map(|_| Vec::new()).collect(),
        }
    }

    /// Inserts a call for block `block`.
    ///
    /// # Panics
    ///
    /// Panics if `block` is out of range or if the call asks for a memory
    /// operand, which blocks do not have.
    pub fn insert(&mut self, block: usize, call: InsertCall<P>) -> &mut Self {
        assert!(
            call.memory_operand.is_none(),
            "block-level calls cannot take a memory operand"
        );
        self.blocks[block].push(call);
        self
    }

    /// Calls inserted for block `block`.
    pub fn block(&self, block: usize) -> &[InsertCall<P>] {
        &self.blocks[block]
    }

    /// Consumes the calls, yielding the per-block call lists.
    pub fn into_blocks(self) -> Vec<Vec<InsertCall<P>>> {
        self.blocks
    }
}

/// Calls inserted for a single instruction.
#[derive(Debug, Clone)]
pub struct InstructionCalls<P> {
    memory_operands: usize,
    calls: Vec<InsertCall<P>>,
}

impl<P> InstructionCalls<P> {
    /// An empty set of calls for `ins`.
    pub fn new(ins: &Instruction) -> Self {
        Self {
            memory_operands: ins.memory_operand_count(),
            calls: Vec::new(),
        }
    }

    /// Inserts a call.
    ///
    /// # Panics
    ///
    /// Panics if the call names a memory operand the instruction does not
    /// have.
    pub fn insert(&mut self, call: InsertCall<P>) -> &mut Self {
        if let Some(index) = call.memory_operand {
            assert!(
                index < self.memory_operands,
                "memory operand {} out of range ({} operands)",
                index,
                self.memory_operands
            );
        }
        self.calls.push(call);
        self
    }

    /// Number of inserted calls.
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    /// Returns true if no calls were inserted.
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Inserted calls, in insertion order.
    pub fn calls(&self) -> &[InsertCall<P>] {
        &self.calls
    }

    /// Consumes the calls.
    pub fn into_calls(self) -> Vec<InsertCall<P>> {
        self.calls
    }
}
