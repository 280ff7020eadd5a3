/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Counting on a single guest thread.

use inscount_engine::testing::check_image;
use inscount_engine::testing::check_image_with_config;
use inscount_engine::testing::test_image;
use inscount_engine::BlockSpec;
use inscount_engine::GuestImage;
use inscount_engine::InstructionSpec;
use inscount_engine::Step;
use inscount_engine::ThreadSpec;
use inscount_engine::TraceSpec;
use inscount_tests::loop_image;
use inscount_tests::three_blocks;
use inscount_tests::FIRST;
use inscount_tests::SECOND;
use inscount_tests::THIRD;
use inscount_tool::Config;
use inscount_tool::InsCount;
use inscount_tool::Stats;

#[test]
fn end_to_end() {
    let counters = check_image::<InsCount>(three_blocks());

    assert_eq!(
        counters.stats(),
        Stats {
            basic_blocks: 3,
            memory_reads: 1,
            memory_writes: 1,
            total_instructions: 6,
            instruction_visits: None,
        }
    );
    assert_eq!(counters.exited_threads(), 1);
}

#[test]
fn block_instruction_consistency() {
    let image = GuestImage::new(
        "consistency",
        vec![inscount_tests::three_blocks_trace()],
        vec![ThreadSpec::new(vec![
            Step::repeat(FIRST, 10),
            Step::repeat(SECOND, 7),
            Step::run(FIRST),
            Step::repeat(THIRD, 4),
        ])],
    );

    let stats = check_image::<InsCount>(image).stats();
    assert_eq!(stats.total_instructions, 11 * 2 + 7 * 3 + 4);
    // Blocks are counted once each, however often they run.
    assert_eq!(stats.basic_blocks, 3);
}

#[test]
fn memory_operand_conservation() {
    // Three reads (one of them read-write) and two writes per iteration.
    let body = BlockSpec::new(vec![
        InstructionSpec::new(0x4000).read(0x10).read(0x18),
        InstructionSpec::new(0x4004),
        InstructionSpec::new(0x4008).operand(inscount_engine::Access::ReadWrite, 0x20),
        InstructionSpec::new(0x400c).write(0x28),
    ]);
    let stats = check_image::<InsCount>(loop_image(body, 25, 1)).stats();

    assert_eq!(stats.memory_reads, 3 * 25);
    assert_eq!(stats.memory_writes, 2 * 25);
    assert_eq!(stats.total_instructions, 2 + 4 * 25 + 1);
    assert_eq!(stats.basic_blocks, 3);
}

#[test]
fn no_memory_operands() {
    let image = loop_image(BlockSpec::straight_line(0x4000, 8), 3, 1);
    let stats = check_image::<InsCount>(image).stats();

    assert_eq!(stats.memory_reads, 0);
    assert_eq!(stats.memory_writes, 0);
    assert_eq!(stats.total_instructions, 2 + 8 * 3 + 1);
}

#[test]
fn predicated_off_operands_do_not_count() {
    let block = BlockSpec::new(vec![
        InstructionSpec::new(0x4000).predicated().read(0x10),
        InstructionSpec::new(0x4004).predicated().write(0x18),
        InstructionSpec::new(0x4008).read(0x20),
    ]);
    let image = GuestImage::new(
        "predication",
        vec![TraceSpec::new(vec![block])],
        vec![ThreadSpec::new(vec![
            Step::run(0x4000),
            Step::run_predicated_off(0x4000, vec![0]),
            Step::run_predicated_off(0x4000, vec![0, 1]),
        ])],
    );

    let counters = check_image_with_config::<InsCount>(
        image,
        Config {
            instruction_visits: true,
        },
    );
    let stats = counters.stats();

    assert_eq!(stats.memory_reads, 2 + 1 + 1);
    assert_eq!(stats.memory_writes, 1 + 1 + 0);
    // Predicated-off instructions are still part of their block, and still
    // visited.
    assert_eq!(stats.total_instructions, 3 * 3);
    assert_eq!(stats.instruction_visits, Some(3 * 3));
}

#[test]
fn unexecuted_blocks_of_an_instrumented_trace_are_counted() {
    let image = GuestImage::new(
        "partial",
        vec![
            inscount_tests::three_blocks_trace(),
            TraceSpec::new(vec![BlockSpec::straight_line(0x5000, 4)]),
        ],
        vec![ThreadSpec::new(vec![Step::run(SECOND)])],
    );

    let stats = check_image::<InsCount>(image).stats();
    // The whole first trace was instrumented; the second never ran.
    assert_eq!(stats.basic_blocks, 3);
    assert_eq!(stats.total_instructions, 3);
    assert_eq!(stats.memory_reads, 0);
}

#[test]
fn nonzero_exit_code() {
    let (status, counters) = test_image::<InsCount>(three_blocks().exit_code(42)).unwrap();

    assert_eq!(status.code(), 42);
    assert!(!status.success());
    // Counts are complete regardless of the exit code.
    assert_eq!(counters.stats().total_instructions, 6);
}

#[test]
fn thread_without_steps() {
    let image = GuestImage::new(
        "idle",
        vec![inscount_tests::three_blocks_trace()],
        vec![ThreadSpec::default()],
    );

    let counters = check_image::<InsCount>(image);
    assert_eq!(counters.stats(), Stats::default());
    assert_eq!(counters.exited_threads(), 1);
}
