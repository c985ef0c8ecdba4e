//! Wait-combinator behavior driven end-to-end through the kernel.

mod common;

use std::collections::BTreeMap;
use std::rc::Rc;

use common::{Recorder, await_request};
use weft::{Error, Kernel, KernelStrand, MemoryChannel, Request, Strand, StrandState, Value};

/// A strand that completes with whatever is written to its channel.
fn reader_strand(
    kernel: &Kernel,
    channel: &Rc<MemoryChannel<&'static str>>,
) -> Rc<KernelStrand<&'static str>> {
    kernel.execute(await_request(Request::delegate(channel.read())))
}

#[test]
fn wait_some_orders_results_by_original_index() {
    let kernel = Kernel::new();
    let chan_a = MemoryChannel::new(0);
    let chan_b = MemoryChannel::new(0);
    let chan_c = MemoryChannel::new(0);

    let a = reader_strand(&kernel, &chan_a);
    let b = reader_strand(&kernel, &chan_b);
    let c = reader_strand(&kernel, &chan_c);

    let waiter = kernel.execute(await_request(Request::WaitSome(
        2,
        vec![a.handle(), b.handle(), c.handle()],
    )));
    let recorder = Recorder::new();
    waiter.attach_observer(recorder.clone());

    // B completes before A; C never completes and gets cancelled.
    kernel.execute(await_request(Request::delegate(chan_b.write("b"))));
    kernel.execute(await_request(Request::delegate(chan_a.write("a"))));
    kernel.run().unwrap();

    let mut expected = BTreeMap::new();
    expected.insert(0, Value::Item("a"));
    expected.insert(1, Value::Item("b"));
    assert_eq!(recorder.success_values(), vec![Value::Many(expected)]);
    assert_eq!(c.state(), StrandState::Terminated);
}

#[test]
fn wait_any_delivers_the_first_value_and_cancels_the_rest() {
    let kernel = Kernel::new();
    let chan_a = MemoryChannel::new(0);
    let chan_b = MemoryChannel::new(0);

    let a = reader_strand(&kernel, &chan_a);
    let b = reader_strand(&kernel, &chan_b);

    let waiter = kernel.execute(await_request(Request::WaitAny(vec![a.handle(), b.handle()])));
    let recorder = Recorder::new();
    waiter.attach_observer(recorder.clone());

    kernel.execute(await_request(Request::delegate(chan_b.write("win"))));
    kernel.run().unwrap();

    assert_eq!(recorder.success_values(), vec![Value::Item("win")]);
    assert_eq!(a.state(), StrandState::Terminated);
    assert_eq!(waiter.state(), StrandState::Completed);
}

#[test]
fn wait_any_aggregates_failures_by_original_index() {
    let kernel = Kernel::new();
    let chan_a = MemoryChannel::new(0);
    let chan_b = MemoryChannel::new(0);

    let a = reader_strand(&kernel, &chan_a);
    let b = reader_strand(&kernel, &chan_b);

    let waiter = kernel.execute(await_request(Request::WaitAny(vec![a.handle(), b.handle()])));
    let recorder = Recorder::new();
    waiter.attach_observer(recorder.clone());
    kernel.run().unwrap();

    // Closing the channels fails B first, then A.
    chan_b.close();
    chan_a.close();
    kernel.run().unwrap();

    let failures = recorder.failures();
    assert_eq!(failures.len(), 1);
    let composite = failures[0].1.as_composite().expect("composite failure");
    assert_eq!(composite.len(), 2);
    // Entries arrive B-then-A but stay keyed by construction position.
    let arrival: Vec<usize> = composite.entries().iter().map(|(i, _)| *i).collect();
    assert_eq!(arrival, vec![1, 0]);
    assert!(composite.get(0).unwrap().is_channel_closed());
    assert!(composite.get(1).unwrap().is_channel_closed());
}

#[test]
fn wait_all_collects_every_result() {
    let kernel = Kernel::new();
    let chan_a = MemoryChannel::new(1);
    let chan_b = MemoryChannel::new(1);

    let a = reader_strand(&kernel, &chan_a);
    let b = reader_strand(&kernel, &chan_b);

    let waiter = kernel.execute(await_request(Request::WaitAll(vec![a.handle(), b.handle()])));
    let recorder = Recorder::new();
    waiter.attach_observer(recorder.clone());

    kernel.execute(await_request(Request::delegate(chan_b.write("b"))));
    kernel.execute(await_request(Request::delegate(chan_a.write("a"))));
    kernel.run().unwrap();

    let mut expected = BTreeMap::new();
    expected.insert(0, Value::Item("a"));
    expected.insert(1, Value::Item("b"));
    assert_eq!(recorder.success_values(), vec![Value::Many(expected)]);
}

#[test]
fn wait_first_surfaces_the_first_exit_even_a_failure() {
    let kernel = Kernel::new();
    let chan_a = MemoryChannel::new(0);
    let chan_b = MemoryChannel::new(0);

    let a = reader_strand(&kernel, &chan_a);
    let b = reader_strand(&kernel, &chan_b);

    let waiter = kernel.execute(await_request(Request::WaitFirst(vec![
        a.handle(),
        b.handle(),
    ])));
    let recorder = Recorder::new();
    waiter.attach_observer(recorder.clone());
    kernel.run().unwrap();

    chan_a.close();
    kernel.run().unwrap();

    let failures = recorder.failures();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].1.is_channel_closed());
    assert_eq!(b.state(), StrandState::Terminated);
}

#[test]
fn terminating_the_waiter_cancels_every_pending_substrand() {
    let kernel = Kernel::new();
    let chan_a = MemoryChannel::new(0);
    let chan_b = MemoryChannel::new(0);

    let a = reader_strand(&kernel, &chan_a);
    let b = reader_strand(&kernel, &chan_b);

    let waiter = kernel.execute(await_request(Request::WaitAll(vec![a.handle(), b.handle()])));
    kernel.run().unwrap();
    assert_eq!(waiter.state(), StrandState::Suspended);

    waiter.handle().terminate();

    assert_eq!(waiter.state(), StrandState::Terminated);
    assert_eq!(a.state(), StrandState::Terminated);
    assert_eq!(b.state(), StrandState::Terminated);

    // The cancelled readers were evicted from their channels: a later
    // writer parks instead of handing off to a dead strand.
    let writer = kernel.execute(await_request(Request::delegate(chan_a.write("late"))));
    kernel.run().unwrap();
    assert_eq!(writer.state(), StrandState::Suspended);
}

#[test]
fn already_terminal_substrands_resolve_the_wait_at_registration() {
    let kernel = Kernel::new();

    let done = kernel.execute(common::immediate(Value::Item("early")));
    kernel.run().unwrap();
    assert_eq!(done.state(), StrandState::Completed);

    let chan = MemoryChannel::new(0);
    let pending = reader_strand(&kernel, &chan);

    let waiter = kernel.execute(await_request(Request::WaitAny(vec![
        done.handle(),
        pending.handle(),
    ])));
    let recorder = Recorder::new();
    waiter.attach_observer(recorder.clone());
    kernel.run().unwrap();

    assert_eq!(recorder.success_values(), vec![Value::Item("early")]);
    assert_eq!(pending.state(), StrandState::Terminated);
}

#[test]
fn nested_waits_compose() {
    let kernel = Kernel::new();
    let chan_a = MemoryChannel::new(0);
    let chan_b = MemoryChannel::new(0);

    let a = reader_strand(&kernel, &chan_a);
    let b = reader_strand(&kernel, &chan_b);

    // The inner wait's result map becomes the outer strand's outcome.
    let inner = kernel.execute(await_request(Request::WaitAll(vec![a.handle(), b.handle()])));
    let outer = kernel.execute(await_request(Request::WaitAny(vec![inner.handle()])));
    let recorder = Recorder::new();
    outer.attach_observer(recorder.clone());

    kernel.execute(await_request(Request::delegate(chan_a.write("a"))));
    kernel.execute(await_request(Request::delegate(chan_b.write("b"))));
    kernel.run().unwrap();

    let mut expected = BTreeMap::new();
    expected.insert(0, Value::Item("a"));
    expected.insert(1, Value::Item("b"));
    assert_eq!(recorder.success_values(), vec![Value::Many(expected)]);
}

#[test]
fn substrand_termination_is_distinguishable_from_failure() {
    let kernel = Kernel::new();
    let chan = MemoryChannel::new(0);
    let sub = reader_strand(&kernel, &chan);

    let waiter = kernel.execute(await_request(Request::WaitAll(vec![sub.handle()])));
    let recorder = Recorder::new();
    waiter.attach_observer(recorder.clone());
    kernel.run().unwrap();

    sub.handle().terminate();

    let failures = recorder.failures();
    assert_eq!(failures.len(), 1);
    match &failures[0].1 {
        Error::Terminated { strand } => assert_eq!(*strand, sub.id()),
        other => panic!("expected the termination failure, got {other}"),
    }
}
