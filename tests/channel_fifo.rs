//! Channel ordering, buffer accounting, and close semantics, driven
//! through the kernel.

mod common;

use common::{Recorder, await_request};
use proptest::prelude::*;
use weft::{Kernel, MemoryChannel, Request, Strand, StrandState, Value};

#[test]
fn unbuffered_channel_is_fifo_across_parked_readers() {
    let kernel = Kernel::new();
    let channel = MemoryChannel::new(0);
    let recorder = Recorder::new();

    let readers: Vec<_> = (0..3)
        .map(|_| {
            let strand = kernel.execute(await_request(Request::delegate(channel.read())));
            strand.attach_observer(recorder.clone());
            strand
        })
        .collect();
    for value in [1, 2, 3] {
        kernel.execute(await_request(Request::delegate(channel.write(value))));
    }
    kernel.run().unwrap();

    // Values arrive in write order, delivered to readers in the order
    // they started reading.
    assert_eq!(
        recorder.success_values(),
        vec![Value::Item(1), Value::Item(2), Value::Item(3)]
    );
    let expected_order: Vec<_> = readers.iter().map(|reader| reader.id()).collect();
    assert_eq!(recorder.success_order(), expected_order);
}

#[test]
fn writes_beyond_capacity_park_exactly_the_overflowing_writer() {
    let kernel = Kernel::new();
    let channel = MemoryChannel::new(2);

    let writers: Vec<_> = [10, 20, 30]
        .into_iter()
        .map(|value| kernel.execute(await_request(Request::delegate(channel.write(value)))))
        .collect();
    kernel.run().unwrap();

    assert_eq!(writers[0].state(), StrandState::Completed);
    assert_eq!(writers[1].state(), StrandState::Completed);
    assert_eq!(writers[2].state(), StrandState::Suspended);

    // Reads drain in submission order; the parked writer unblocks once
    // its own value is handed off.
    let recorder = Recorder::new();
    for _ in 0..3 {
        kernel
            .execute(await_request(Request::delegate(channel.read())))
            .attach_observer(recorder.clone());
    }
    kernel.run().unwrap();

    assert_eq!(
        recorder.success_values(),
        vec![Value::Item(10), Value::Item(20), Value::Item(30)]
    );
    assert_eq!(writers[2].state(), StrandState::Completed);
}

#[test]
fn close_fails_every_parked_operation() {
    let kernel = Kernel::new();

    let reads: std::rc::Rc<MemoryChannel<i32>> = MemoryChannel::new(0);
    let r1 = kernel.execute(await_request(Request::delegate(reads.read())));
    let r2 = kernel.execute(await_request(Request::delegate(reads.read())));

    let writes = MemoryChannel::new(0);
    let w = kernel.execute(await_request(Request::delegate(writes.write(9))));

    kernel.run().unwrap();
    assert_eq!(r1.state(), StrandState::Suspended);
    assert_eq!(r2.state(), StrandState::Suspended);
    assert_eq!(w.state(), StrandState::Suspended);

    reads.close();
    writes.close();
    kernel.run().unwrap();

    assert_eq!(r1.state(), StrandState::Failed);
    assert_eq!(r2.state(), StrandState::Failed);
    assert_eq!(w.state(), StrandState::Failed);
    assert!(reads.is_closed());
    assert!(writes.is_closed());

    // A second close is a no-op.
    reads.close();
    writes.close();
    assert!(reads.is_closed());
}

#[test]
fn operations_after_close_fail_immediately() {
    let kernel = Kernel::new();
    let channel: std::rc::Rc<MemoryChannel<i32>> = MemoryChannel::new(1);
    channel.close();

    let read = kernel.execute(await_request(Request::delegate(channel.read())));
    let write = kernel.execute(await_request(Request::delegate(channel.write(1))));
    kernel.run().unwrap();

    assert_eq!(read.state(), StrandState::Failed);
    assert_eq!(write.state(), StrandState::Failed);
}

#[test]
fn terminating_a_parked_reader_leaves_the_queue_consistent() {
    let kernel = Kernel::new();
    let channel = MemoryChannel::new(0);

    let doomed = kernel.execute(await_request(Request::delegate(channel.read())));
    let survivor = kernel.execute(await_request(Request::delegate(channel.read())));
    kernel.run().unwrap();

    doomed.handle().terminate();
    assert_eq!(doomed.state(), StrandState::Terminated);

    let recorder = Recorder::new();
    survivor.attach_observer(recorder.clone());
    kernel.execute(await_request(Request::delegate(channel.write(5))));
    kernel.run().unwrap();

    // The evicted reader never sees the value; the survivor does.
    assert_eq!(recorder.success_values(), vec![Value::Item(5)]);
}

proptest! {
    /// Whatever the buffer size, readers observe exactly the written
    /// values in write order.
    #[test]
    fn fifo_order_holds(buffer in 0usize..4, values in proptest::collection::vec(any::<i32>(), 1..16)) {
        let kernel = Kernel::new();
        let channel = MemoryChannel::new(buffer);
        let recorder = Recorder::new();

        for _ in 0..values.len() {
            kernel
                .execute(await_request(Request::delegate(channel.read())))
                .attach_observer(recorder.clone());
        }
        for value in &values {
            kernel.execute(await_request(Request::delegate(channel.write(*value))));
        }
        kernel.run().unwrap();

        let expected: Vec<Value<i32>> = values.iter().map(|v| Value::Item(*v)).collect();
        prop_assert_eq!(recorder.success_values(), expected);
    }

    /// With more writes than reads, exactly the writes beyond buffer
    /// capacity and reader demand stay parked.
    #[test]
    fn buffer_accounting_holds(buffer in 0usize..4, writes in 1usize..12, reads in 0usize..12) {
        let kernel = Kernel::new();
        let channel = MemoryChannel::new(buffer);

        let writers: Vec<_> = (0..writes)
            .map(|value| {
                let value = i32::try_from(value).unwrap();
                kernel.execute(await_request(Request::delegate(channel.write(value))))
            })
            .collect();
        let readers: Vec<_> = (0..reads)
            .map(|_| kernel.execute(await_request(Request::delegate(channel.read()))))
            .collect();
        kernel.run().unwrap();

        // A writer finishes if it was buffered up front or a read drained
        // its entry; freed buffer space never retroactively unparks one.
        let delivered = writes.min(reads);
        let unblocked = delivered.max(buffer.min(writes));
        for (index, writer) in writers.iter().enumerate() {
            let expected = if index < unblocked {
                StrandState::Completed
            } else {
                StrandState::Suspended
            };
            prop_assert_eq!(writer.state(), expected, "writer {}", index);
        }
        for (index, reader) in readers.iter().enumerate() {
            let expected = if index < writes.min(reads) {
                StrandState::Completed
            } else {
                StrandState::Suspended
            };
            prop_assert_eq!(reader.state(), expected, "reader {}", index);
        }
    }
}
