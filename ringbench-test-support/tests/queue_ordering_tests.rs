//! Ordering and checkpoint tests for the SPSC rings
//!
//! Producer and consumer run on separate threads; every value read must be
//! the next one written.

use std::thread;
use std::time::Duration;

use ringbench::queue::BatchedSpscQueue;
use ringbench::{ BusySpin, SimpleSpinSpscQueue };
use ringbench_test_support::{ SequenceChecker, StressConfig, StressRunner };

#[test]
fn test_small_ring_keeps_order() {
    let (mut producer, mut consumer) = BatchedSpscQueue::<u64>::new(8, 2).unwrap();

    let writer = thread::spawn(move || {
        for i in 0..1000u64 {
            producer.produce(i);
        }
        producer.written()
    });

    let mut received = Vec::with_capacity(1000);
    for _ in 0..1000 {
        received.push(*consumer.peek());
        consumer.skip();
    }
    let written = writer.join().unwrap();

    assert_eq!(received, (0..1000).collect::<Vec<u64>>());
    assert_eq!(written, 1000);
    assert_eq!(consumer.consumed(), 1000);
    // one publication per crossed multiple of items_per_batch
    assert_eq!(consumer.checkpoints_published(), 500);
    assert_eq!(consumer.published_read_index(), 1000);
}

#[test]
fn test_fifo_within_capacity() {
    let (mut producer, mut consumer) = BatchedSpscQueue::<u32>::new(64, 8).unwrap();
    for i in 0..64 {
        producer.try_produce(i * 3).unwrap();
    }
    for i in 0..64 {
        assert_eq!(*consumer.peek(), i * 3);
        consumer.skip();
    }
    assert!(consumer.try_peek().is_none());
}

#[test]
fn test_checkpoints_only_at_batch_boundaries() {
    let (mut producer, mut consumer) = BatchedSpscQueue::<u64>::new(64, 16).unwrap();
    for i in 0..64 {
        producer.produce(i);
    }

    for consumed in 1..=64u64 {
        consumer.peek();
        consumer.skip();
        assert_eq!(consumer.checkpoints_published(), consumed / 16);
        assert_eq!(consumer.published_read_index() as u64, (consumed / 16) * 16);
    }
}

#[test]
fn test_full_ring_waits_for_checkpoint() {
    let (mut producer, mut consumer) = BatchedSpscQueue::<u64>::with_backoff::<BusySpin>(16, 8).unwrap();
    for i in 0..16 {
        producer.produce(i);
    }

    let writer = thread::spawn(move || {
        // blocks until the consumer publishes its first checkpoint
        producer.produce(16);
        producer
    });

    thread::sleep(Duration::from_millis(20));
    for expected in 0..7 {
        assert_eq!(consumer.consume(), expected);
    }
    // seven items read, nothing published yet: the writer must still be stuck
    thread::sleep(Duration::from_millis(20));
    assert!(!writer.is_finished());

    assert_eq!(consumer.consume(), 7);
    let producer = writer.join().unwrap();
    assert_eq!(producer.written(), 17);
    for expected in 8..17 {
        assert_eq!(consumer.consume(), expected);
    }
}

#[test]
fn test_spin_queue_high_contention() {
    let (mut producer, mut consumer) = SimpleSpinSpscQueue::<u64>::new(4).unwrap();

    let writer = thread::spawn(move || {
        for i in 0..200_000u64 {
            producer.produce(i);
        }
    });

    let mut checker = SequenceChecker::new();
    for _ in 0..200_000 {
        checker.check(consumer.consume());
    }
    writer.join().unwrap();
    assert!(checker.is_clean(), "first error: {:?}", checker.first_error());
}

#[test]
fn test_stress_batched_ring() {
    let config = StressConfig::new(Duration::from_millis(300)).with_ring(1024, 64);
    let metrics = StressRunner::new(config).run_batched_spsc().unwrap();

    assert_eq!(metrics.errors, 0, "ordering errors detected");
    assert!(metrics.messages_received > 0, "consumer didn't read any data");
    assert_eq!(metrics.messages_sent, metrics.messages_received);
    assert_eq!(metrics.checkpoints_published, metrics.messages_received / 64);
}

#[test]
fn test_stress_slow_consumer() {
    let config = StressConfig::new(Duration::from_millis(200))
        .with_ring(64, 16)
        .with_consumer_delay(200);
    let metrics = StressRunner::new(config).run_batched_spsc().unwrap();

    assert_eq!(metrics.errors, 0);
    assert_eq!(metrics.messages_sent, metrics.messages_received);
}
