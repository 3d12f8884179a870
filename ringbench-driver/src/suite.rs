//! Expands the command line into registered benchmark variants:
//! ring size x vendor for the chosen payload type.

use tracing::{ info, warn };

use ringbench::message::{
    type_label,
    ConsumeAndStore,
    Message,
    MessageConsumer,
    MessageCreator,
    OrderBook,
    ProduceFreshOrderBook,
    ProduceIncremental,
};
use ringbench::queue::{ BatchedSpsc, CrossbeamArray, QueueAdapter, SimpleSpinSpsc };
use ringbench::{
    FanOut,
    LatencyBenchmark,
    LatencyConfig,
    Result,
    ThroughputBenchmark,
    ThroughputConfig,
    TrialScheduler,
};

use crate::{ MsgType, Vendor };

pub struct Plan<'a> {
    pub ring_sizes: &'a [usize],
    pub vendors: &'a [Vendor],
    pub msg_type: MsgType,
}

pub struct ThroughputShape {
    pub producers: usize,
    pub consumers: usize,
    pub fan_out: FanOut,
    pub producer_cores: Vec<usize>,
    pub consumer_cores: Vec<usize>,
}

pub struct LatencyShape {
    pub threads: usize,
    pub a_cores: Vec<usize>,
    pub b_cores: Vec<usize>,
}

pub fn register_throughput(scheduler: &mut TrialScheduler, plan: &Plan<'_>, shape: &ThroughputShape) -> Result<()> {
    match plan.msg_type {
        MsgType::U32 => throughput_for::<u32, ProduceIncremental<u32>, ConsumeAndStore<u32>>(scheduler, plan, shape),
        MsgType::U64 => throughput_for::<u64, ProduceIncremental<u64>, ConsumeAndStore<u64>>(scheduler, plan, shape),
        MsgType::OrderBook => {
            throughput_for::<OrderBook, ProduceFreshOrderBook, ConsumeAndStore<OrderBook>>(scheduler, plan, shape)
        }
    }
}

pub fn register_latency(scheduler: &mut TrialScheduler, plan: &Plan<'_>, shape: &LatencyShape) -> Result<()> {
    match plan.msg_type {
        MsgType::U32 => latency_for::<u32, ProduceIncremental<u32>, ConsumeAndStore<u32>>(scheduler, plan, shape),
        MsgType::U64 => latency_for::<u64, ProduceIncremental<u64>, ConsumeAndStore<u64>>(scheduler, plan, shape),
        MsgType::OrderBook => {
            latency_for::<OrderBook, ProduceFreshOrderBook, ConsumeAndStore<OrderBook>>(scheduler, plan, shape)
        }
    }
}

fn throughput_for<T, MC, MS>(scheduler: &mut TrialScheduler, plan: &Plan<'_>, shape: &ThroughputShape) -> Result<()>
    where T: Message, MC: MessageCreator<T> + 'static, MS: MessageConsumer<T> + 'static
{
    let name = format!("throughput_{}", type_label::<T>().to_lowercase());
    for &ring_size in plan.ring_sizes {
        let config = ThroughputConfig::new(name.as_str(), ring_size)?
            .with_producers(shape.producers)?
            .with_consumers(shape.consumers)?
            .with_fan_out(shape.fan_out)
            .with_producer_cores(shape.producer_cores.clone())?
            .with_consumer_cores(shape.consumer_cores.clone())?;

        for vendor in plan.vendors {
            match vendor {
                Vendor::BatchedSpsc => add_throughput::<T, BatchedSpsc, MC, MS>(scheduler, &config)?,
                Vendor::SpinSpsc => add_throughput::<T, SimpleSpinSpsc, MC, MS>(scheduler, &config)?,
                Vendor::Crossbeam => add_throughput::<T, CrossbeamArray, MC, MS>(scheduler, &config)?,
            }
        }
    }
    Ok(())
}

fn add_throughput<T, Q, MC, MS>(scheduler: &mut TrialScheduler, config: &ThroughputConfig) -> Result<()>
    where T: Message, Q: QueueAdapter<T>, MC: MessageCreator<T> + 'static, MS: MessageConsumer<T> + 'static
{
    if let Err(err) = ThroughputBenchmark::<T, Q, MC, MS>::new(config.clone()) {
        if err.is_config_error() {
            warn!(vendor = Q::VENDOR, %err, "skipping vendor");
            return Ok(());
        }
        return Err(err);
    }

    let config = config.clone();
    let key = scheduler.register(move || ThroughputBenchmark::<T, Q, MC, MS>::new(config.clone()))?;
    info!(benchmark = %key, "registered");
    Ok(())
}

fn latency_for<T, MC, MS>(scheduler: &mut TrialScheduler, plan: &Plan<'_>, shape: &LatencyShape) -> Result<()>
    where T: Message, MC: MessageCreator<T> + 'static, MS: MessageConsumer<T> + 'static
{
    let name = format!("latency_{}", type_label::<T>().to_lowercase());
    for &ring_size in plan.ring_sizes {
        let config = LatencyConfig::new(name.as_str(), ring_size)?
            .with_threads(shape.threads)?
            .with_a_cores(shape.a_cores.clone())?
            .with_b_cores(shape.b_cores.clone())?;

        for vendor in plan.vendors {
            match vendor {
                Vendor::BatchedSpsc => add_latency::<T, BatchedSpsc, MC, MS>(scheduler, &config)?,
                Vendor::SpinSpsc => add_latency::<T, SimpleSpinSpsc, MC, MS>(scheduler, &config)?,
                Vendor::Crossbeam => add_latency::<T, CrossbeamArray, MC, MS>(scheduler, &config)?,
            }
        }
    }
    Ok(())
}

fn add_latency<T, Q, MC, MS>(scheduler: &mut TrialScheduler, config: &LatencyConfig) -> Result<()>
    where T: Message, Q: QueueAdapter<T>, MC: MessageCreator<T> + 'static, MS: MessageConsumer<T> + 'static
{
    if let Err(err) = LatencyBenchmark::<T, Q, MC, MS>::new(config.clone()) {
        if err.is_config_error() {
            warn!(vendor = Q::VENDOR, %err, "skipping vendor");
            return Ok(());
        }
        return Err(err);
    }

    let config = config.clone();
    let key = scheduler.register(move || LatencyBenchmark::<T, Q, MC, MS>::new(config.clone()))?;
    info!(benchmark = %key, "registered");
    Ok(())
}
