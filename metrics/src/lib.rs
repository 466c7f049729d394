use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    blocks_committed: IntCounterVec,
    headers_validated: IntCounterVec,
    tasks: IntCounterVec,
    task_errors: IntCounterVec,
    head_height: IntGaugeVec,
    block_batch_time: HistogramVec,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let blocks_committed = IntCounterVec::new(
            Opts::new("sync_blocks_committed_total", "Total number of blocks committed by sync tasks"),
            &["chain"],
        )?;
        registry.register(Box::new(blocks_committed.clone()))?;

        let headers_validated = IntCounterVec::new(
            Opts::new("sync_headers_validated_total", "Total number of peer headers that passed batch validation"),
            &["chain"],
        )?;
        registry.register(Box::new(headers_validated.clone()))?;

        let tasks = IntCounterVec::new(
            Opts::new("sync_tasks_total", "Total number of finished sync tasks by outcome"),
            &["chain", "outcome"],
        )?;
        registry.register(Box::new(tasks.clone()))?;

        let task_errors = IntCounterVec::new(
            Opts::new("sync_task_errors_total", "Total number of failed sync tasks by error kind"),
            &["chain", "kind"],
        )?;
        registry.register(Box::new(task_errors.clone()))?;

        let head_height = IntGaugeVec::new(
            Opts::new("sync_head_height", "Local head height after the last committed block"),
            &["chain"],
        )?;
        registry.register(Box::new(head_height.clone()))?;

        let block_batch_time = HistogramVec::new(
            HistogramOpts::new("sync_block_batch_time_seconds", "Time taken to fetch and commit one block batch")
                .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["chain"],
        )?;
        registry.register(Box::new(block_batch_time.clone()))?;

        Ok(Self {
            registry,
            blocks_committed,
            headers_validated,
            tasks,
            task_errors,
            head_height,
            block_batch_time,
        })
    }

    /// Render every registered metric in the Prometheus text format.
    pub fn gather(&self) -> prometheus::Result<String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::<u8>::new();
        TextEncoder::new().encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    pub fn inc_blocks_committed(&self, chain: &str) {
        self.blocks_committed.with_label_values(&[chain]).inc();
    }

    pub fn inc_headers_validated(&self, chain: &str, count: u64) {
        self.headers_validated.with_label_values(&[chain]).inc_by(count);
    }

    pub fn inc_task(&self, chain: &str, outcome: &str) {
        self.tasks.with_label_values(&[chain, outcome]).inc();
    }

    pub fn inc_task_error(&self, chain: &str, kind: &str) {
        self.task_errors.with_label_values(&[chain, kind]).inc();
    }

    pub fn set_head_height(&self, chain: &str, height: u64) {
        self.head_height
            .with_label_values(&[chain])
            .set(i64::try_from(height).unwrap_or(i64::MAX));
    }

    pub fn observe_block_batch_time(&self, chain: &str, duration: f64) {
        self.block_batch_time.with_label_values(&[chain]).observe(duration);
    }

    pub fn blocks_committed(&self, chain: &str) -> u64 {
        self.blocks_committed.with_label_values(&[chain]).get()
    }

    pub fn tasks(&self, chain: &str, outcome: &str) -> u64 {
        self.tasks.with_label_values(&[chain, outcome]).get()
    }
}
