use std::{collections::HashSet, thread};

use shardflake::{ShardedGenerator, SnowflakeId, TimeSource};

use super::config::GenerateConfig;

/// Outcome of a `generate` run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateReport {
    pub generated: usize,
    pub unique: usize,
    pub duplicates: Vec<SnowflakeId>,
}

impl GenerateReport {
    pub fn is_clean(&self) -> bool {
        self.duplicates.is_empty()
    }
}

/// Spawns `config.threads` threads that each pull `config.ids_per_thread`
/// IDs from one shared generator, then checks the union for duplicates.
///
/// The first generator error aborts the run.
pub fn run<T>(
    generator: &ShardedGenerator<T>,
    config: &GenerateConfig,
) -> anyhow::Result<GenerateReport>
where
    T: TimeSource + Send + Sync,
{
    tracing::info!(
        threads = config.threads,
        ids_per_thread = config.ids_per_thread,
        shards = generator.shard_count(),
        datacenter_id = generator.datacenter_id(),
        worker_id = generator.worker_id(),
        "generating IDs"
    );

    let batches = thread::scope(|s| {
        let handles: Vec<_> = (0..config.threads)
            .map(|thread_id| s.spawn(move || issue(generator, config, thread_id)))
            .collect();

        handles
            .into_iter()
            .map(|handle| match handle.join() {
                Ok(batch) => batch,
                Err(_) => Err(anyhow::anyhow!("generator thread panicked")),
            })
            .collect::<anyhow::Result<Vec<_>>>()
    })?;

    let mut seen = HashSet::with_capacity(config.threads * config.ids_per_thread);
    let mut duplicates = Vec::new();
    let mut generated = 0;

    for id in batches.into_iter().flatten() {
        generated += 1;
        if !seen.insert(id) {
            tracing::error!(%id, shard = generator.shard_of(id), "duplicate ID");
            duplicates.push(id);
        }
    }

    let report = GenerateReport {
        generated,
        unique: seen.len(),
        duplicates,
    };

    if report.is_clean() {
        tracing::info!(generated, unique = report.unique, "no duplicate IDs");
    } else {
        tracing::error!(
            generated,
            unique = report.unique,
            duplicates = report.duplicates.len(),
            "duplicate IDs detected"
        );
    }

    Ok(report)
}

fn issue<T: TimeSource>(
    generator: &ShardedGenerator<T>,
    config: &GenerateConfig,
    thread_id: usize,
) -> anyhow::Result<Vec<SnowflakeId>> {
    let mut ids = Vec::with_capacity(config.ids_per_thread);

    for _ in 0..config.ids_per_thread {
        let id = generator.next_id()?;
        tracing::debug!(
            thread_id,
            %id,
            timestamp = id.timestamp(),
            sequence = id.sequence(),
            shard = generator.shard_of(id),
            "issued"
        );
        ids.push(id);

        if !config.pause.is_zero() {
            thread::sleep(config.pause);
        }
    }

    Ok(ids)
}
