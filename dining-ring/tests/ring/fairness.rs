//! Starvation freedom over full sampling epochs.

use std::time::Duration;

use dining_ring::{RingBuilder, RingConfiguration};

const THRESHOLD: f64 = 0.05;

async fn full_epoch(config: RingConfiguration) {
    let seed = config.seed;
    let ring = RingBuilder::new().configuration(config).build().unwrap();
    let config = ring.configuration().clone();
    ring.run();

    let epoch = config.sample_interval * (config.sample_cap as u32 + 20);
    tokio::time::sleep(epoch).await;

    let report = ring.report();
    assert_eq!(report.samples, config.sample_cap, "seed {seed}");
    assert_eq!(report.optimal + report.suboptimal, report.samples);
    for (actor, freq) in report.normalized.iter().enumerate() {
        assert!(
            *freq > THRESHOLD,
            "seed {seed}: actor {actor} ate {freq:.3} of the time\n{report}"
        );
    }
    assert!(
        report.invariant_violations.is_empty(),
        "seed {seed}:\n{report}"
    );

    // Capped: further ticks are no-ops.
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(ring.report(), report);

    ring.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_five_actors_never_starve() {
    for seed in 1..=4 {
        full_epoch(RingConfiguration::fast_local().with_seed(seed)).await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_larger_rings_never_starve() {
    for size in [3, 4, 7, 12] {
        full_epoch(
            RingConfiguration::fast_local()
                .with_size(size)
                .with_seed(size as u64),
        )
        .await;
    }
}
