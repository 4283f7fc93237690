//! End-to-end playback scenarios: wire frames in, draw calls out.

#![allow(clippy::unwrap_used, clippy::panic, clippy::indexing_slicing)]

use std::sync::Arc;

use trailcast_playback::{
    AgentStore, FlatResolver, IngestOutcome, MapTable, PlaybackConfig, PlaybackScheduler,
    Position, RenderSink, SpriteState, TickReport,
};
use trailcast_types::{AgentKey, ConsumerMessage, StackId};

/// Sink that records every call for inspection.
#[derive(Debug, Default)]
struct RecordingSink {
    draws: Vec<(AgentKey, Position, SpriteState, String)>,
    releases: Vec<AgentKey>,
}

impl RenderSink for RecordingSink {
    fn draw(&mut self, key: &AgentKey, position: Position, sprite: SpriteState, label: &str) {
        self.draws
            .push((key.clone(), position, sprite, label.to_owned()));
    }

    fn release(&mut self, key: &AgentKey) {
        self.releases.push(key.clone());
    }
}

fn scheduler(config: PlaybackConfig) -> PlaybackScheduler {
    PlaybackScheduler::new(AgentStore::new(config).unwrap(), Arc::new(FlatResolver))
}

fn stacking() -> PlaybackConfig {
    PlaybackConfig {
        stacking_enabled: true,
        ..PlaybackConfig::default()
    }
}

async fn feed(scheduler: &PlaybackScheduler, frame: &str) -> Option<IngestOutcome> {
    scheduler.handle(ConsumerMessage::decode(frame).unwrap()).await
}

fn ran(report: TickReport) -> (usize, usize) {
    match report {
        TickReport::Ran { removed, agents, .. } => (removed, agents),
        TickReport::Skipped => panic!("tick skipped"),
    }
}

fn alice() -> AgentKey {
    AgentKey::new("alice", StackId::Explicit(7))
}

#[tokio::test]
async fn three_point_path_plays_over_one_window() {
    let scheduler = scheduler(stacking());
    let mut sink = RecordingSink::default();
    feed(
        &scheduler,
        r#"{"metadata":{"user":"alice","stack_id":7},"coords":[[1,1,0],[2,1,0],[3,1,0]]}"#,
    )
    .await;

    for now in [0.0, 3_000.0, 6_000.0, 9_000.0] {
        ran(scheduler.tick(now, &mut sink));
    }
    let xs: Vec<f64> = sink.draws.iter().map(|d| d.1.x).collect();
    let expected = [1.0, 1.5, 2.0, 2.5];
    for (x, want) in xs.iter().zip(expected) {
        assert!((x - want).abs() < 1e-9, "{xs:?}");
    }
    assert!(sink.draws.iter().all(|d| d.0 == alice() && d.3 == "alice"));

    let (removed, agents) = ran(scheduler.tick(12_000.0, &mut sink));
    assert_eq!((removed, agents), (1, 0));
    assert_eq!(sink.releases, vec![alice()]);
}

#[tokio::test]
async fn second_batch_speeds_up_and_continues_from_the_join() {
    let scheduler = scheduler(stacking());
    let mut sink = RecordingSink::default();
    feed(
        &scheduler,
        r#"{"metadata":{"user":"alice","stack_id":7},"coords":[[1,1,0],[2,1,0],[3,1,0]]}"#,
    )
    .await;
    let outcome = feed(
        &scheduler,
        r#"{"metadata":{"user":"alice","stack_id":7},"coords":[[4,1,0],[5,1,0]]}"#,
    )
    .await;
    assert!(matches!(outcome, Some(IngestOutcome::Appended { queued: 2, .. })));

    let window = {
        let store = scheduler.store().lock().await;
        store.get(&alice()).unwrap().animation_duration_ms()
    };
    assert!(window < 12_000.0);

    ran(scheduler.tick(0.0, &mut sink));
    ran(scheduler.tick(window, &mut sink));

    // Batch two starts exactly on batch one's final point.
    let joined = sink.draws.last().unwrap().1;
    assert!((joined.x - 3.0).abs() < 1e-9);
    assert!((joined.y - 1.0).abs() < 1e-9);
}

#[tokio::test]
async fn stacking_disabled_gives_each_update_its_own_agent() {
    let scheduler = scheduler(PlaybackConfig::default());
    let frame = r#"{"metadata":{"user":"alice","stack_id":7},"coords":[[1,1,0]]}"#;
    for _ in 0..3 {
        assert!(matches!(
            feed(&scheduler, frame).await,
            Some(IngestOutcome::Created(_))
        ));
    }
    assert_eq!(scheduler.store().lock().await.len(), 3);
}

#[tokio::test]
async fn teleports_are_hidden_across_maps() {
    let maps = MapTable::from_json(
        r#"{"regions":[{"id":"0","coordinates":[0,0]},{"id":"1","coordinates":[500,0]}]}"#,
    )
    .unwrap();
    let store = AgentStore::new(stacking()).unwrap();
    let scheduler = PlaybackScheduler::new(store, Arc::new(maps));
    let mut sink = RecordingSink::default();
    feed(
        &scheduler,
        r#"{"metadata":{"user":"alice","stack_id":7},"coords":[[5,5,0],[5,5,1]]}"#,
    )
    .await;

    ran(scheduler.tick(6_000.0, &mut sink));
    ran(scheduler.tick(6_001.0, &mut sink));
    assert!(sink.draws.is_empty());
}

#[tokio::test]
async fn oversized_paths_are_truncated() {
    let scheduler = scheduler(stacking());
    let coords: Vec<String> = (0..3000).map(|x| format!("[{x},0,0]")).collect();
    let frame = format!(
        r#"{{"metadata":{{"user":"alice","stack_id":7}},"coords":[{}]}}"#,
        coords.join(",")
    );
    feed(&scheduler, &frame).await;

    let store = scheduler.store().lock().await;
    let batch = store.get(&alice()).unwrap().current().unwrap();
    assert_eq!(batch.len(), 2048);
    assert_eq!(batch.last_point().unwrap().x, 2999);
}
