mod common;

use common::harness;
use pmoplayback::PlaybackEvent;

fn state(is_playing: bool) -> PlaybackEvent {
    PlaybackEvent::StateChanged { is_playing }
}

#[tokio::test]
async fn test_transport_without_player_still_notifies() {
    let mut h = harness(|b| b);

    h.controller.play();
    h.controller.pause();
    h.controller.seek(30.0);
    h.controller.skip_forward();
    h.controller.skip_backward();

    assert_eq!(h.drain(), vec![state(true), state(false)]);
    assert_eq!(h.controller.get_duration(), 0.0);
    assert_eq!(h.controller.current_time(), 0.0);
    assert!(!h.controller.is_playing());
}

#[tokio::test]
async fn test_play_and_pause_drive_player() {
    let mut h = harness(|b| b);
    h.controller.configure("https://cdn/a.mp3", "A").unwrap();
    let player = h.loader.last();
    h.drain();

    h.controller.play();
    assert!(player.is_playing());
    assert!(h.controller.is_playing());

    h.controller.pause();
    assert!(!player.is_playing());
    assert_eq!(h.drain(), vec![state(true), state(false)]);
}

#[tokio::test]
async fn test_seek_uses_whole_seconds() {
    let mut h = harness(|b| b);
    h.controller.configure("https://cdn/a.mp3", "A").unwrap();
    let player = h.loader.last();
    h.drain();

    h.controller.seek(42.8);
    let seeks = player.seeks();
    assert_eq!(seeks.len(), 1);
    assert_eq!(seeks[0].value, 42);
    assert_eq!(seeks[0].timescale, 1);

    // Non-finite positions are ignored
    h.controller.seek(f64::NAN);
    assert_eq!(player.seeks().len(), 1);

    // Seeking never notifies directly
    assert!(h.drain().is_empty());
}

#[tokio::test]
async fn test_set_rate_only_notifies_non_zero_rate() {
    let mut h = harness(|b| b);
    h.controller.configure("https://cdn/a.mp3", "A").unwrap();
    h.drain();

    h.controller.set_rate(0.0);
    assert!(h.drain().is_empty());

    h.controller.set_rate(1.5);
    assert_eq!(h.drain(), vec![state(true)]);

    // Without player the requested rate decides
    let mut bare = harness(|b| b);
    bare.controller.set_rate(0.0);
    bare.controller.set_rate(2.0);
    assert_eq!(bare.drain(), vec![state(true)]);
}

#[tokio::test]
async fn test_get_duration_sanitizes_player_value() {
    let mut h = harness(|b| b);
    h.controller.configure("https://cdn/a.mp3", "A").unwrap();
    let player = h.loader.last();

    assert_eq!(h.controller.get_duration(), 0.0);
    player.set_duration(Some(f64::NAN));
    assert_eq!(h.controller.get_duration(), 0.0);
    player.set_duration(Some(1800.5));
    assert_eq!(h.controller.get_duration(), 1800.5);
}

#[tokio::test]
async fn test_skip_uses_live_position_and_default_step() {
    let mut h = harness(|b| b);
    h.controller.configure("https://cdn/a.mp3", "A").unwrap();
    let player = h.loader.last();
    player.set_duration(Some(600.0));
    player.set_position(100.0);

    h.controller.skip_forward();
    assert_eq!(player.last_seek(), Some(115.0));

    // The mock moved to 115, skipping back reads the new live position
    h.controller.skip_backward();
    assert_eq!(player.last_seek(), Some(100.0));

    h.controller.skip_backward_by(30.0);
    assert_eq!(player.last_seek(), Some(70.0));
}

#[tokio::test]
async fn test_skip_results_stay_within_bounds() {
    let mut h = harness(|b| b);
    h.controller.configure("https://cdn/a.mp3", "A").unwrap();
    let player = h.loader.last();

    let durations = [0.0, 1.0, 59.9, 600.0];
    let starts = [0.0, 0.4, 10.0, 59.0, 600.0, 1000.0];
    let deltas = [-1000.0, -15.0, -0.5, 0.0, 0.5, 15.0, 1000.0];

    for &duration in &durations {
        player.set_duration(Some(duration));
        for &start in &starts {
            for &delta in &deltas {
                player.set_position(start);
                h.controller.skip_forward_by(delta);
                let forward = player.last_seek().unwrap();
                assert!(
                    (0.0..=duration).contains(&forward),
                    "forward {} from {} in {} gave {}",
                    delta,
                    start,
                    duration,
                    forward
                );

                player.set_position(start);
                h.controller.skip_backward_by(delta);
                let backward = player.last_seek().unwrap();
                assert!(
                    (0.0..=duration).contains(&backward),
                    "backward {} from {} in {} gave {}",
                    delta,
                    start,
                    duration,
                    backward
                );
            }
        }
    }
}

#[tokio::test]
async fn test_skip_with_unknown_duration_goes_to_zero() {
    let mut h = harness(|b| b);
    h.controller.configure("https://cdn/a.mp3", "A").unwrap();
    let player = h.loader.last();
    player.set_position(20.0);

    h.controller.skip_forward();
    assert_eq!(player.last_seek(), Some(0.0));
}

#[tokio::test]
async fn test_configured_skip_interval() {
    let mut h = harness(|b| {
        b.config(pmoplayback::PlaybackConfig {
            skip_interval_secs: 30.0,
            ..Default::default()
        })
    });
    h.controller.configure("https://cdn/a.mp3", "A").unwrap();
    let player = h.loader.last();
    player.set_duration(Some(600.0));
    player.set_position(100.0);

    h.controller.skip_forward();
    assert_eq!(player.last_seek(), Some(130.0));
}
