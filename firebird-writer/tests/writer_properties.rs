// End-to-end checks of both writers against the documents they produce
use firebird_writer::types::{POST_TIME_ATTRIBUTE, PRE_TIME_ATTRIBUTE};
use firebird_writer::{
    load_document, BatchWriter, DexDocument, FilterConfig, RunSummary, StepPoint, StreamSignal,
    StreamingWriter, Track, Trajectory, TrajectoryPoint, Vec3,
};
use std::path::PathBuf;
use tempfile::TempDir;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn track(track_id: i32, parent_id: i32, name: &str, p: f64) -> Track {
    Track {
        track_id,
        parent_id,
        pdg: if name == "opticalphoton" { -22 } else { 211 },
        name: name.to_string(),
        charge: if name == "opticalphoton" { 0.0 } else { 1.0 },
        momentum: Vec3::new(0.0, p, 0.0),
        vertex: Vec3::default(),
        global_time: Some(0.0),
    }
}

fn z_point(index: usize, z: f64) -> TrajectoryPoint {
    let attribute = if index == 0 { PRE_TIME_ATTRIBUTE } else { POST_TIME_ATTRIBUTE };
    TrajectoryPoint::rich_with_time(Vec3::new(0.0, 0.0, z), attribute, format!("{}.5 ns", index))
}

fn trajectory(track: Track, zs: &[f64]) -> Trajectory {
    let points = zs.iter().enumerate().map(|(i, z)| z_point(i, *z)).collect();
    Trajectory::new(track, points)
}

fn output_path(dir: &TempDir) -> PathBuf {
    dir.path().join("run.firebird.json")
}

/// Push `steps` straight-line steps along z for every track of one event
fn stream_tracks(writer: &mut StreamingWriter, event_id: i64, tracks: &[Track], steps: usize) {
    for track in tracks {
        for i in 0..steps {
            let z0 = i as f64 * 10.0;
            let pre = StepPoint::new(Vec3::new(0.0, 0.0, z0), z0 * 0.1);
            let post = StepPoint::new(Vec3::new(0.0, 0.0, z0 + 10.0), (z0 + 10.0) * 0.1);
            writer.on_step(0, event_id, track, pre, post).unwrap();
        }
    }
}

fn written_document(summary: &RunSummary) -> DexDocument {
    let path = summary.output.as_ref().expect("document should have been written");
    let document = load_document(path).unwrap();
    document.validate().unwrap();
    document
}

fn assert_structural_invariants(document: &DexDocument) {
    assert_eq!(document.origin.entries_count, document.events.len());
    for event in &document.events {
        assert_eq!(event.groups.len(), 1);
        assert!(!event.groups[0].trajectories.is_empty());
        for trajectory in &event.groups[0].trajectories {
            assert!(!trajectory.points.is_empty());
            for point in &trajectory.points {
                assert_eq!(point.len(), 5);
                assert!(point.iter().all(|v| v.is_finite()));
                assert_eq!(point[4], 0.0);
            }
        }
    }
}

#[test]
fn test_batch_five_tracks_three_secondaries() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let config = FilterConfig::new()
        .with_output_file(output_path(&dir))
        .with_only_primary(true);
    let mut writer = BatchWriter::new(config).unwrap();

    let trajectories: Vec<Trajectory> = [0, 1, 0, 2, 3]
        .iter()
        .enumerate()
        .map(|(i, parent)| trajectory(track(i as i32 + 1, *parent, "pi+", 1000.0), &[0.0, 5.0, 10.0]))
        .collect();
    writer.process_event(7, &trajectories).unwrap();

    let summary = writer.close();
    assert_eq!(summary.stats.total, 5);
    assert_eq!(summary.stats.saved, 2);
    assert_eq!(summary.stats.filtered, 3);

    let document = written_document(&summary);
    assert_structural_invariants(&document);
    assert_eq!(document.events[0].groups[0].trajectories.len(), 2);
}

#[test]
fn test_streaming_five_tracks_three_secondaries() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let config = FilterConfig::new()
        .with_output_file(output_path(&dir))
        .with_only_primary(true);
    let mut writer = StreamingWriter::new(config).unwrap();
    writer.open().unwrap();

    let tracks: Vec<Track> = [0, 1, 0, 2, 3]
        .iter()
        .enumerate()
        .map(|(i, parent)| track(i as i32 + 1, *parent, "pi+", 1000.0))
        .collect();
    stream_tracks(&mut writer, 7, &tracks, 3);

    let summary = writer.close().unwrap();
    assert_eq!(summary.stats.total, 5);
    assert_eq!(summary.stats.saved, 2);
    assert_eq!(summary.stats.filtered, 3);
    assert_eq!(summary.stats.steps_seen, 15);

    let document = written_document(&summary);
    assert_structural_invariants(&document);
    let trajectories = &document.events[0].groups[0].trajectories;
    assert_eq!(trajectories.len(), 2);
    // First step contributes both of its points
    assert_eq!(trajectories[0].points.len(), 4);
}

#[test]
fn test_batch_step_filter_leaves_single_point() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let config = FilterConfig::new()
        .with_output_file(output_path(&dir))
        .with_step_cut(-100.0, 100.0, 5000.0);
    let mut writer = BatchWriter::new(config).unwrap();

    let emitted = writer
        .process_event(1, &[trajectory(track(1, 0, "pi+", 1000.0), &[-150.0, 0.0, 150.0])])
        .unwrap();
    assert!(!emitted);

    let summary = writer.close();
    assert_eq!(summary.stats.steps_filtered, 2);
    assert_eq!(summary.stats.filtered, 1);
    assert_eq!(summary.stats.saved, 0);
    assert!(!summary.wrote_output());
    assert!(!output_path(&dir).exists());
}

#[test]
fn test_streaming_step_filter_leaves_single_point() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let config = FilterConfig::new()
        .with_output_file(output_path(&dir))
        .with_step_cut(-100.0, 100.0, 5000.0);
    let mut writer = StreamingWriter::new(config).unwrap();
    writer.open().unwrap();

    let t = track(1, 0, "pi+", 1000.0);
    let at = |z: f64| StepPoint::new(Vec3::new(0.0, 0.0, z), 0.0);
    writer.on_step(0, 1, &t, at(-150.0), at(0.0)).unwrap();
    writer.on_step(0, 1, &t, at(0.0), at(150.0)).unwrap();

    let summary = writer.close().unwrap();
    assert_eq!(summary.stats.steps_filtered, 2);
    assert_eq!(summary.stats.filtered, 1);
    assert!(!summary.wrote_output());
}

#[test]
fn test_streaming_default_length_threshold_still_writes_tracks() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let config = FilterConfig::stepping_defaults().with_output_file(output_path(&dir));
    assert_eq!(config.track_length_min, 0.0);

    let mut writer = StreamingWriter::new(config).unwrap();
    writer.open().unwrap();
    stream_tracks(&mut writer, 0, &[track(1, 0, "pi+", 1000.0), track(2, 0, "pi+", 2000.0)], 4);

    let summary = writer.close().unwrap();
    assert_eq!(summary.stats.saved, 2);

    let document = written_document(&summary);
    assert_eq!(document.trajectory_count(), 2);
    assert_eq!(document.point_count(), 10);
}

#[test]
fn test_streaming_length_threshold_rejects_short_tracks() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let config = FilterConfig::new()
        .with_output_file(output_path(&dir))
        .with_track_length_min(25.0);

    let mut writer = StreamingWriter::new(config).unwrap();
    writer.open().unwrap();
    // 20 mm and 40 mm long
    stream_tracks(&mut writer, 0, &[track(1, 0, "pi+", 1000.0)], 2);
    stream_tracks(&mut writer, 0, &[track(2, 0, "pi+", 1000.0)], 4);

    let summary = writer.close().unwrap();
    assert_eq!(summary.stats.saved, 1);
    assert_eq!(summary.stats.filtered, 1);
}

#[test]
fn test_optical_photon_override() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let config = FilterConfig::stepping_defaults()
        .with_output_file(output_path(&dir))
        .with_save_optical(true);

    let mut photon = track(5, 3, "opticalphoton", 1e-6);
    photon.vertex = Vec3::new(0.0, 0.0, 9000.0);

    let mut writer = StreamingWriter::new(config).unwrap();
    writer.open().unwrap();
    stream_tracks(&mut writer, 0, &[photon, track(6, 3, "pi+", 1e-6)], 2);

    let summary = writer.close().unwrap();
    assert_eq!(summary.stats.saved, 1);
    assert_eq!(summary.stats.filtered, 1);

    let document = written_document(&summary);
    assert_eq!(document.events[0].groups[0].trajectories[0].params[1], "opticalphoton");
}

#[test]
fn test_momentum_bounds_are_inclusive() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let config = FilterConfig::new()
        .with_output_file(output_path(&dir))
        .with_momentum_range(100.0, 200.0);
    let mut writer = BatchWriter::new(config).unwrap();

    let zs = [0.0, 1.0];
    let trajectories = vec![
        trajectory(track(1, 0, "pi+", 100.0), &zs),
        trajectory(track(2, 0, "pi+", 200.0), &zs),
        trajectory(track(3, 0, "pi+", 99.0), &zs),
        trajectory(track(4, 0, "pi+", 201.0), &zs),
    ];
    writer.process_event(0, &trajectories).unwrap();

    let stats = writer.stats();
    assert_eq!(stats.saved, 2);
    assert_eq!(stats.filtered, 2);
}

#[test]
fn test_batch_times_follow_units() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let mut writer = BatchWriter::new(FilterConfig::new().with_output_file(output_path(&dir))).unwrap();

    let points = vec![
        TrajectoryPoint::rich_with_time(Vec3::new(0.0, 0.0, 0.0), PRE_TIME_ATTRIBUTE, "10.2 ns"),
        TrajectoryPoint::rich_with_time(Vec3::new(0.0, 0.0, 1.0), POST_TIME_ATTRIBUTE, "10.2"),
        TrajectoryPoint::rich_with_time(Vec3::new(0.0, 0.0, 2.0), POST_TIME_ATTRIBUTE, "2 us"),
        TrajectoryPoint::rich_with_time(Vec3::new(0.0, 0.0, 3.0), POST_TIME_ATTRIBUTE, "1 s"),
        TrajectoryPoint::rich_with_time(Vec3::new(0.0, 0.0, 4.0), POST_TIME_ATTRIBUTE, "7 fortnights"),
    ];
    writer
        .process_event(0, &[Trajectory::new(track(1, 0, "pi+", 1000.0), points)])
        .unwrap();

    let document = written_document(&writer.close());
    let trajectory = &document.events[0].groups[0].trajectories[0];
    let times: Vec<f64> = trajectory.points.iter().map(|p| p[3]).collect();
    assert_eq!(times, vec![10.2, 10.2, 2000.0, 1e9, 7.0]);
    // Parameter time comes from the first point
    assert_eq!(trajectory.params[14], 10.2);
}

#[test]
fn test_mixed_events_entries_count() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let config = FilterConfig::new()
        .with_output_file(output_path(&dir))
        .with_only_primary(true);
    let mut writer = StreamingWriter::new(config).unwrap();
    writer.open().unwrap();

    stream_tracks(&mut writer, 1, &[track(1, 0, "pi+", 1000.0)], 2);
    // Only secondaries: event is dropped
    stream_tracks(&mut writer, 2, &[track(1, 4, "pi+", 1000.0)], 2);
    stream_tracks(&mut writer, 3, &[track(1, 0, "pi+", 1000.0)], 2);

    let summary = writer.close().unwrap();
    assert_eq!(summary.stats.events_seen, 3);
    assert_eq!(summary.stats.events_written, 2);

    let document = written_document(&summary);
    assert_structural_invariants(&document);
    let ids: Vec<i64> = document.events.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![1, 3]);
}

#[test]
fn test_explicit_signals_match_inferred_boundaries() {
    init_logging();
    let dir = TempDir::new().unwrap();

    let t = track(1, 0, "pi+", 1000.0);
    let pre = StepPoint::new(Vec3::new(0.0, 0.0, 0.0), 0.0);
    let post = StepPoint::new(Vec3::new(0.0, 0.0, 10.0), 1.0);

    let inferred = {
        let mut writer =
            StreamingWriter::new(FilterConfig::new().with_output_file(output_path(&dir))).unwrap();
        writer.open().unwrap();
        writer.on_step(0, 1, &t, pre, post).unwrap();
        let summary = writer.close().unwrap();
        std::fs::read(summary.output.unwrap()).unwrap()
    };

    let explicit = {
        let mut writer =
            StreamingWriter::new(FilterConfig::new().with_output_file(output_path(&dir))).unwrap();
        writer.open().unwrap();
        writer
            .process(StreamSignal::NewEvent { run_id: 0, event_id: 1 })
            .unwrap();
        writer.process(StreamSignal::NewTrack(t.clone())).unwrap();
        writer
            .process(StreamSignal::Step { track_id: 1, pre, post })
            .unwrap();
        let summary = writer.close().unwrap();
        std::fs::read(summary.output.unwrap()).unwrap()
    };

    assert_eq!(inferred, explicit);
}

#[test]
fn test_identical_input_gives_identical_bytes() {
    init_logging();
    let dir = TempDir::new().unwrap();

    let run = || {
        let config = FilterConfig::new().with_output_file(output_path(&dir));
        let mut writer = BatchWriter::new(config).unwrap();
        for event_id in 0..3 {
            let trajectories: Vec<Trajectory> = (0..4)
                .map(|i| {
                    let zs: Vec<f64> = (0..5).map(|k| (k * (i + 1)) as f64 * 0.37).collect();
                    trajectory(track(i + 1, 0, "pi+", 500.0 + i as f64 * 3.3), &zs)
                })
                .collect();
            writer.process_event(event_id, &trajectories).unwrap();
        }
        let summary = writer.close();
        std::fs::read(summary.output.unwrap()).unwrap()
    };

    assert_eq!(run(), run());
}
