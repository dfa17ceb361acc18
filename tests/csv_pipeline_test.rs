//! Loader -> joiner -> sink pipelines over CSV exports on disk.

use gazejoin::{
    export::{self, OutputFormat, ReportBuilder},
    loader, Column, Config, Preset, RowFilter,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const PUPIL_POSITIONS: &str = "\
pupil_timestamp,world_index,eye_id,confidence,norm_pos_x,norm_pos_y,diameter,method,diameter_3d
100.00,0,0,0.99,0.51,0.49,30.1,3d c++,3.0
100.02,0,1,0.98,0.50,0.50,31.0,3d c++,9.0
100.10,1,0,0.95,0.52,0.48,30.5,3d c++,4.0
100.20,1,0,0.40,0.52,0.48,30.5,3d c++,8.0
100.30,2,0,0.97,0.53,0.47,30.7,3d c++,
101.00,3,0,0.99,0.53,0.47,30.9,3d c++,5.0
";

const FIXATIONS: &str = "\
id,start_timestamp,duration,start_frame_index,end_frame_index,norm_pos_x,norm_pos_y,dispersion,confidence
1,100.00,200.0,0,1,0.51,0.49,1.2,0.97
2,100.25,100.0,2,2,0.53,0.47,0.9,0.96
3,102.00,150.0,4,5,0.40,0.60,1.1,0.93
";

const GAZE_POSITIONS: &str = "\
gaze_timestamp,world_index,confidence,norm_pos_x,norm_pos_y
50.0,0,0.9,0.1,0.1
50.5,0,0.9,0.2,0.2
51.0,1,0.3,0.3,0.3
52.0,2,0.9,0.4,0.4
";

const BLINKS: &str = "\
id,start_timestamp,duration,end_timestamp,start_frame_index,index,end_frame_index,confidence
1,50.4,0.2,50.6,0,0,1,0.8
2,50.9,0.3,51.2,1,1,1,0.7
";

const SURFACE_FIXATIONS: &str = "\
world_timestamp,world_index,fixation_id,start_timestamp,duration,dispersion,norm_pos_x,norm_pos_y,x_scaled,y_scaled,on_surf
50.00,0,11,50.0,600.0,1.0,0.5,0.5,0.5,0.5,True
50.03,1,11,50.0,5000.0,1.0,0.5,0.5,0.5,0.5,False
51.90,2,12,51.9,200.0,1.0,1.5,0.5,1.5,0.5,False
";

fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    path
}

fn load(dir: &TempDir, name: &str, content: &str) -> gazejoin::Table {
    loader::load_csv(&write_file(dir, name, content)).unwrap()
}

fn labels(table: &gazejoin::Table, column: &str) -> Vec<Option<i64>> {
    match table.column(column).unwrap() {
        Column::Label(v) => v.clone(),
        other => panic!("label column is {}", other.type_name()),
    }
}

#[test]
fn pupil_diameter_by_fixation() {
    let dir = TempDir::new().unwrap();
    let pupil = load(&dir, "pupil_positions.csv", PUPIL_POSITIONS);
    let fixations = load(&dir, "fixations.csv", FIXATIONS);

    let left_eye = pupil.filter(&RowFilter::new("eye_id", "0")).unwrap();
    assert_eq!(left_eye.len(), 5);

    let result = Preset::PupilFixations
        .joiner()
        .aggregate_by_event(&left_eye, &fixations, "diameter_3d", 0.8)
        .unwrap();

    // Fixation 1 covers [100.0, 100.2]: 3.0 and 4.0 pass, 8.0 is low confidence.
    // Fixation 2 covers [100.25, 100.35]: its only sample has no diameter.
    // Fixation 3 has no samples at all.
    assert_eq!(result.pairs(), vec![(1, Some(3.5)), (2, None), (3, None)]);
    assert_eq!(result.get(2).unwrap().sample_count, 1);
    assert_eq!(result.get(3).unwrap().sample_count, 0);
}

#[test]
fn gaze_tagged_by_blink_round_trips_through_csv() {
    let dir = TempDir::new().unwrap();
    let gaze = load(&dir, "gaze_positions.csv", GAZE_POSITIONS);
    let blinks = load(&dir, "blinks.csv", BLINKS);

    let tagged = Preset::GazeBlinks
        .joiner()
        .with_label_column("blink_id")
        .tag_samples(&gaze, &blinks)
        .unwrap();
    assert_eq!(
        labels(&tagged.table, "blink_id"),
        vec![None, Some(1), Some(2), None]
    );

    let out = dir.path().join("out").join("gaze_tagged.csv");
    let writer = export::open_output(&out).unwrap();
    export::write_csv(&tagged.table, writer).unwrap();

    let reloaded = loader::load_csv(&out).unwrap();
    let header: Vec<&str> = reloaded.column_names().collect();
    assert_eq!(header.last(), Some(&"blink_id"));
    assert_eq!(reloaded.len(), 4);

    let text = std::fs::read_to_string(&out).unwrap();
    let first_row = text.lines().nth(1).unwrap();
    assert!(first_row.ends_with(','), "unmatched label is empty: {first_row}");
}

#[test]
fn surface_fixations_deduplicated_and_filtered() {
    let dir = TempDir::new().unwrap();
    let gaze = load(&dir, "gaze_positions.csv", GAZE_POSITIONS);
    let surface = load(&dir, "fixations_on_surface_screen.csv", SURFACE_FIXATIONS);

    let result = Preset::SurfaceFixations
        .joiner()
        .summarize_by_event(&gaze, &surface, "norm_pos_x", 0.6, gazejoin::Statistic::Count)
        .unwrap();

    // Fixation 11's first row is on the surface and spans [50.0, 50.6];
    // the later row with a longer duration is ignored. Fixation 12 is off
    // the surface.
    assert_eq!(result.pairs(), vec![(11, Some(2.0))]);
    assert_eq!(result.summary.duplicate_events_dropped, 1);
    assert_eq!(result.summary.invalid_events_skipped, 1);
}

#[test]
fn aggregate_report_written_as_json() {
    let dir = TempDir::new().unwrap();
    let pupil = load(&dir, "pupil_positions.csv", PUPIL_POSITIONS);
    let fixations = load(&dir, "fixations.csv", FIXATIONS);

    let result = Config::default()
        .joiner(Preset::PupilFixations)
        .aggregate_by_event(&pupil, &fixations, "diameter_3d", 0.9)
        .unwrap();

    let builder = ReportBuilder::new();
    let path = export::timestamped_path(dir.path(), "diameter_3d_mean", OutputFormat::Json);
    let writer = export::open_output(&path).unwrap();
    export::write_aggregates(&result, OutputFormat::Json, &builder, writer).unwrap();

    let report: export::AggregateReport =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(report.producer.run_id, builder.run_id().to_string());
    assert_eq!(report.field, "diameter_3d");
    assert_eq!(report.min_confidence, 0.9);
    assert_eq!(report.aggregates.len(), result.rows.len());
    for (written, computed) in report.aggregates.iter().zip(&result.rows) {
        assert_eq!(written.event_id, computed.event_id);
        assert_eq!(written.sample_count, computed.sample_count);
        match (written.value, computed.value) {
            (Some(a), Some(b)) => assert!((a - b).abs() < 1e-9),
            (None, None) => {}
            other => panic!("value mismatch: {other:?}"),
        }
    }
}

#[test]
fn missing_file_is_io_error() {
    let err = loader::load_csv(Path::new("/nonexistent/gaze_positions.csv")).unwrap_err();
    assert!(matches!(err, gazejoin::JoinError::Io(_)));
}
