use hs_checkpoint::{CheckpointError, HeaderError, MAGIC, create, inspect, load, remove_stale};
use hs_core::m;
use hs_model::{Floorplan, GridModel, OwnedState, TransientState};
use hs_project::{LayerDef, ModelDef, SimConfig};
use std::path::Path;

fn model(rows: usize, cols: usize) -> GridModel {
    let layer = |name: &str, has_power: bool| LayerDef {
        name: name.to_string(),
        floorplan: "unused.flp".into(),
        has_power,
        thickness: m(0.0005),
        conductivity: 100.0,
        vol_heat_capacity: 1.75e6,
    };
    let cfg = SimConfig {
        version: 1,
        model: ModelDef {
            rows,
            cols,
            layers: vec![layer("die", true), layer("spreader", false), layer("sink", false)],
        },
        thermal: Default::default(),
        package: Default::default(),
        leakage: Default::default(),
        checkpoint: Default::default(),
    };
    let flp: Floorplan = "a 0.005 0.01 0 0\nb 0.005 0.01 0.005 0\n".parse().unwrap();
    GridModel::alloc(&cfg, vec![flp; 3]).unwrap()
}

fn distinct_state(model: &GridModel) -> OwnedState {
    let mut state = model.alloc_state();
    for (i, t) in state.last_trans.iter_mut().enumerate() {
        *t = 300.0 + i as f64 * 0.125;
    }
    for (i, t) in state.last_temp.iter_mut().enumerate() {
        *t = 400.0 - i as f64 * 0.5;
    }
    state
}

fn bytes_of(path: &Path) -> Vec<u8> {
    std::fs::read(path).unwrap()
}

#[test]
fn create_then_load_reproduces_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ckpt.bin");
    let model = model(4, 4);
    let state = distinct_state(&model);

    create(&path, &model, &state, 0).unwrap();
    let header = inspect(&path).unwrap();
    assert_eq!(header.magic, MAGIC);
    assert_eq!(header.last_index, 0);
    assert_eq!((header.layers, header.rows, header.cols, header.extra), (3, 4, 4, 12));

    let mapped = load(&path, &model, 0).unwrap();
    assert_eq!(mapped.last_trans(), state.last_trans.as_slice());
    assert_eq!(mapped.last_temp(), state.last_temp.as_slice());
    assert_eq!(mapped.cuboid(0, 0, 1), Some(state.last_trans[1]));
    assert_eq!(mapped.cuboid(2, 3, 3), Some(state.last_trans[47]));
    assert_eq!(mapped.cuboid(3, 0, 0), None);
    assert_eq!(mapped.extra(0), Some(state.last_trans[48]));
    assert_eq!(mapped.extra(12), None);
    assert_eq!(mapped.temp(2), Some(state.last_temp[2]));
    mapped.release().unwrap();
}

#[test]
fn in_place_updates_survive_flush_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ckpt.bin");
    let model = model(2, 2);
    create(&path, &model, &distinct_state(&model), 0).unwrap();

    let mut mapped = load(&path, &model, 0).unwrap();
    {
        let (trans, temp) = mapped.split_mut();
        trans[0] = 1234.5;
        temp[0] = 678.25;
    }
    mapped.flush(1).unwrap();
    mapped.release().unwrap();

    assert_eq!(inspect(&path).unwrap().last_index, 1);
    let mapped = load(&path, &model, 1).unwrap();
    assert_eq!(mapped.last_trans()[0], 1234.5);
    assert_eq!(mapped.last_temp()[0], 678.25);
    mapped.release().unwrap();
}

#[test]
fn skipping_an_invocation_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ckpt.bin");
    let model = model(2, 2);
    create(&path, &model, &distinct_state(&model), 0).unwrap();

    let err = load(&path, &model, 1).unwrap_err();
    assert!(matches!(
        err,
        CheckpointError::Invalid {
            source: HeaderError::IndexMismatch {
                found: 0,
                expected: 1
            },
            ..
        }
    ));
}

#[test]
fn dimension_mismatch_leaves_file_and_state_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ckpt.bin");
    let narrow = model(4, 4);
    create(&path, &narrow, &distinct_state(&narrow), 0).unwrap();
    let before = bytes_of(&path);

    let wide = model(4, 8);
    let state = distinct_state(&wide);
    let err = load(&path, &wide, 0).unwrap_err();
    assert!(err.to_string().contains("grid 3x4x4 does not match model 3x4x8"), "{err}");
    assert_eq!(bytes_of(&path), before);
    assert_eq!(state, distinct_state(&wide));
}

#[test]
fn truncated_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ckpt.bin");
    let model = model(2, 2);
    create(&path, &model, &distinct_state(&model), 0).unwrap();
    let bytes = bytes_of(&path);
    std::fs::write(&path, &bytes[..bytes.len() - 8]).unwrap();

    let err = load(&path, &model, 0).unwrap_err();
    assert!(matches!(
        err,
        CheckpointError::Invalid {
            source: HeaderError::SizeMismatch { .. },
            ..
        }
    ));
}

#[test]
fn foreign_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.txt");
    std::fs::write(&path, "definitely not a checkpoint file").unwrap();
    let model = model(2, 2);

    assert!(matches!(
        load(&path, &model, 0).unwrap_err(),
        CheckpointError::Invalid {
            source: HeaderError::BadMagic { .. },
            ..
        }
    ));
    assert!(matches!(
        inspect(&path).unwrap_err(),
        CheckpointError::Invalid {
            source: HeaderError::BadMagic { .. },
            ..
        }
    ));
}

#[test]
fn second_mapping_is_busy() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ckpt.bin");
    let model = model(2, 2);
    create(&path, &model, &distinct_state(&model), 0).unwrap();

    let held = load(&path, &model, 0).unwrap();
    assert!(matches!(
        load(&path, &model, 0).unwrap_err(),
        CheckpointError::Busy { .. }
    ));
    held.release().unwrap();
    load(&path, &model, 0).unwrap().release().unwrap();
}

#[test]
fn missing_checkpoint_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load(&dir.path().join("absent.bin"), &model(2, 2), 0).unwrap_err();
    assert!(matches!(err, CheckpointError::Io { .. }));
}

#[test]
fn stale_removal_reports_whether_a_file_existed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ckpt.bin");
    let model = model(2, 2);
    create(&path, &model, &distinct_state(&model), 3).unwrap();
    assert!(remove_stale(&path).unwrap());
    assert!(!path.exists());
    assert!(!remove_stale(&path).unwrap());
}

#[test]
fn header_serializes_to_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ckpt.bin");
    let model = model(2, 2);
    create(&path, &model, &distinct_state(&model), 5).unwrap();
    let json = serde_json::to_value(inspect(&path).unwrap()).unwrap();
    assert_eq!(json["last_index"], 5);
    assert_eq!(json["cols"], 2);
}
