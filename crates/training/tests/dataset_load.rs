mod common;

use common::{write_kitti_pair, B};
use training::{BatchSource, DatasetError, KittiRoadDataset};

#[test]
fn batches_cover_every_sample_each_pass() {
    let tmp = tempfile::tempdir().unwrap();
    for stem in ["um_000000", "um_000001", "umm_000000"] {
        write_kitti_pair(tmp.path(), stem, 80, 40);
    }
    let dataset = KittiRoadDataset::open(tmp.path(), [32, 64], 2, Some(9)).unwrap();
    assert_eq!(dataset.len(), 3);

    let device = Default::default();
    for _ in 0..2 {
        let sizes: Vec<usize> = BatchSource::<B>::batches(&dataset, 2, &device)
            .map(|b| b.unwrap().len())
            .collect();
        assert_eq!(sizes, [2, 1]);
    }
}

#[test]
fn labels_are_one_hot_road_masks() {
    let tmp = tempfile::tempdir().unwrap();
    write_kitti_pair(tmp.path(), "uu_000007", 64, 32);
    let dataset = KittiRoadDataset::open(tmp.path(), [32, 64], 2, Some(1)).unwrap();
    let device = Default::default();
    let batch = BatchSource::<B>::batches(&dataset, 4, &device)
        .next()
        .unwrap()
        .unwrap();
    assert_eq!(batch.images.dims(), [1, 3, 32, 64]);
    assert_eq!(batch.labels.dims(), [1, 2, 32, 64]);

    let pixels = batch.images.clone().into_data().to_vec::<f32>().unwrap();
    assert!(pixels.iter().all(|v| (0.0..=1.0).contains(v)));

    let labels = batch.labels.into_data().to_vec::<f32>().unwrap();
    let plane = 32 * 64;
    for i in 0..plane {
        assert_eq!(labels[i] + labels[plane + i], 1.0);
    }
    // Row 0 is background, the last row is road.
    assert_eq!(labels[0], 1.0);
    assert_eq!(labels[plane + (plane - 1)], 1.0);
}

#[test]
fn missing_ground_truth_is_reported() {
    let tmp = tempfile::tempdir().unwrap();
    write_kitti_pair(tmp.path(), "um_000000", 64, 32);
    std::fs::copy(
        tmp.path().join("image_2/um_000000.png"),
        tmp.path().join("image_2/um_000001.png"),
    )
    .unwrap();
    let err = KittiRoadDataset::open(tmp.path(), [32, 64], 2, None).err().unwrap();
    assert!(matches!(err, DatasetError::MissingLabel { .. }), "{err}");
}

#[test]
fn missing_directory_is_an_error() {
    let tmp = tempfile::tempdir().unwrap();
    assert!(KittiRoadDataset::open(&tmp.path().join("nope"), [32, 64], 2, None).is_err());
}
