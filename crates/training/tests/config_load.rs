use std::path::PathBuf;

use training::{ConfigError, RunConfig};

#[test]
fn partial_file_keeps_defaults() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("run.toml");
    std::fs::write(
        &path,
        "epochs = 2\nimage_shape = [64, 128]\ndata_dir = \"/data/kitti\"\n",
    )
    .unwrap();
    let cfg = RunConfig::from_path(&path).unwrap();
    assert_eq!(cfg.epochs, 2);
    assert_eq!(cfg.image_shape, [64, 128]);
    assert_eq!(cfg.batch_size, 5);
    assert_eq!(cfg.vgg_path(), PathBuf::from("/data/kitti/vgg"));
    assert_eq!(cfg.training_dir(), PathBuf::from("/data/kitti/data_road/training"));
    assert!(cfg.validate().is_ok());
}

#[test]
fn bad_toml_names_the_file() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("broken.toml");
    std::fs::write(&path, "epochs = \"many\"").unwrap();
    let err = RunConfig::from_path(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert!(err.to_string().contains("broken.toml"));
}

#[test]
fn zero_epochs_rejected() {
    let cfg = RunConfig {
        epochs: 0,
        ..Default::default()
    };
    assert!(matches!(cfg.validate(), Err(ConfigError::NoEpochs)));
}

#[test]
fn runs_dir_in_file_moves_every_output() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("run.toml");
    std::fs::write(&path, "runs_dir = \"/out\"\n").unwrap();
    let cfg = RunConfig::from_path(&path).unwrap();
    assert_eq!(cfg.plot_file(), PathBuf::from("/out/training.png"));
    assert_eq!(cfg.checkpoint_path(), PathBuf::from("/out/model"));
    assert_eq!(cfg.video_output_dir(), PathBuf::from("/out/video"));
}

#[test]
fn explicit_outputs_win_over_runs_dir() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("run.toml");
    std::fs::write(
        &path,
        "runs_dir = \"/out\"\ncheckpoint = \"/ckpt/model.ckpt\"\nplot_path = \"/plots/loss.png\"\n",
    )
    .unwrap();
    let cfg = RunConfig::from_path(&path).unwrap();
    assert_eq!(cfg.checkpoint_path(), PathBuf::from("/ckpt/model.ckpt"));
    assert_eq!(cfg.plot_file(), PathBuf::from("/plots/loss.png"));
    assert_eq!(cfg.video_output_dir(), PathBuf::from("/out/video"));
}
