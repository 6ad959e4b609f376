use burn::backend::NdArray;
use burn::tensor::{Tensor, TensorData};
use training::objective::{optimize, scalar};

type B = NdArray<f32>;

fn one_hot(rows: &[usize], classes: usize) -> Vec<f32> {
    let mut out = vec![0.0; rows.len() * classes];
    for (i, c) in rows.iter().enumerate() {
        out[i * classes + c] = 1.0;
    }
    out
}

/// `[1, classes, 1, pixels]` from per-pixel class rows.
fn class_map(rows: Vec<f32>, classes: usize) -> Tensor<B, 4> {
    let pixels = rows.len() / classes;
    let mut planar = vec![0.0; rows.len()];
    for p in 0..pixels {
        for c in 0..classes {
            planar[c * pixels + p] = rows[p * classes + c];
        }
    }
    Tensor::from_data(TensorData::new(planar, [1, classes, 1, pixels]), &Default::default())
}

#[test]
fn uniform_scores_cost_log_classes() {
    let labels = class_map(one_hot(&[0, 1, 1, 0], 2), 2);
    let scores = Tensor::<B, 4>::zeros([1, 2, 1, 4], &Default::default());
    let objective = optimize(scores, labels, 1e-3, 2);
    let loss = scalar(objective.loss);
    assert!((loss - std::f32::consts::LN_2).abs() < 1e-5, "{loss}");
    assert_eq!(objective.logits.dims(), [4, 2]);
    assert_eq!(objective.learning_rate, 1e-3);
}

#[test]
fn confident_correct_scores_cost_nearly_nothing() {
    let rows = one_hot(&[2, 0, 1], 3);
    let scores = class_map(rows.iter().map(|v| v * 50.0).collect(), 3);
    let labels = class_map(rows, 3);
    let loss = scalar(optimize(scores, labels, 1e-3, 3).loss);
    assert!((0.0..1e-4).contains(&loss), "{loss}");
}

#[test]
fn loss_is_never_negative() {
    let labels = class_map(one_hot(&[1, 0], 2), 2);
    let scores = class_map(vec![3.0, -2.0, 0.5, 4.0], 2);
    assert!(scalar(optimize(scores, labels, 1e-3, 2).loss) >= 0.0);
}
