// training.rs
// Description: End to end training, prediction and checkpoint tests for the sequential model.

use ndarray::{array, Array2};
use pretty_assertions::assert_eq;

use stroke_mlp::dataset::one_hot;
use stroke_mlp::{
    Activation, BatchNormConfig, Component, Dataset, DenseSpec, Loss, MlpError, OptimizerConfig, Sequential,
    TrainingConfig,
};

fn xor() -> (Array2<f32>, Array2<f32>) {
    (
        array![[0.0_f32, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]],
        array![[0.0_f32], [1.0], [1.0], [0.0]],
    )
}

fn xor_model() -> Sequential {
    let mut model = Sequential::with_seed(2024);
    model.add(DenseSpec::new(8).with_input_dim(2)).unwrap();
    model.add(Activation::Tanh).unwrap();
    model.add(DenseSpec::new(1)).unwrap();
    model.add(Activation::Sigmoid).unwrap();
    model
        .compile(Loss::MeanSquaredError, OptimizerConfig::AdamW { weight_decay: 0.0 }, 0.05)
        .unwrap();
    model
}

// Three well separated groups of 2D points, one label per group.
fn blobs() -> Dataset {
    let v_centers = [(0.0_f32, 0.0_f32), (4.0, 4.0), (-4.0, 4.0)];
    let v_offsets = [(-0.3_f32, 0.2_f32), (0.1, -0.4), (0.35, 0.3), (-0.2, -0.1), (0.0, 0.45)];

    let mut v_inputs: Vec<f32> = Vec::new();
    let mut v_labels: Vec<usize> = Vec::new();
    for (i_label, (d_cx, d_cy)) in v_centers.iter().enumerate() {
        for (d_ox, d_oy) in v_offsets.iter() {
            v_inputs.push(d_cx + d_ox);
            v_inputs.push(d_cy + d_oy);
            v_labels.push(i_label);
        }
    }

    let a_inputs = Array2::from_shape_vec((v_labels.len(), 2), v_inputs).unwrap();
    Dataset::new(a_inputs, one_hot(&v_labels, 3).unwrap()).unwrap()
}

#[test]
fn xor_is_learned() {
    let (a_x, a_y) = xor();
    let mut model = xor_model();
    let config = TrainingConfig {
        i_epochs: 1500,
        i_batch_size: 4,
        ..TrainingConfig::default()
    };

    let history = model.fit(&a_x, &a_y, &config).unwrap();
    assert!(history.final_loss().unwrap() < history.v_epoch_losses[0]);

    let a_pred = model.predict(&a_x).unwrap();
    let v_rounded: Vec<f32> = a_pred.iter().map(|d| d.round()).collect();
    assert_eq!(v_rounded, vec![0.0, 1.0, 1.0, 0.0]);
    assert!(model.evaluate(&a_x, &a_y).unwrap() < 0.05);
}

#[test]
fn softmax_classifier_separates_blobs() {
    let dataset = blobs();
    let mut model = Sequential::with_seed(7);
    model.add(DenseSpec::new(8).with_input_dim(2)).unwrap();
    model.add(Activation::Relu).unwrap();
    model.add(DenseSpec::new(3).with_activation(Activation::Softmax)).unwrap();

    let config = TrainingConfig {
        i_epochs: 200,
        i_batch_size: 5,
        d_learning_rate: 0.02,
        loss: Loss::CategoricalCrossEntropy,
        optimizer: OptimizerConfig::AdamW { weight_decay: 0.0 },
        ..TrainingConfig::default()
    };
    model.compile_from_config(&config).unwrap();
    model.fit_dataset(&dataset, &config).unwrap();

    let v_expected: Vec<usize> = (0..15).map(|i| i / 5).collect();
    assert_eq!(model.predict_classes(&dataset.inputs).unwrap(), v_expected);

    let a_probs = model.predict(&dataset.inputs).unwrap();
    for a_row in a_probs.rows() {
        assert!((a_row.sum() - 1.0).abs() < 1e-4);
    }
}

#[test]
fn dropout_and_batch_norm_train_and_predict_deterministically() {
    let dataset = blobs();
    let mut model = Sequential::with_seed(11);
    model.add(DenseSpec::new(6).with_input_dim(2)).unwrap();
    model.add(BatchNormConfig::default()).unwrap();
    model.add(Activation::Relu).unwrap();
    model.add(Component::Dropout(0.2)).unwrap();
    model.add(DenseSpec::new(3).with_activation(Activation::Softmax)).unwrap();

    let config = TrainingConfig {
        i_epochs: 20,
        i_batch_size: 5,
        loss: Loss::CategoricalCrossEntropy,
        ..TrainingConfig::default()
    };
    model.compile_from_config(&config).unwrap();
    let history = model.fit_dataset(&dataset, &config).unwrap();
    assert!(history.v_epoch_losses.iter().all(|d| d.is_finite()));

    // eval mode: no dropout, running statistics, so repeated predictions agree
    let a_first = model.predict(&dataset.inputs).unwrap();
    let a_second = model.predict(&dataset.inputs).unwrap();
    assert_eq!(a_first, a_second);
}

#[test]
fn checkpoint_file_round_trip() {
    let (a_x, a_y) = xor();
    let mut model = xor_model();
    model.add(Component::Dropout(0.1)).unwrap();
    let config = TrainingConfig {
        i_epochs: 50,
        i_batch_size: 2,
        ..TrainingConfig::default()
    };
    model.fit(&a_x, &a_y, &config).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let p_path = dir.path().join("checkpoints").join("xor.json");
    model.save_checkpoint(&p_path).unwrap();

    let mut rebuilt = Sequential::load_checkpoint_rebuild(&p_path).unwrap();
    assert_eq!(rebuilt.summary(), model.summary());
    assert_eq!(rebuilt.loss(), Some(Loss::MeanSquaredError));
    assert_eq!(rebuilt.predict(&a_x).unwrap(), model.predict(&a_x).unwrap());

    let mut same_shape = xor_model();
    same_shape.add(Component::Dropout(0.1)).unwrap();
    same_shape.load_checkpoint(&p_path).unwrap();
    assert_eq!(same_shape.predict(&a_x).unwrap(), model.predict(&a_x).unwrap());

    let mut other_shape = Sequential::new();
    other_shape.add(DenseSpec::new(3).with_input_dim(2)).unwrap();
    assert!(matches!(
        other_shape.load_checkpoint(&p_path),
        Err(MlpError::Checkpoint(_))
    ));
}

#[test]
fn corrupt_checkpoint_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let p_path = dir.path().join("bad.json");

    std::fs::write(&p_path, "{\"s_magic\": \"nope\"}").unwrap();
    assert!(Sequential::load_checkpoint_rebuild(&p_path).is_err());

    std::fs::write(&p_path, "").unwrap();
    assert!(Sequential::load_checkpoint_rebuild(&p_path).is_err());

    assert!(Sequential::load_checkpoint_rebuild(dir.path().join("missing.json")).is_err());
}
