#![cfg(test)]

use std::num::NonZeroUsize;

use link::{LinkConfig, loopback};
use mlp::{InputTransform, LayerSpec, Model, codec};

use crate::{Dataset, Federation, FederationErr, Role};

fn model(seed: u64, learning_rate: f32) -> Model {
    let spec = LayerSpec::new(vec![4, 6, 2]).unwrap();
    Model::seeded(spec, InputTransform::Scale { max: 1.0 }, learning_rate, seed)
}

/// One easily separable sample per class.
fn class_sample(label: usize) -> Vec<f32> {
    match label {
        0 => vec![1.0, 1.0, 0.0, 0.0],
        _ => vec![0.0, 0.0, 1.0, 1.0],
    }
}

fn single_class_dataset(label: usize) -> Dataset {
    let mut data = Dataset::new(4, 2);
    data.push(class_sample(label), label).unwrap();
    data
}

fn both_classes_dataset() -> Dataset {
    let mut data = Dataset::new(4, 2);
    data.push(class_sample(0), 0).unwrap();
    data.push(class_sample(1), 1).unwrap();
    data
}

/// Replays the round's local training phase on a copy of `model` and returns
/// what that node will put on the wire.
fn expected_pack(model: &Model, data: &Dataset, epochs: usize) -> Vec<f32> {
    let mut replay = model.clone();
    for _ in 0..epochs {
        for (input, label) in data.iter() {
            replay.train_one(input, label).unwrap();
        }
    }
    let mut buf = Vec::new();
    codec::pack(&replay, &mut buf);
    buf
}

#[tokio::test]
async fn round_merges_both_models_to_the_pairwise_mean() {
    let epochs = NonZeroUsize::new(3).unwrap();
    let mut node_a = Federation::new(model(11, 0.01), LinkConfig::fast(), epochs);
    let mut node_b = Federation::new(model(12, 0.01), LinkConfig::fast(), epochs);

    let data_a = single_class_dataset(0);
    let data_b = single_class_dataset(1);

    let pack_a = expected_pack(node_a.model(), &data_a, epochs.get());
    let pack_b = expected_pack(node_b.model(), &data_b, epochs.get());
    let mean: Vec<f32> = pack_a
        .iter()
        .zip(&pack_b)
        .map(|(a, b)| (a + b) / 2.0)
        .collect();

    let (mut link_a, mut link_b) = loopback::pair();
    let (res_a, res_b) = tokio::join!(
        node_a.run_round(Role::Initiator, &mut link_a, &data_a),
        node_b.run_round(Role::Responder, &mut link_b, &data_b),
    );

    let stats_a = res_a.unwrap();
    let stats_b = res_b.unwrap();
    assert_eq!(stats_a.samples, 3);
    assert_eq!(stats_b.samples, 3);

    assert_eq!(node_a.model().params(), node_b.model().params());
    assert_eq!(node_a.model().params(), mean.as_slice());
}

#[tokio::test]
async fn repeated_rounds_learn_classes_the_node_never_saw() {
    let epochs = NonZeroUsize::new(5).unwrap();
    // Same seed: both nodes start from identical parameters, so every
    // prediction difference afterwards comes from their disjoint data.
    let mut node_a = Federation::new(model(7, 0.1), LinkConfig::fast(), epochs);
    let mut node_b = Federation::new(model(7, 0.1), LinkConfig::fast(), epochs);

    let data_a = single_class_dataset(0);
    let data_b = single_class_dataset(1);
    let (mut link_a, mut link_b) = loopback::pair();

    for _ in 0..40 {
        let (res_a, res_b) = tokio::join!(
            node_a.run_round(Role::Initiator, &mut link_a, &data_a),
            node_b.run_round(Role::Responder, &mut link_b, &data_b),
        );
        res_a.unwrap();
        res_b.unwrap();
    }

    // After merging, each node classifies the class only its peer trained on.
    let held_out = both_classes_dataset();
    assert_eq!(node_a.evaluate(&held_out).unwrap(), 1.0);
    assert_eq!(node_b.evaluate(&held_out).unwrap(), 1.0);
    assert_eq!(node_a.model().params(), node_b.model().params());
}

#[tokio::test]
async fn empty_dataset_is_rejected_before_touching_the_link() {
    let epochs = NonZeroUsize::new(1).unwrap();
    let mut node = Federation::new(model(3, 0.01), LinkConfig::fast(), epochs);
    let (mut link, _peer) = loopback::pair();

    let empty = Dataset::new(4, 2);
    let err = node
        .run_round(Role::Initiator, &mut link, &empty)
        .await
        .unwrap_err();
    assert!(matches!(err, FederationErr::EmptyDataset));
    assert_eq!(link.writes_sent(), 0);

    assert!(matches!(
        node.evaluate(&empty).unwrap_err(),
        FederationErr::EmptyDataset
    ));
}
