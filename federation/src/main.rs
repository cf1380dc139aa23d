use std::{env, io, num::NonZeroUsize};

use federation::{
    Dataset, Federation, Role,
    cropper::{self, Cropper, IMAGE_BYTES, IMAGE_SIZE, PATCH_SIZE},
};
use link::{LinkConfig, discovery, gatt::WEIGHT_SERVICE, loopback};
use log::{info, warn};
use mlp::{InputTransform, LayerSpec, Model, model::DEFAULT_LEARNING_RATE};
use rand::{Rng, SeedableRng, rngs::StdRng};
use tokio::signal;

const CLASSES: usize = 4;
const SAMPLES_PER_CLASS: usize = 6;
const ROUND_RETRIES: usize = 3;

/// Renders one card: background bits set, a class-specific glyph cleared.
fn packed_card(class: usize, x0: usize, y0: usize) -> Vec<u8> {
    let mut image = vec![0xFFu8; IMAGE_BYTES];
    let mut clear = |x: usize, y: usize| {
        image[y * IMAGE_SIZE / 8 + x / 8] &= !(0x80 >> (x % 8));
    };

    match class {
        // Solid square.
        0 => {
            for y in y0..y0 + 20 {
                for x in x0..x0 + 20 {
                    clear(x, y);
                }
            }
        }
        // Square ring.
        1 => {
            for y in y0..y0 + 24 {
                for x in x0..x0 + 24 {
                    let border = y < y0 + 3 || y >= y0 + 21 || x < x0 + 3 || x >= x0 + 21;
                    if border {
                        clear(x, y);
                    }
                }
            }
        }
        // Horizontal bar.
        2 => {
            for y in y0..y0 + 8 {
                for x in x0..x0 + 28 {
                    clear(x, y);
                }
            }
        }
        // Vertical bar.
        _ => {
            for y in y0..y0 + 28 {
                for x in x0..x0 + 8 {
                    clear(x, y);
                }
            }
        }
    }
    image
}

/// Builds one node's shard: cropped patches for the classes in `labels`,
/// with jittered glyph positions.
fn build_shard(labels: &[usize], rng: &mut StdRng) -> io::Result<Dataset> {
    let mut cropper = Cropper::new();
    let mut patch = vec![0u8; PATCH_SIZE * PATCH_SIZE];
    let mut data = Dataset::new(PATCH_SIZE * PATCH_SIZE, CLASSES);

    for &label in labels {
        for _ in 0..SAMPLES_PER_CLASS {
            let x0 = rng.random_range(20..IMAGE_SIZE - 50);
            let y0 = rng.random_range(20..IMAGE_SIZE - 50);
            let image = packed_card(label, x0, y0);
            cropper.crop(&image, &mut patch).map_err(io::Error::other)?;
            data.push(cropper::patch_to_input(&patch), label)
                .map_err(io::Error::other)?;
        }
    }
    Ok(data)
}

fn env_usize(name: &str, default: usize) -> io::Result<usize> {
    match env::var(name) {
        Ok(v) => v.parse().map_err(io::Error::other),
        Err(_) => Ok(default),
    }
}

#[tokio::main]
async fn main() -> io::Result<()> {
    env_logger::init();

    let rounds: usize = env_usize("ROUNDS", 5)?;
    let epochs = NonZeroUsize::new(env_usize("EPOCHS", 3)?)
        .ok_or_else(|| io::Error::other("EPOCHS must be nonzero"))?;
    let seed: u64 = env::var("SEED")
        .map(|v| v.parse().map_err(io::Error::other))
        .unwrap_or(Ok(42))?;

    let spec = LayerSpec::new(vec![PATCH_SIZE * PATCH_SIZE, 10, CLASSES])
        .map_err(io::Error::other)?;
    let params = spec.num_params();
    let epoch_count = epochs.get();
    info!(params = params, rounds = rounds, epochs = epoch_count; "starting two-node run");

    // Both nodes share initial parameters, as a deployment distributing one
    // snapshot would.
    let model_a = Model::seeded(
        spec.clone(),
        InputTransform::InvertBits,
        DEFAULT_LEARNING_RATE,
        seed,
    );
    let model_b = model_a.clone();

    let mut rng = StdRng::seed_from_u64(seed);
    let shard_a = build_shard(&[0, 1], &mut rng)?;
    let shard_b = build_shard(&[2, 3], &mut rng)?;
    let held_out = build_shard(&[0, 1, 2, 3], &mut rng)?;

    let mut node_a = Federation::new(model_a, LinkConfig::fast(), epochs);
    let mut node_b = Federation::new(model_b, LinkConfig::fast(), epochs);

    // The responder side holds its link directly; the initiator goes through
    // the scan/discovery handshake.
    let (link_a, mut link_b) = loopback::pair();
    let mut radio = loopback::LoopbackRadio::new(WEIGHT_SERVICE, link_a).appear_after(2);
    let mut link_a = discovery::connect(&mut radio, &WEIGHT_SERVICE, &LinkConfig::fast())
        .await
        .map_err(io::Error::other)?;

    tokio::select! {
        ret = async {
            for round in 1..=rounds {
                run_round_with_retry(
                    round, &mut node_a, &mut node_b, &mut link_a, &mut link_b, &shard_a, &shard_b,
                )
                .await?;
            }
            Ok::<_, io::Error>(())
        } => ret?,
        _ = signal::ctrl_c() => {
            info!("received SIGINT");
            return Ok(());
        }
    }

    let acc_a = node_a.evaluate(&held_out).map_err(io::Error::other)?;
    let acc_b = node_b.evaluate(&held_out).map_err(io::Error::other)?;
    info!(accuracy_a = acc_a, accuracy_b = acc_b; "run finished");
    Ok(())
}

async fn run_round_with_retry<L: link::LinkHandle>(
    round: usize,
    node_a: &mut Federation,
    node_b: &mut Federation,
    link_a: &mut L,
    link_b: &mut L,
    shard_a: &Dataset,
    shard_b: &Dataset,
) -> io::Result<()> {
    for attempt in 1..=ROUND_RETRIES {
        let (res_a, res_b) = tokio::join!(
            node_a.run_round(Role::Initiator, link_a, shard_a),
            node_b.run_round(Role::Responder, link_b, shard_b),
        );
        match (res_a, res_b) {
            (Ok(stats_a), Ok(stats_b)) => {
                info!(
                    round = round,
                    loss_a = stats_a.mean_loss,
                    loss_b = stats_b.mean_loss;
                    "round complete"
                );
                return Ok(());
            }
            (res_a, res_b) => {
                if let Err(e) = res_a {
                    warn!(round = round, attempt = attempt; "initiator round failed: {e}");
                }
                if let Err(e) = res_b {
                    warn!(round = round, attempt = attempt; "responder round failed: {e}");
                }
            }
        }
    }
    Err(io::Error::other(format!(
        "round {round} failed after {ROUND_RETRIES} attempts"
    )))
}
