//! Sample command implementation

use ndarray::Axis;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::cli::logging::log;
use crate::cli::LogLevel;
use crate::config::{load_config, LeakGanConfig, SampleArgs};
use crate::generative::leak_gan::truncate_at_end;
use crate::generative::{DiscriminatorConfig, LeakGanGenerator, PooledDiscriminator};

/// Reference discriminator matching the generator's vocabulary and feature width
pub fn reference_discriminator(config: &LeakGanConfig, seed: u64) -> PooledDiscriminator {
    PooledDiscriminator::with_seed(
        DiscriminatorConfig {
            vocab_size: config.vocab.size,
            embed_dim: config.embedding_size,
            filter_nums: config.filter_nums.clone(),
            num_classes: (config.reward_class + 1).max(2),
            pad_idx: config.vocab.pad_idx,
        },
        seed,
    )
}

/// Render one sequence of token ids
pub fn format_sequence(tokens: &[u32]) -> String {
    tokens
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn run_sample(args: SampleArgs, level: LogLevel) -> Result<(), String> {
    let config = load_config(&args.config).map_err(|e| format!("Config error: {e}"))?;
    let num = args.num.unwrap_or(config.eval_generate_num);

    let dis = reference_discriminator(&config, args.seed.wrapping_add(1));
    let generator = LeakGanGenerator::with_seed(config, args.seed)
        .map_err(|e| format!("Generator error: {e}"))?;
    let mut rng = StdRng::seed_from_u64(args.seed.wrapping_add(2));

    log(
        level,
        LogLevel::Verbose,
        &format!("Sampling {num} sequences (train={})", args.train),
    );
    let mut samples = generator
        .sample(num, &dis, &mut rng, args.train)
        .map_err(|e| format!("Sampling failed: {e}"))?;

    let vocab = &generator.config.vocab;
    for mut row in samples.axis_iter_mut(Axis(0)) {
        truncate_at_end(row.view_mut(), vocab.end_idx, vocab.pad_idx);
        println!("{}", format_sequence(&row.to_vec()));
    }

    Ok(())
}
