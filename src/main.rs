use std::time::Instant;

use anyhow::Context;
use dame_flame::algorithm::matching::Matcher;
use dame_flame::data::{UniformDataSpec, generate_uniform_given_importance, split_holdout};
use dame_flame::utils::logging::console;
use dame_flame::{Algorithm, MatchingConfig, ate, att};
use log::info;

fn main() -> anyhow::Result<()> {
    // Setup logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Optional JSON configuration as first argument
    let config = match std::env::args().nth(1) {
        Some(path) => MatchingConfig::from_json_file(&path)
            .with_context(|| format!("Failed to load configuration from {path}"))?,
        None => MatchingConfig::default(),
    };

    let start = Instant::now();
    let spec = UniformDataSpec {
        seed: config.seed,
        ..UniformDataSpec::default()
    };
    let data = generate_uniform_given_importance(&spec)?;
    let (matching, holdout) = split_holdout(&data, config.holdout_fraction, config.seed)?;
    info!(
        "Generated {} units in {:?} ({} matching, {} holdout)",
        data.num_units(),
        start.elapsed(),
        matching.num_units(),
        holdout.num_units()
    );

    let mut primary = None;
    for algorithm in [Algorithm::Dame, Algorithm::Flame] {
        let run_config = MatchingConfig {
            algorithm,
            ..config.clone()
        };
        let result = Matcher::new(run_config).perform_matching(&matching, Some(&holdout))?;

        console::print_result_summary(&result);
        console::print_groups(&result, 5);
        info!(
            "{algorithm}: ATE {:?}, ATT {:?} (true effect {})",
            ate(&matching, &result),
            att(&matching, &result),
            spec.treatment_effect
        );

        if algorithm == config.algorithm {
            primary = Some(result);
        }
    }

    if let Some(result) = primary {
        println!("{}", serde_json::to_string_pretty(&result)?);
    }

    Ok(())
}
