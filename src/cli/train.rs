// SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{ArgMatches, Args, Command, FromArgMatches};

use crate::dictionary::MutableDictionary;
use crate::feature::AttributeIndex;
use crate::io::feature_list::read_feature_list;
use crate::io::model::write_model;
use crate::io::training_data::read_training_data;
use crate::preprocess::Preprocessor;
use crate::train::{Regularization, TrainConfig, Trainer};
use crate::types::Alphabet;

pub const COMMAND_NAME: &str = "train";

#[derive(Args, Debug)]
#[command(about = "Train a variable-order CRF model from labelled data", long_about = None)]
struct CliArgs {
    /// Path to the training-data file (spec.md §6 token-per-line format).
    training_data: PathBuf,
    /// Path to write the trained binary model.
    model_out: PathBuf,

    /// Optional externally supplied feature list; without it, one unigram
    /// feature per (attribute, label) pair observed in the corpus is used.
    #[arg(long)]
    feature_list: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "none")]
    regularization: RegularizationArg,
    #[arg(long, default_value_t = 1.0)]
    sigma: f64,
    #[arg(long, default_value_t = 0)]
    max_iterations: usize,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum RegularizationArg {
    None,
    L1,
    L2,
}

pub fn cli(command: Command) -> Command {
    command.subcommand(CliArgs::augment_args(Command::new(COMMAND_NAME)))
}

pub fn main(submatches: &ArgMatches) -> Result<()> {
    let args = CliArgs::from_arg_matches(submatches)?;

    let file = File::open(&args.training_data)
        .with_context(|| format!("opening training data {}", args.training_data.display()))?;
    let mut labels = MutableDictionary::new();
    let mut attrs = MutableDictionary::new();
    let raw_sequences = read_training_data(BufReader::new(file), &mut labels, &mut attrs);

    let mut features = if let Some(path) = &args.feature_list {
        let f = File::open(path).with_context(|| format!("opening feature list {}", path.display()))?;
        read_feature_list(BufReader::new(f), &mut labels, &mut attrs)
    } else {
        default_unigram_features(&raw_sequences)
    };

    let alphabet = Alphabet::new(labels.num() as u32);
    let attr_index = AttributeIndex::build(attrs.num(), &features);
    let mut preprocessor = Preprocessor::new(alphabet)?;
    let sequences = raw_sequences
        .into_iter()
        .map(|items| preprocessor.preprocess(items, &features, &attr_index))
        .collect::<crate::error::Result<Vec<_>>>()?;

    let regularization = match args.regularization {
        RegularizationArg::None => Regularization::None,
        RegularizationArg::L1 => Regularization::L1 { sigma: args.sigma },
        RegularizationArg::L2 => Regularization::L2 { sigma: args.sigma },
    };
    let config = TrainConfig {
        regularization,
        max_iterations: args.max_iterations,
        ..TrainConfig::default()
    };

    let mut trainer = Trainer::new(std::mem::take(&mut features), sequences, config);
    trainer.train()?;

    let out = File::create(&args.model_out)
        .with_context(|| format!("creating model file {}", args.model_out.display()))?;
    write_model(
        &mut BufWriter::new(out),
        trainer.features().clone(),
        &labels.freeze(),
        &attrs.freeze(),
    )?;

    Ok(())
}

/// Without an external feature list, generate one unigram feature per
/// distinct (attribute, label) pair actually observed in the corpus —
/// the minimal feature set a CRF needs to be trainable at all.
fn default_unigram_features(sequences: &[Vec<crate::types::Item>]) -> crate::feature::FeatureTable {
    let mut seen = std::collections::HashSet::new();
    let mut table = crate::feature::FeatureTable::new();
    for seq in sequences {
        for item in seq {
            let Some(label) = item.label else { continue };
            for attr in &item.attrs {
                if seen.insert((attr.attr_id, label)) {
                    table.push(crate::types::Feature::new(attr.attr_id, vec![label]));
                }
            }
        }
    }
    table
}
