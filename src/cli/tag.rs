// SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{ArgMatches, Args, Command, FromArgMatches};

use crate::context::Context;
use crate::io::model::read_model;
use crate::io::training_data::read_tagging_data;
use crate::preprocess::Preprocessor;
use crate::scaled::set_weights;
use crate::types::Alphabet;
use crate::viterbi::decode;

pub const COMMAND_NAME: &str = "tag";

#[derive(Args, Debug)]
#[command(about = "Decode the best label sequence for unlabelled input", long_about = None)]
struct CliArgs {
    /// Path to a trained binary model.
    model: PathBuf,
    /// Path to the tagging input (same tokeniser as training data, no labels).
    input: PathBuf,
    /// Where to write one label per line, blank line between sequences.
    /// Defaults to stdout.
    #[arg(long)]
    output: Option<PathBuf>,
}

pub fn cli(command: Command) -> Command {
    command.subcommand(CliArgs::augment_args(Command::new(COMMAND_NAME)))
}

pub fn main(submatches: &ArgMatches) -> Result<()> {
    let args = CliArgs::from_arg_matches(submatches)?;

    let model_file = File::open(&args.model)
        .with_context(|| format!("opening model {}", args.model.display()))?;
    let model = read_model(&mut BufReader::new(model_file), &args.model)?;

    let input_file = File::open(&args.input)
        .with_context(|| format!("opening tagging input {}", args.input.display()))?;
    let sequences = read_tagging_data(BufReader::new(input_file), &model.attrs);

    let alphabet = Alphabet::new(model.labels.num() as u32);
    let mut preprocessor = Preprocessor::new(alphabet)?;
    let exp_weights: Vec<f64> = model.features.weights().iter().map(|w| w.exp()).collect();

    let mut out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(std::io::stdout())),
    };

    let mut ctx = Context::new();
    for items in sequences {
        let seq = preprocessor.preprocess(items, &model.features, &model.attr_index)?;
        ctx.load(&seq);
        set_weights(&mut ctx, &exp_weights);
        let decoded = decode(&mut ctx);
        for label in &decoded.labels {
            let s = model.labels.to_string(*label).unwrap_or("?");
            writeln!(out, "{s}")?;
        }
        writeln!(out)?;
    }

    Ok(())
}
