// SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{ArgMatches, Args, Command, FromArgMatches};

use crate::io::model::{read_model, ModelHeader};

pub const COMMAND_NAME: &str = "dump";

#[derive(Args, Debug)]
#[command(about = "Print a trained model's header and feature table", long_about = None)]
struct CliArgs {
    /// Path to a trained binary model.
    model: PathBuf,

    /// Print only the header, as JSON (requires the `serde` feature).
    #[arg(long)]
    json: bool,
}

pub fn cli(command: Command) -> Command {
    command.subcommand(CliArgs::augment_args(Command::new(COMMAND_NAME)))
}

pub fn main(submatches: &ArgMatches) -> Result<()> {
    let args = CliArgs::from_arg_matches(submatches)?;

    let file = File::open(&args.model).with_context(|| format!("opening model {}", args.model.display()))?;
    let model = read_model(&mut BufReader::new(file), &args.model)?;

    let header = ModelHeader {
        version: 1,
        num_features: model.features.len() as u32,
        num_labels: model.labels.num() as u32,
        num_attrs: model.attrs.num() as u32,
    };

    if args.json {
        #[cfg(feature = "serde")]
        {
            println!("{}", serde_json::to_string_pretty(&header)?);
            return Ok(());
        }
        #[cfg(not(feature = "serde"))]
        {
            anyhow::bail!("--json requires the `serde` feature");
        }
    }

    println!(
        "model: {} features, {} labels, {} attributes",
        header.num_features, header.num_labels, header.num_attrs
    );
    for (fid, f) in model.features.iter() {
        let label_str = f
            .label_sequence
            .iter()
            .map(|&l| model.labels.to_string(l).unwrap_or("?").to_string())
            .collect::<Vec<_>>()
            .join(",");
        let attr_str = model.attrs.to_string(f.attr_id).unwrap_or("?");
        println!("  #{fid}\t{attr_str}\t[{label_str}]\tw={:.6}", f.weight);
    }

    Ok(())
}
