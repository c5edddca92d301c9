// SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later

use anyhow::Result;
use clap::Command;
use vocrf::cli;

pub fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let command = Command::new("vocrf")
        .about("Trainer and decoder for variable-order linear-chain CRFs.")
        .subcommand_required(true)
        .arg_required_else_help(true);

    macro_rules! impl_dispatch {
        ($command:expr, $($module:ident),*) => {{
            let command = $command;
            $(
                let command = cli::$module::cli(command);
            )*

            let matches = command.get_matches();
            match matches.subcommand() {
                $(
                    Some((cli::$module::COMMAND_NAME, sub_m)) => cli::$module::main(sub_m),
                )*
                _ => unreachable!(),
            }
        }};
    }

    impl_dispatch!(command, train, tag, dump)
}
