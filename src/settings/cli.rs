// SPDX-License-Identifier: GPL-3.0-or-later
use structopt::StructOpt;

use std::path::PathBuf;

#[derive(Debug, StructOpt)]
#[structopt()]
pub struct Args {
    /// Path to a configuration file. Defaults to `config.toml` in the current directory.
    #[structopt(short, long, parse(from_os_str))]
    pub config_path: Option<PathBuf>,
}
