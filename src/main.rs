//! # churnflow command-line entry point
//!
//! ```text
//! main()
//!   │
//!   ├─> Parse CLI arguments (clap)
//!   ├─> Initialize logging (stderr + rotating files)
//!   ├─> Load the workflow config (file or defaults)
//!   └─> Run the subcommand against a fresh Session
//! ```
//!
//! ```bash
//! churnflow summarize --file data/Churn_Modelling.csv
//! churnflow run --target Exited --train-fraction 0.7
//! churnflow predict Age=42 Balance=125000 IsActiveMember=1 --fill-missing
//! ```

#![warn(clippy::all, rust_2018_idioms)]
#![expect(clippy::print_stdout)] // Command output goes to stdout

mod cli;

use anyhow::Result;
use clap::Parser as _;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    churnflow::logging::init(cli.verbose)?;

    let config = cli::load_effective_config(cli.config)?;
    cli::run_command(cli.command, config)
}
