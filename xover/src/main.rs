mod crossovers;
mod input;
mod options;
mod output;
mod progress;
mod tiles;

use anyhow::Result;
use clap::Parser;
use options::Cli;
#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli {
        Cli::Crossovers(crossovers) => crossovers.run(),
        Cli::Tiles(tiles) => tiles.run(),
    }
}
