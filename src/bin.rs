#[macro_use]
extern crate provenance_system_kit;

mod deployments;
mod frontend;

use frontend::cli;

pub fn main() {
    cli::main();
}
