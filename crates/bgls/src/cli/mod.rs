//
// cli/mod.rs
//
// Command-line subcommands that run the analysis without an editor
//

pub mod inspect;
