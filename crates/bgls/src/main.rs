//
// main.rs
//
// Entry point for the bgls binary
//

use std::env;

use bgls::config::BuildGraphConfig;

fn print_usage() {
    println!(
        "bgls {}, a static language server for BuildGraph scripts.",
        env!("CARGO_PKG_VERSION")
    );
    print!(
        r#"
Usage: bgls [OPTIONS]
       bgls inspect <script> [--deps] [--at LINE:COL]

Available options:

--stdio                      Start the LSP server using stdio transport
--version                    Print the version
--help                       Print this help message

Subcommands:

inspect                      Print a script's outline; --deps lists its
                             includes, --at resolves the reference at a
                             one-based position

"#
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut argv = env::args();
    argv.next(); // skip executable name

    let mut use_stdio = false;

    while let Some(arg) = argv.next() {
        match arg.as_str() {
            "--stdio" => use_stdio = true,
            "--version" => {
                println!("bgls {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" => {
                print_usage();
                return Ok(());
            }
            "inspect" => {
                let args = bgls::cli::inspect::parse_args(&mut argv)
                    .map_err(|e| anyhow::anyhow!("{e}"))?;
                env_logger::init();
                let report =
                    bgls::cli::inspect::run_inspect(&args, &BuildGraphConfig::default()).await?;
                print!("{report}");
                return Ok(());
            }
            other => {
                return Err(anyhow::anyhow!("Unknown argument: '{other}'"));
            }
        }
    }

    if !use_stdio {
        print_usage();
        return Ok(());
    }

    env_logger::init();

    bgls::backend::start_lsp().await
}
