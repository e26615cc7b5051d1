use clap::Parser;
use tracing::info;

use probenet::args::{Args, Command};
use probenet::mtr::{Mtr, MtrOptions};
use probenet::ping::{AddOptions, Ping};
use probenet::report;
use probenet::Result;

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter("probenet=info")
        .with_writer(std::io::stderr)
        .init();

    let ident = (std::process::id() & 0xFFFF) as u16;

    match args.command {
        Command::Ping { ref target, count, force_v4, force_v6, data_size, .. } => {
            info!(target = %target, "starting ping");
            let mut engine = Ping::new(ident, args.command.interval());
            engine.add(
                target,
                AddOptions {
                    count: Some(count),
                    data_size: Some(data_size),
                    timeout: Some(args.command.timeout()),
                    interval: Some(args.command.interval()),
                    force_v4,
                    force_v6,
                },
            )?;
            let results = engine.start()?;
            for result in &results {
                if args.json {
                    println!("{}", serde_json::to_string_pretty(result)?);
                } else {
                    print!("{}", report::format_ping_result(result));
                }
            }
        }
        Command::Mtr { ref target, count, max_hops, force_v4, force_v6, data_size, .. } => {
            info!(target = %target, "starting mtr");
            let options = MtrOptions {
                count,
                max_ttl: max_hops,
                data_size,
                timeout: args.command.timeout(),
                interval: args.command.interval(),
                force_v4,
                force_v6,
            };
            let mut engine = Mtr::new(target, ident, options)?;
            let result = engine.start()?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print!("{}", report::format_mtr_result(&result));
            }
        }
    }

    Ok(())
}
