// build.rs

use clap::{Arg, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Global argument: configuration file
fn config_arg() -> Arg {
    Arg::new("config")
        .short('c')
        .long("config")
        .value_name("FILE")
        .global(true)
        .help("Configuration file (TOML)")
}

fn build_cli() -> Command {
    Command::new("txplan")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Conary Contributors")
        .about("Ordered, classified transaction plans for package environments")
        .subcommand_required(false)
        .arg(config_arg())
        .subcommand(
            Command::new("plan")
                .about("Compute the transaction for a set of install and remove requests")
                .arg(
                    Arg::new("channel")
                        .long("channel")
                        .value_name("NAME=PATH")
                        .required(true)
                        .action(clap::ArgAction::Append)
                        .help("Channel as NAME=PATH; earlier channels have higher priority"),
                )
                .arg(
                    Arg::new("prefix")
                        .short('p')
                        .long("prefix")
                        .value_name("DIR")
                        .help("Environment prefix holding conda-meta records"),
                )
                .arg(
                    Arg::new("install")
                        .short('i')
                        .long("install")
                        .value_name("SPEC")
                        .action(clap::ArgAction::Append)
                        .help("Package to install, as a match spec"),
                )
                .arg(
                    Arg::new("remove")
                        .short('r')
                        .long("remove")
                        .value_name("NAME")
                        .action(clap::ArgAction::Append)
                        .help("Installed package to remove"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(clap::ArgAction::SetTrue)
                        .help("Print the plan as JSON"),
                ),
        )
        .subcommand(Command::new("show-config").about("Print the effective configuration as TOML"))
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();
    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("txplan.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
