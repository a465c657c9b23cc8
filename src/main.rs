//! protoscene CLI
//!
//! Usage:
//!   protoscene [OPTIONS] [FILE]
//!
//! Options:
//!   -p, --profile <FILE>            Extra profile with built-in classes (TOML format)
//!   -e, --event <NAME.EVENT=VALUE>  Send an event after loading (repeatable)
//!   -q, --query <NAME.FIELD>        Print a field value (repeatable)
//!   -d, --dump                      Print the instantiated scene
//!   -v, --verbose                   More logging (-vv for event traces)
//!   -h, --help                      Print help

use std::fs;
use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use std::process;

use clap::Parser;
use env_logger::Env;

use protoscene::{load_with_config, LoadError, Profile, RuntimeConfig, World};

#[derive(Parser)]
#[command(name = "protoscene")]
#[command(about = "Instantiate VRML97 PROTOs and route events through a scene")]
struct Cli {
    /// Input file (reads from stdin if not provided)
    input: Option<PathBuf>,

    /// Extra profile with built-in node classes (TOML format)
    #[arg(short, long)]
    profile: Option<PathBuf>,

    /// Send an event, e.g. `Lamp.set_on=TRUE`; timestamps count up from 1
    #[arg(short, long = "event", value_name = "NAME.EVENT=VALUE")]
    events: Vec<String>,

    /// Print a field value after the events ran, e.g. `Lamp.on`
    #[arg(short, long = "query", value_name = "NAME.FIELD")]
    queries: Vec<String>,

    /// Print the instantiated scene
    #[arg(short, long)]
    dump: bool,

    /// More logging: -v for debug, -vv for every delivered event
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    // If no input file and stdin is a terminal (interactive), show intro help
    if cli.input.is_none() && io::stdin().is_terminal() {
        print_intro();
        return;
    }

    let mut config = RuntimeConfig::new().with_trace_events(cli.verbose >= 2);
    if let Some(path) = &cli.profile {
        match Profile::from_file(path) {
            Ok(profile) => config = config.with_profile(profile),
            Err(e) => {
                eprintln!("Error loading profile '{}': {}", path.display(), e);
                process::exit(1);
            }
        }
    }

    // Read input
    let (source, filename) = match &cli.input {
        Some(path) => match fs::read_to_string(path) {
            Ok(content) => {
                config = config.with_base_uri(format!("file://{}", path.display()));
                (content, path.display().to_string())
            }
            Err(e) => {
                eprintln!("Error reading file '{}': {}", path.display(), e);
                process::exit(1);
            }
        },
        None => {
            let mut buffer = String::new();
            match io::stdin().read_to_string(&mut buffer) {
                Ok(_) => (buffer, "<stdin>".to_string()),
                Err(e) => {
                    eprintln!("Error reading from stdin: {}", e);
                    process::exit(1);
                }
            }
        }
    };

    let mut world = match load_with_config(&source, config) {
        Ok(world) => world,
        Err(LoadError::Parse(errors)) => {
            for e in &errors {
                eprint!("{}", e.format(&source, &filename));
            }
            process::exit(1);
        }
        Err(LoadError::Build(e)) => {
            eprint!("{}", e.format(&source, &filename));
            process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };
    for warning in world.scene().warnings() {
        eprint!("{}", warning.format_warning(&source, &filename));
    }

    if let Err(e) = run(&mut world, &cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(world: &mut World, cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    world.initialize(0.0)?;

    let mut timestamp = 0.0;
    for event in &cli.events {
        let (target, text) = event
            .split_once('=')
            .ok_or_else(|| format!("expected NAME.EVENT=VALUE, found '{}'", event))?;
        let (name, event_in) = split_target(target)?;
        let value = world.parse_event_value(name, event_in, text)?;
        timestamp += 1.0;
        world.send_event(name, event_in, value, timestamp)?;
    }

    for query in &cli.queries {
        let (name, field) = split_target(query)?;
        println!("{} = {}", query, world.field(name, field)?);
    }

    if cli.dump {
        print!("{}", world.dump());
    }

    world.shutdown(timestamp + 1.0)?;
    Ok(())
}

fn split_target(target: &str) -> Result<(&str, &str), String> {
    target
        .split_once('.')
        .ok_or_else(|| format!("expected NAME.INTERFACE, found '{}'", target))
}

fn print_intro() {
    println!(
        r#"protoscene - PROTO instantiation and event routing for VRML97-style scenes

USAGE:
    protoscene [OPTIONS] [FILE]
    echo '<scene>' | protoscene --dump

OPTIONS:
    -p, --profile <FILE>            Extra built-in classes (TOML file)
    -e, --event <NAME.EVENT=VALUE>  Send an event (repeatable)
    -q, --query <NAME.FIELD>        Print a field value (repeatable)
    -d, --dump                      Print the instantiated scene
    -v, --verbose                   More logging
    -h, --help                      Print help

QUICK START:
    echo 'PROTO Lamp [ exposedField SFBool on TRUE ] {{ PointLight {{ on IS on }} }}
          DEF L Lamp {{}}' | protoscene -e L.set_on=FALSE -q L.on"#
    );
}
