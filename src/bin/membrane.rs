//! CLI for inspecting membrane configuration and scoping stylesheets.
//!
//! Usage:
//!   membrane check <config.toml>                  # Validate config, print grant table
//!   membrane scope-css <file.css> [--prefix P]    # Scope a style template

use std::fs;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use membrane::runner::emit::style::StyleScoper;
use membrane::runner::emit::token::{ScopingToken, DEFAULT_TOKEN_PREFIX};
use membrane::runner::plugin::config::MembraneConfig;

/// Placeholder a style template uses where the scoping token goes.
const TOKEN_HOLE: &str = "${token}";

#[derive(Parser)]
#[command(name = "membrane")]
#[command(about = "Object-capability membrane tooling", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a configuration file and print what it grants
    Check {
        /// Path to the TOML configuration
        config: String,
    },
    /// Scope a stylesheet template; `${token}` marks each hole
    ScopeCss {
        /// Path to the style template
        file: String,
        /// Scoping token prefix
        #[arg(short, long, default_value = DEFAULT_TOKEN_PREFIX)]
        prefix: String,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match args.command {
        Command::Check { config } => run_check(&config),
        Command::ScopeCss { file, prefix } => run_scope_css(&file, &prefix),
    }
}

fn run_check(path: &str) {
    let config = match MembraneConfig::load(path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };
    let registry = match config.build_registry() {
        Ok(registry) => registry,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };
    let bindings = match config.host_bindings() {
        Ok(bindings) => bindings,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };
    if let Err(e) = ScopingToken::generate(&config.membrane.token_prefix) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    println!("token prefix: {}", config.membrane.token_prefix);
    println!();
    println!("classes:");
    for class in &config.classes {
        println!("  {}", registry.class_chain(&class.name).join(" -> "));
    }
    println!();
    println!("grants:");
    for grant in registry.grants() {
        println!(
            "  {:<24} {:<20} {}",
            grant.subject.to_string(),
            grant.member,
            grant.capabilities
        );
    }
    println!();
    let policy = config.taming_policy();
    let fields: Vec<&str> = policy.allowed_fields().map(String::as_str).collect();
    println!("tamed exception fields: name, message{}", {
        if fields.is_empty() {
            String::new()
        } else {
            format!(", {}", fields.join(", "))
        }
    });
    println!();
    println!("host bindings:");
    for (name, value) in &bindings {
        println!("  {} = {}", name, value);
    }
}

fn run_scope_css(path: &str, prefix: &str) {
    let template = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error reading file '{}': {}", path, e);
            process::exit(1);
        }
    };
    let token = match ScopingToken::generate(prefix) {
        Ok(token) => token,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };
    let parts: Vec<&str> = template.split(TOKEN_HOLE).collect();
    let mut scoper = StyleScoper::new(token);
    if let Err(e) = scoper.emit_style_rules(&parts) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
    println!("{}", scoper.stylesheet());
}
