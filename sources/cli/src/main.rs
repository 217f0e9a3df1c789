use std::{process::exit, sync::Arc};

use anyhow::Result;
use args::Cli;
use clap::Parser;
use loader::{ClassPath, ClassRecord, DenyList, LoaderRegistry, RegistryOptions};
use tracing::{error, info, Level};
use tracing_subscriber::fmt;

mod args;

fn describe(class: &ClassRecord) {
    println!("{}", class.name());
    println!("  loader:      {}", class.loader());
    println!("  sha1:        {}", class.digest_hex());
    println!(
        "  super:       {}",
        class.super_class_name().unwrap_or("<none>")
    );

    if !class.interface_names().is_empty() {
        println!("  interfaces:  {}", class.interface_names().join(", "));
    }

    if let Some(package) = class.package() {
        let sealed = if package.is_sealed() { " (sealed)" } else { "" };
        println!("  package:     {}{}", package.name(), sealed);
    }

    if let Some(source_file) = class.source_file() {
        println!("  source file: {}", source_file);
    }
}

fn run(args: &Cli) -> Result<bool> {
    let mut class_path = ClassPath::new();
    for cp in &args.classpath {
        class_path.add_path(cp);
    }

    let policy = Arc::new(DenyList::new(args.deny.iter().map(|&op| op.into())));
    let registry = LoaderRegistry::new(RegistryOptions { class_path, policy });

    let system = registry.system_loader()?;
    let mut ok = true;

    for class_name in &args.classes {
        match system.load_class(class_name) {
            Ok(class) => describe(&class),
            Err(e) => {
                error!("Could not load {}", class_name);
                println!("{}: {}", class_name, e);
                ok = false;
            }
        }
    }

    for name in &args.resources {
        let found = system.get_resources(name);
        if found.is_empty() {
            println!("{}: not found", name);
            ok = false;
            continue;
        }

        for resource in found {
            let bytes = resource.read()?;
            println!("{} ({} bytes)", resource.url(), bytes.len());
        }
    }

    Ok(ok)
}

fn main() {
    let args = Cli::parse();

    let mut format = fmt::format()
        .with_ansi(true)
        .without_time()
        .with_level(true)
        .with_target(false)
        .with_thread_names(false)
        .with_source_location(true)
        .compact();

    if args.test {
        format = format.with_ansi(false).with_source_location(false);
    }

    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .event_format(format)
        .with_writer(std::io::stderr)
        .init();

    info!("System starting up");

    if args.classes.is_empty() && args.resources.is_empty() {
        error!("No classes or resources given.");
        return;
    }

    match run(&args) {
        Ok(true) => info!("Loading concluded without error"),
        Ok(false) => exit(1),
        Err(e) => {
            println!("/----------------------------------------------------------\\");
            println!("|The loader encountered an unrecoverable error and aborted.|");
            println!("\\----------------------------------------------------------/");
            println!("{}", e);
            exit(1);
        }
    }
}
