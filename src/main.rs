use anyhow::{Context, Result, bail};
use clap::Parser;
use console::style;
use rayon::prelude::*;
use std::{io::Write, path::Path, path::PathBuf};

use psp_compiler::cli::Cli;
use psp_compiler::{CompiledPage, Compiler, write_atomically};

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .format(|buf, record| writeln!(buf, "{}:\n{}", record.level(), record.args()))
        .filter_level(cli.verbose.log_level_filter())
        .target(env_logger::fmt::Target::Stdout)
        .init();

    let config = cli.config();
    if cli.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }
    if config.class_name.is_some() && cli.files.len() > 1 {
        bail!("--class-name can only be used with a single template");
    }

    let compiler = Compiler::new(config);
    let results: Vec<(&PathBuf, Result<CompiledPage>)> = cli
        .files
        .par_iter()
        .map(|file| {
            let page = compiler
                .compile_file(file)
                .with_context(|| format!("Could not compile {}", file.display()));
            (file, page)
        })
        .collect();

    let mut failed = 0;
    for (file, result) in results {
        let outcome = result.and_then(|page| emit(&cli, file, &page));
        if let Err(err) = outcome {
            eprintln!("{}", style(format!("{:#}", err)).red());
            failed += 1;
        }
    }

    if failed > 0 {
        eprintln!(
            "{}",
            style(format!("{} of {} templates failed to compile", failed, cli.files.len())).red()
        );
        std::process::exit(1);
    }
    Ok(())
}

/// Report warnings and write or print the module for one template.
fn emit(cli: &Cli, file: &Path, page: &CompiledPage) -> Result<()> {
    for diagnostic in &page.diagnostics {
        eprintln!("{}", style(diagnostic).yellow());
    }

    if cli.stdout {
        print!("{}", page.source);
        return Ok(());
    }

    let out_dir = match &cli.out_dir {
        Some(dir) => dir.as_path(),
        None => file.parent().unwrap_or(Path::new("")),
    };
    let target = out_dir.join(page.module_file_name());
    write_atomically(&target, &page.source).with_context(|| format!("Could not write {}", target.display()))?;
    log::info!("Compiled {} to {}", file.display(), target.display());
    Ok(())
}
