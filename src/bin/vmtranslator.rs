use std::path::PathBuf;
use std::process;

use clap::Parser;

use jack::{resolve_input, SourceFile};

#[derive(Parser)]
#[command(
    name = "vmtranslator",
    version,
    about = "VM translator — stack-machine commands to Hack assembly"
)]
struct Cli {
    /// A .vm file or a directory of .vm files
    input: PathBuf,
    /// Output .asm path (default: <basename>.asm next to the input)
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Skip the bootstrap sequence normally emitted for directory input
    #[arg(long)]
    no_boot: bool,
}

fn main() {
    let cli = Cli::parse();

    let resolved = match resolve_input(&cli.input, "vm") {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    };

    let mut sources = Vec::new();
    for path in &resolved.files {
        match SourceFile::load(path) {
            Ok(s) => sources.push(s),
            Err(e) => {
                eprintln!("error: cannot read '{}': {}", path.display(), e);
                process::exit(1);
            }
        }
    }

    let modules: Vec<(&str, &str)> = sources
        .iter()
        .map(|s| (s.module(), s.text.as_str()))
        .collect();
    // Whole-program (directory) input gets the boot prologue.
    let boot = resolved.is_dir && !cli.no_boot;

    let asm = match jack::vm::translate_sources(&modules, boot) {
        Ok(asm) => asm,
        Err(diag) => {
            let failing = &sources[diag.span.file_id as usize];
            diag.render(&failing.name(), &failing.text);
            process::exit(1);
        }
    };

    let out_path = cli
        .output
        .unwrap_or_else(|| resolved.dir.join(format!("{}.asm", resolved.basename)));
    if let Err(e) = std::fs::write(&out_path, &asm) {
        eprintln!("error: cannot write '{}': {}", out_path.display(), e);
        process::exit(1);
    }
    eprintln!("Translated -> {}", out_path.display());
}
