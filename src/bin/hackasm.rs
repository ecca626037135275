use std::path::PathBuf;
use std::process;

use clap::Parser;

use jack::SourceFile;

#[derive(Parser)]
#[command(
    name = "hackasm",
    version,
    about = "Hack assembler — symbolic assembly to 16-bit machine code"
)]
struct Cli {
    /// The .asm file to assemble
    input: PathBuf,
    /// Output .hack path (default: <stem>.hack next to the input)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    if !cli.input.extension().is_some_and(|e| e == "asm") {
        eprintln!("error: '{}' must have the .asm extension", cli.input.display());
        process::exit(1);
    }

    let source = match SourceFile::load(&cli.input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: cannot read '{}': {}", cli.input.display(), e);
            process::exit(1);
        }
    };

    let words = match jack::hack::assemble(&source.text, 0) {
        Ok(words) => words,
        Err(diag) => {
            diag.render(&source.name(), &source.text);
            process::exit(1);
        }
    };

    let mut binary = words.join("\n");
    binary.push('\n');

    let out_path = cli
        .output
        .unwrap_or_else(|| cli.input.with_extension("hack"));
    if let Err(e) = std::fs::write(&out_path, &binary) {
        eprintln!("error: cannot write '{}': {}", out_path.display(), e);
        process::exit(1);
    }
    eprintln!("Assembled -> {}", out_path.display());
}
