use std::path::PathBuf;
use std::process;

use clap::Parser;

use jack::{resolve_input, SourceFile};

#[derive(Parser)]
#[command(
    name = "jackc",
    version,
    about = "Jack compiler — .jack source to VM intermediate code"
)]
struct Cli {
    /// A .jack file or a directory of .jack files
    input: PathBuf,
    /// Directory for the .vm outputs (default: next to each source)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    let resolved = match resolve_input(&cli.input, "jack") {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    };

    for (file_id, path) in resolved.files.iter().enumerate() {
        let source = match SourceFile::load(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("error: cannot read '{}': {}", path.display(), e);
                process::exit(1);
            }
        };

        let vm_code = match jack::compiler::compile_source(&source.text, file_id as u16) {
            Ok(code) => code,
            Err(diag) => {
                diag.render(&source.name(), &source.text);
                process::exit(1);
            }
        };

        let out_path = match &cli.output {
            Some(dir) => dir.join(format!("{}.vm", source.module())),
            None => path.with_extension("vm"),
        };
        if let Err(e) = std::fs::write(&out_path, &vm_code) {
            eprintln!("error: cannot write '{}': {}", out_path.display(), e);
            process::exit(1);
        }
        eprintln!("Compiled -> {}", out_path.display());
    }
}
