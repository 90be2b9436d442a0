use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use std::path::{Path, PathBuf};
use std::process::Command;
use zinc_diagnostics::{Diagnostic, Phase, Span};

#[derive(ClapParser)]
#[command(name = "zinc")]
#[command(version)]
#[command(about = "Zinc Programming Language Compiler", long_about = None)]
struct Cli {
    /// Input .zn file
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Analyze only and dump the analyzed AST as JSON
    #[arg(long)]
    ast: bool,

    /// Analyze only and report the semantic error count
    #[arg(long)]
    check: bool,

    /// Run the downstream C compiler on the generated unit
    #[arg(short = 'c', long = "compile")]
    compile: bool,

    /// Output base name (default: the input file stem)
    #[arg(short = 'o', long = "output", value_name = "BASE")]
    output: Option<PathBuf>,
}

fn report_parse_errors(errors: &[zinc_parser::ParseError], file_name: &str, source: &str) {
    for e in errors {
        let diag = Diagnostic::error(
            Phase::Parse,
            e.message().to_string(),
            Span::new(file_name, e.line()),
        );
        eprint!("{}", diag.render(Some(source)));
    }
    eprintln!("{} parse error(s)", errors.len());
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let source = std::fs::read_to_string(&cli.input)
        .with_context(|| format!("cannot read {}", cli.input.display()))?;
    let file_name = cli.input.display().to_string();

    // Parse.
    let mut parser = match zinc_parser::Parser::new(&source) {
        Ok(parser) => parser,
        Err(e) => {
            report_parse_errors(&[e], &file_name, &source);
            std::process::exit(1);
        }
    };
    let mut program = match parser.parse() {
        Ok(program) => program,
        Err(errors) => {
            report_parse_errors(&errors, &file_name, &source);
            std::process::exit(1);
        }
    };

    // Analyze.
    let analyzer = zinc_compiler::analyze(&mut program, &file_name);
    let error_count = analyzer.error_count();

    if error_count > 0 {
        for diag in analyzer.sink.iter() {
            eprint!("{}", diag.render(Some(&source)));
        }
        eprintln!("{}", analyzer.sink.summary_line(Phase::Semantic));
        std::process::exit(1);
    }

    if cli.ast {
        println!("{}", serde_json::to_string_pretty(&program)?);
        return Ok(());
    }

    if cli.check {
        eprintln!("{}", analyzer.sink.summary_line(Phase::Semantic));
        return Ok(());
    }

    // Emit.
    let base_path = cli.output.clone().unwrap_or_else(|| {
        PathBuf::from(
            cli.input
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "out".to_string()),
        )
    });
    let base_name = base_path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "out".to_string());
    let out_dir = base_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let code = zinc_compiler::generate(&analyzer, &program, &file_name, &base_name);

    let c_path = base_path.with_extension("c");
    let h_path = base_path.with_extension("h");
    std::fs::write(&c_path, &code.unit)
        .with_context(|| format!("cannot write {}", c_path.display()))?;
    std::fs::write(&h_path, &code.header)
        .with_context(|| format!("cannot write {}", h_path.display()))?;
    zinc_runtime::write_runtime_header(&out_dir)?;
    log::info!(
        "wrote {}, {}, and the runtime header",
        c_path.display(),
        h_path.display()
    );

    if cli.compile {
        let cc = std::env::var("ZINC_CC").unwrap_or_else(|_| "cc".to_string());
        log::info!("invoking {} on {}", cc, c_path.display());
        let output = Command::new(&cc)
            .arg(&c_path)
            .arg("-o")
            .arg(&base_path)
            .arg("-lm")
            .output()
            .with_context(|| format!("cannot invoke C compiler '{}'", cc))?;
        if !output.status.success() {
            eprintln!("{}", String::from_utf8_lossy(&output.stderr));
            anyhow::bail!("C compilation failed");
        }
        log::info!("built {}", base_path.display());
    }

    Ok(())
}
