// The Zinc compiler core: semantic analysis over a parsed AST, then C99
// emission (GNU statement expressions required) targeting the fixed
// runtime header.

pub mod codegen;
pub mod sema;

pub use codegen::{CodeGenerator, GeneratedCode};
pub use sema::{FnSig, SemanticAnalyzer, StructDef, StructFieldDef, StructRegistry, Symbol};

use thiserror::Error;
use zinc_ast::Program;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("{} parse error(s)", .0.len())]
    Parse(Vec<zinc_parser::ParseError>),
    #[error("{} semantic error(s) encountered.", .0.len())]
    Semantic(Vec<zinc_diagnostics::Diagnostic>),
}

/// Everything a successful compilation produces.
#[derive(Debug)]
pub struct CompiledProgram {
    pub program: Program,
    pub analyzer: SemanticAnalyzer,
    pub code: GeneratedCode,
}

/// Run semantic analysis over a parsed program. The returned analyzer
/// holds the diagnostics sink, the struct registry, function signatures,
/// and the string-literal table the emitter reads.
pub fn analyze(program: &mut Program, file: &str) -> SemanticAnalyzer {
    let mut analyzer = SemanticAnalyzer::new(file);
    analyzer.analyze(program);
    analyzer
}

/// Emit C for a cleanly analyzed program.
pub fn generate(
    analyzer: &SemanticAnalyzer,
    program: &Program,
    source_path: &str,
    base: &str,
) -> GeneratedCode {
    let mut gen = CodeGenerator::new(analyzer, source_path, base);
    gen.generate(program)
}

/// Full pipeline convenience: parse, analyze, emit. Used by the driver
/// and the integration tests; callers that need the intermediate
/// diagnostics drive the phases themselves.
pub fn compile_source(
    source: &str,
    file: &str,
    base: &str,
) -> Result<CompiledProgram, CompileError> {
    let mut parser = zinc_parser::Parser::new(source).map_err(|e| CompileError::Parse(vec![e]))?;
    let mut program = parser.parse().map_err(CompileError::Parse)?;

    let analyzer = analyze(&mut program, file);
    if analyzer.error_count() > 0 {
        return Err(CompileError::Semantic(
            analyzer.sink.iter().cloned().collect(),
        ));
    }

    let code = generate(&analyzer, &program, file, base);
    Ok(CompiledProgram {
        program,
        analyzer,
        code,
    })
}
