//! Arclight — ATSL shader compiler driver.
//!
//! Pipeline: parse → resolve includes → preprocess (`-D` options) →
//! stage extraction → reflection → backend emission.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use miette::{miette, Context, IntoDiagnostic};

use arclight_ast::{ConstantValue, Stage};
use arclight_backend_core::{BackendOptions, BackendRegistry, ShaderOutput, UberShader};
use arclight_backend_glsl::GlslBackend;
use arclight_backend_spirv::SpirvBackend;
use arclight_parser::LibraryRegistry;
use arclight_preprocess::OptionTable;

/// Arclight — ATSL to GLSL/SPIR-V shader compiler
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Input ATSL file
    input: PathBuf,

    /// Target backend (default: glsl)
    #[arg(short, long, default_value = "glsl")]
    target: String,

    /// Shader stage to compile
    #[arg(short, long, default_value = "vertex", value_parser = parse_stage)]
    stage: Stage,

    /// Option values, e.g. -D useTexture=true -D LIGHTS=4
    #[arg(short = 'D', long = "define", value_name = "NAME=VALUE")]
    defines: Vec<String>,

    /// Output path (default: stdout; required for binary targets)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Dump the specialized AST to stderr before emission
    #[arg(long)]
    emit_ast: bool,

    /// List available targets and exit
    #[arg(long)]
    list_targets: bool,
}

fn parse_stage(s: &str) -> Result<Stage, String> {
    match s {
        "vertex" | "vs" => Ok(Stage::Vertex),
        "fragment" | "fs" => Ok(Stage::Fragment),
        _ => Err(format!(
            "invalid stage '{s}', expected 'vertex' or 'fragment'"
        )),
    }
}

fn parse_define(define: &str) -> miette::Result<(String, ConstantValue)> {
    let (name, value) = define
        .split_once('=')
        .ok_or_else(|| miette!("option '{define}' is not of the form NAME=VALUE"))?;
    let value = match value {
        "true" => ConstantValue::Bool(true),
        "false" => ConstantValue::Bool(false),
        _ => {
            if let Some(uint) = value.strip_suffix('u') {
                ConstantValue::UInt(
                    uint.parse()
                        .into_diagnostic()
                        .wrap_err_with(|| format!("option '{name}' has a malformed value"))?,
                )
            } else if let Ok(int) = value.parse::<i32>() {
                ConstantValue::Int(int)
            } else {
                ConstantValue::Float(
                    value
                        .parse()
                        .into_diagnostic()
                        .wrap_err_with(|| format!("option '{name}' has a malformed value"))?,
                )
            }
        }
    };
    Ok((name.to_owned(), value))
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();

    let mut registry = BackendRegistry::with_builtins();
    registry.register(Box::new(GlslBackend));
    registry.register(Box::new(SpirvBackend));

    if cli.list_targets {
        for target in registry.list_targets() {
            println!("{target}");
        }
        return Ok(());
    }

    let backend = registry
        .find(&cli.target)
        .ok_or_else(|| miette!("unknown target '{}'", cli.target))?;

    let source = std::fs::read_to_string(&cli.input)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to read {}", cli.input.display()))?;

    let module = arclight_parser::parse(&source)
        .map_err(|e| miette!("{e}"))
        .wrap_err("parsing failed")?;

    // No libraries registered by default; stray includes are reported.
    let libraries = LibraryRegistry::new();
    let module = arclight_parser::resolve_includes(&module, &libraries)
        .map_err(|e| miette!("{e}"))
        .wrap_err("include resolution failed")?;

    let mut options = OptionTable::new();
    for define in &cli.defines {
        let (name, value) = parse_define(define)?;
        options.set(name, value);
    }
    let uber = UberShader::new(module);
    let unit = uber
        .specialize(cli.stage, &options)
        .map_err(|e| miette!("{e}"))
        .wrap_err("specialization failed")?;

    if cli.emit_ast {
        eprintln!("{}", arclight_ast::write_module(unit.module()));
    }

    let output = unit
        .emit(backend, &BackendOptions::default())
        .map_err(|e| miette!("{e}"))
        .wrap_err_with(|| format!("{} emission failed", backend.name()))?;

    match (output, &cli.output) {
        (ShaderOutput::Text(text), Some(path)) => {
            std::fs::write(path, text)
                .into_diagnostic()
                .wrap_err_with(|| format!("failed to write {}", path.display()))?;
        }
        (ShaderOutput::Text(text), None) => {
            print!("{text}");
        }
        (ShaderOutput::Binary(bytes), Some(path)) => {
            std::fs::write(path, bytes)
                .into_diagnostic()
                .wrap_err_with(|| format!("failed to write {}", path.display()))?;
        }
        (ShaderOutput::Binary(_), None) => {
            return Err(miette!(
                "target '{}' produces binary output; pass --output",
                cli.target
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_parsing() {
        assert_eq!(parse_stage("vertex").unwrap(), Stage::Vertex);
        assert_eq!(parse_stage("fs").unwrap(), Stage::Fragment);
        assert!(parse_stage("compute").is_err());
    }

    #[test]
    fn define_parsing() {
        assert_eq!(
            parse_define("useTexture=true").unwrap(),
            ("useTexture".into(), ConstantValue::Bool(true))
        );
        assert_eq!(
            parse_define("LIGHTS=4u").unwrap(),
            ("LIGHTS".into(), ConstantValue::UInt(4))
        );
        assert_eq!(
            parse_define("level=-2").unwrap(),
            ("level".into(), ConstantValue::Int(-2))
        );
        assert_eq!(
            parse_define("gamma=2.2").unwrap(),
            ("gamma".into(), ConstantValue::Float(2.2))
        );
        assert!(parse_define("nokey").is_err());
        assert!(parse_define("bad=12x").is_err());
    }
}
