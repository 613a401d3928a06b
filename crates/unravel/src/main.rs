//! unravel - structured pseudo-code for pre-structured x86 functions
//!
//! Usage:
//!   unravel decompile <program.json>             Render every function
//!   unravel decompile <program.json> -f <name>   Render one function
//!   unravel decompile <program.json> --json      Print recovered state as JSON
//!   unravel passes                               List recovery passes

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use unravel_analysis::{
    CanaryConfig, DecompiledFunction, Decompiler, DecompilerConfig, FunctionInput,
    OptimizationLevel, RecoveryPass, Sequence,
};
use unravel_core::{Architecture, EdgeTable, Instruction, InstructionStream, SymbolMap, X86Classifier};

#[derive(Parser)]
#[command(name = "unravel")]
#[command(about = "Structured pseudo-code from pre-structured x86 functions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the recovery passes and render pseudo-code
    Decompile {
        /// Path to a JSON program description
        input: PathBuf,

        /// Only render the named function
        #[arg(short, long)]
        function: Option<String>,

        /// Print slots, fused addresses and text as JSON
        #[arg(long)]
        json: bool,

        /// Recovery level: none, basic or standard
        #[arg(long, default_value = "standard", value_parser = parse_level)]
        level: OptimizationLevel,

        /// Enable a pass regardless of level
        #[arg(long, value_parser = parse_pass)]
        enable: Vec<RecoveryPass>,

        /// Disable a pass regardless of level
        #[arg(long, value_parser = parse_pass)]
        disable: Vec<RecoveryPass>,

        /// Omit comment nodes and instruction echoes
        #[arg(long)]
        no_comments: bool,

        /// Color jump targets with ANSI escapes
        #[arg(long)]
        color: bool,

        /// Prefix for synthetic slot names
        #[arg(long, default_value = "var")]
        slot_prefix: String,

        /// Symbol of the stack protector failure routine
        #[arg(long)]
        canary_symbol: Option<String>,

        /// Instructions searched backwards from the guard call
        #[arg(long)]
        canary_window: Option<usize>,

        /// Also accept reloads of the canary slot, not only stores
        #[arg(long)]
        canary_loads: bool,
    },
    /// List the recovery passes and whether a level enables them
    Passes {
        /// Recovery level: none, basic or standard
        #[arg(long, default_value = "standard", value_parser = parse_level)]
        level: OptimizationLevel,
    },
}

fn parse_level(s: &str) -> Result<OptimizationLevel, String> {
    OptimizationLevel::parse(s).ok_or_else(|| format!("unknown level '{}'", s))
}

fn parse_pass(s: &str) -> Result<RecoveryPass, String> {
    RecoveryPass::from_name(s).ok_or_else(|| {
        let known: Vec<&str> = RecoveryPass::all().iter().map(|p| p.name()).collect();
        format!("unknown pass '{}' (expected one of: {})", s, known.join(", "))
    })
}

/// A JSON program: functions sharing one symbol map and edge table.
#[derive(Deserialize)]
struct ProgramFile {
    #[serde(default)]
    arch: Architecture,
    #[serde(default)]
    symbols: SymbolMap,
    #[serde(default)]
    edges: EdgeTable,
    functions: Vec<FunctionFile>,
}

/// One function of a program file.
///
/// `instructions` must be listed in strictly increasing address order; the
/// block ranges and handles in `ast` are positions in that list.
#[derive(Deserialize)]
struct FunctionFile {
    name: String,
    instructions: Vec<Instruction>,
    ast: Sequence,
}

#[derive(Serialize)]
struct FunctionReport<'a> {
    name: &'a str,
    fused: Vec<String>,
    slots: Vec<SlotReport<'a>>,
    canary: Option<CanaryReport<'a>>,
    text: String,
}

#[derive(Serialize)]
struct SlotReport<'a> {
    id: usize,
    name: &'a str,
    displacement: i64,
    size: u8,
}

#[derive(Serialize)]
struct CanaryReport<'a> {
    call: String,
    store: String,
    slot: &'a str,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Decompile {
            input,
            function,
            json,
            level,
            enable,
            disable,
            no_comments,
            color,
            slot_prefix,
            canary_symbol,
            canary_window,
            canary_loads,
        } => {
            let mut config = DecompilerConfig::new(level)
                .with_comments(!no_comments)
                .with_colors(color);
            for pass in enable {
                config = config.enable_pass(pass);
            }
            for pass in disable {
                config = config.disable_pass(pass);
            }
            config.slot_prefix = slot_prefix;

            let mut canary = CanaryConfig::default();
            if let Some(symbol) = canary_symbol {
                canary.guard_symbol = symbol;
            }
            if let Some(window) = canary_window {
                canary.scan_window = window;
            }
            canary.match_loads = canary_loads;
            config = config.with_canary(canary);

            decompile(&input, function.as_deref(), json, config)?;
        }
        Commands::Passes { level } => {
            print_passes(&DecompilerConfig::new(level));
        }
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_program(path: &Path) -> Result<ProgramFile> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read program: {}", path.display()))?;
    serde_json::from_str(&data)
        .with_context(|| format!("Failed to parse program: {}", path.display()))
}

fn decompile(
    path: &Path,
    only: Option<&str>,
    json: bool,
    config: DecompilerConfig,
) -> Result<()> {
    let program = load_program(path)?;
    info!(
        "loaded {} functions, {} symbols",
        program.functions.len(),
        program.symbols.len()
    );

    let mut functions = Vec::with_capacity(program.functions.len());
    for func in program.functions {
        if only.is_some_and(|name| name != func.name) {
            continue;
        }
        let stream = InstructionStream::new(func.instructions)
            .with_context(|| format!("Invalid instructions in function {}", func.name))?;
        func.ast
            .validate(&stream)
            .with_context(|| format!("Invalid tree in function {}", func.name))?;
        debug!("{}: {} instructions", func.name, stream.len());
        functions.push(FunctionInput {
            name: func.name,
            stream,
            ast: func.ast,
        });
    }

    if functions.is_empty() {
        match only {
            Some(name) => bail!("Function not found: {}", name),
            None => bail!("Program contains no functions"),
        }
    }

    let decompiler = Decompiler::new(config, X86Classifier::new(program.arch));
    let results = decompiler.decompile_many(&functions, &program.symbols);

    if json {
        let reports: Vec<FunctionReport> = functions
            .iter()
            .zip(&results)
            .map(|(func, result)| {
                let text = decompiler.render(
                    &func.name,
                    result,
                    &func.stream,
                    &program.symbols,
                    &program.edges,
                );
                report(&func.name, result, text)
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    for (i, (func, result)) in functions.iter().zip(&results).enumerate() {
        if i > 0 {
            println!();
        }
        print!(
            "{}",
            decompiler.render(
                &func.name,
                result,
                &func.stream,
                &program.symbols,
                &program.edges
            )
        );
    }

    Ok(())
}

fn report<'a>(name: &'a str, result: &'a DecompiledFunction, text: String) -> FunctionReport<'a> {
    FunctionReport {
        name,
        fused: result
            .fused
            .sorted()
            .into_iter()
            .map(|addr| format!("{:#x}", addr))
            .collect(),
        slots: result
            .slots
            .iter()
            .map(|slot| SlotReport {
                id: slot.id,
                name: &slot.name,
                displacement: slot.displacement,
                size: slot.size,
            })
            .collect(),
        canary: result.canary.as_ref().map(|m| CanaryReport {
            call: format!("{:#x}", m.call_addr),
            store: format!("{:#x}", m.store_addr),
            slot: &m.slot_name,
        }),
        text,
    }
}

fn print_passes(config: &DecompilerConfig) {
    println!("{:<18} {:<8} DESCRIPTION", "PASS", "ENABLED");
    println!("{}", "-".repeat(64));
    for (pass, enabled, description) in config.list_passes() {
        println!(
            "{:<18} {:<8} {}",
            pass.name(),
            if enabled { "yes" } else { "no" },
            description
        );
    }
}
