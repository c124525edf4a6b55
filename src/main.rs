//! yaHALMAT — a HALMAT emulator command-line front end.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use halmat::disasm;
use halmat::engine::decode::{is_op, numop, popcode, tag};
use halmat::io::{UnitIoBackend, UnitTarget};
use halmat::loader;
use halmat::{debugger, Engine};

#[derive(Parser, Debug)]
#[command(name = "halmat", about = "yaHALMAT - HALMAT emulator", version)]
struct Cli {
    /// Path to a compiled HALMAT binary.
    halmat_bin: PathBuf,

    /// Disassemble only, do not execute.
    #[arg(long)]
    disasm: bool,

    /// Literal table path (default: litfile.bin alongside the binary).
    #[arg(long)]
    litfile: Option<PathBuf>,

    /// HAL/S source file for character-literal recovery (default:
    /// SOURCECO.txt alongside the binary).
    #[arg(long)]
    source: Option<PathBuf>,

    /// Map unit N to PATH (repeatable). PATH may be stdin/stdout/stderr.
    #[arg(long = "unit", value_name = "N=PATH")]
    units: Vec<String>,

    /// Translate CHAR output through EBCDIC code page 037.
    #[arg(long)]
    ebcdic: bool,

    /// Enter the interactive debugger.
    #[arg(long)]
    debug: bool,

    /// Print one line per executed instruction.
    #[arg(long)]
    trace: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("yaHALMAT: {msg}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), String> {
    let mut engine = Engine::new();

    loader::load_code(&mut engine, &cli.halmat_bin).map_err(|e| e.to_string())?;

    let litfile = cli.litfile.clone().unwrap_or_else(|| sibling_path(&cli.halmat_bin, "litfile.bin"));
    if cli.litfile.is_some() {
        loader::load_litfile(&mut engine, &litfile).map_err(|e| e.to_string())?;
    } else {
        let _ = loader::load_litfile(&mut engine, &litfile);
    }

    let source = cli.source.clone().unwrap_or_else(|| sibling_path(&cli.halmat_bin, "SOURCECO.txt"));
    if cli.source.is_some() {
        loader::load_strings(&mut engine, &source).map_err(|e| e.to_string())?;
    } else {
        let _ = loader::load_strings(&mut engine, &source);
    }

    engine.build_flow_table();

    if cli.disasm {
        println!("HALMAT DISASSEMBLY: {}", cli.halmat_bin.display());
        println!(
            "{} bytes, {} block(s)\n",
            engine.num_blocks * halmat::engine::BLOCK_WORDS * 4,
            engine.num_blocks
        );
        print!("{}", disasm::disasm(&engine));
        return Ok(());
    }

    let mut backend = UnitIoBackend::new(cli.ebcdic);
    for spec in &cli.units {
        let (num, path) = spec
            .split_once('=')
            .ok_or_else(|| format!("invalid --unit value {spec:?}, expected N=PATH"))?;
        let unit: i32 = num.parse().map_err(|_| format!("invalid unit number {num:?}"))?;
        backend.map_unit(unit, UnitTarget::parse(path));
    }
    engine.io_backend = Box::new(backend);

    engine.io_backend.init().map_err(|e| e.to_string())?;

    if cli.debug {
        let stdin = std::io::stdin();
        let stdout = std::io::stdout();
        debugger::run(&mut engine, stdin.lock(), stdout.lock()).map_err(|e| e.to_string())?;
    } else if cli.trace {
        while !engine.is_halted() {
            if (engine.pc as usize) < engine.code.len() {
                let w = engine.code[engine.pc as usize];
                if is_op(w) {
                    let pop = popcode(w);
                    let name = halmat::classes::opcodes::name(pop).unwrap_or("???");
                    eprintln!("[{:4}] {name}  (numop={} tag={})", engine.pc, numop(w), tag(w));
                }
            }
            if engine.step().is_err() {
                break;
            }
        }
    } else if let Err(err) = engine.run() {
        engine.io_backend.shutdown();
        return Err(err.to_string());
    }

    engine.io_backend.shutdown();

    if engine.halted == halmat::engine::HaltState::Error {
        return Err(format!("execution error at pc={}", engine.pc));
    }

    Ok(())
}

fn sibling_path(bin: &Path, name: &str) -> PathBuf {
    match bin.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.join(name),
        _ => PathBuf::from(name),
    }
}
