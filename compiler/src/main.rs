use clap::{ArgAction, Parser};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use shtfl::diag::Diagnostic;
use shtfl::pass::PassId;
use shtfl::pipeline::{parse_source, run_pipeline, summary, CompilationState};
use shtfl::printer::{print_module, PrintOptions};
use shtfl::registry::CompositeAllowList;
use shtfl::{Error, LegalizeConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum EmitStage {
    /// Legalized IR
    Ir,
    /// Resolved IR, before legalization
    Parsed,
    /// JSON report of every rewrite with decoded options
    Summary,
}

#[derive(Parser, Debug)]
#[command(
    name = "shtfl",
    version,
    about = "Legalizes StableHLO ops to TFLite custom ops with FlexBuffers options"
)]
struct Cli {
    /// Input .mlir source file (`-` reads stdin)
    source: PathBuf,

    /// Output file path (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output stage
    #[arg(long, value_enum, default_value_t = EmitStage::Ir)]
    emit: EmitStage,

    /// Dialect whose ops are rewritten
    #[arg(long, default_value = "stablehlo")]
    source_dialect: String,

    /// Extra composite name to legalize under its own name (repeatable)
    #[arg(long = "composite", value_name = "NAME")]
    composites: Vec<String>,

    /// Print option blobs as `__elided__`
    #[arg(long)]
    elide_options: bool,

    /// Log pass timing (-v) and every rewrite (-vv)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .try_init();
}

fn read_source(path: &Path) -> Result<String, Error> {
    let io = |source| Error::Io {
        path: path.to_path_buf(),
        source,
    };
    if path == Path::new("-") {
        let mut s = String::new();
        std::io::stdin().read_to_string(&mut s).map_err(io)?;
        Ok(s)
    } else {
        std::fs::read_to_string(path).map_err(io)
    }
}

fn write_output(path: Option<&Path>, text: &str) -> Result<(), Error> {
    match path {
        Some(path) => std::fs::write(path, text).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        }),
        None => std::io::stdout()
            .write_all(text.as_bytes())
            .map_err(|source| Error::Io {
                path: PathBuf::from("<stdout>"),
                source,
            }),
    }
}

fn report(file: &str, diag: &Diagnostic) {
    eprintln!("shtfl: {file}:{}: {diag}", diag.location);
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let source = match read_source(&cli.source) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("shtfl: error: {e}");
            return ExitCode::from(2);
        }
    };
    let file = cli.source.display().to_string();

    let ast = match parse_source(&source) {
        Ok(ast) => ast,
        Err(Error::Parse(errors)) => {
            for err in &errors {
                eprintln!("shtfl: {file}:{err}");
            }
            return ExitCode::from(1);
        }
        Err(e) => {
            eprintln!("shtfl: error: {e}");
            return ExitCode::from(1);
        }
    };

    let config = LegalizeConfig {
        source_dialect: cli.source_dialect.clone(),
        composites: CompositeAllowList::with_extra(cli.composites.iter().cloned()),
        ..LegalizeConfig::default()
    };
    tracing::info!(
        source = %file,
        composites = config.composites.len(),
        "configured"
    );

    let terminal = match cli.emit {
        EmitStage::Parsed => PassId::Resolve,
        EmitStage::Ir | EmitStage::Summary => PassId::Legalize,
    };
    let mut state = CompilationState::new(source, ast, config);
    let outcome = run_pipeline(&mut state, terminal, |_, diags| {
        for diag in diags {
            report(&file, diag);
        }
    });
    if outcome.is_err() {
        return ExitCode::from(1);
    }

    let text = match cli.emit {
        EmitStage::Ir | EmitStage::Parsed => match &state.module {
            Some(module) => print_module(
                module,
                PrintOptions {
                    elide_bytes: cli.elide_options,
                },
            ),
            None => String::new(),
        },
        EmitStage::Summary => {
            let rendered = summary(&state).and_then(|s| {
                serde_json::to_string_pretty(&s)
                    .map_err(|e| Error::MalformedOptions(e.to_string()))
            });
            match rendered {
                Ok(json) => json + "\n",
                Err(e) => {
                    eprintln!("shtfl: error: {e}");
                    return ExitCode::from(1);
                }
            }
        }
    };

    if let Err(e) = write_output(cli.output.as_deref(), &text) {
        eprintln!("shtfl: error: {e}");
        return ExitCode::from(2);
    }

    tracing::info!(
        rewrites = state.rewrites.len(),
        warnings = state.warning_count(),
        "done"
    );
    ExitCode::SUCCESS
}
