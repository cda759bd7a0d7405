//! The command-line driver: thin plumbing around the semantic core.
//!
//! Parsing and native code generation live behind the [`Frontend`] and
//! [`Backend`] contracts; the driver owns the command surface, the pass
//! pipeline, diagnostics rendering, and exit codes.

use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use vela_ir::passes::run_mandatory_passes;
use vela_shared::diag::DiagnosticSink;

mod build;
mod global_options;
pub mod toolchain;

pub use build::{BuildOptions, EmitType, TraceSpec};
pub use global_options::GlobalOptions;

#[derive(Debug, Parser)]
#[command(name = "velac", about = "The Vela compiler")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOptions,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Compile inputs into the requested artifact.
    Build(BuildOptions),
    /// Type-check inputs without producing an artifact.
    Check(BuildOptions),
}

/// The front-end contract: parsing, name lookup, type checking, and lowering
/// to raw IR happen behind this seam.
pub trait Frontend {
    /// Check the inputs and lower them into an IR module. `None` means the
    /// inputs were too broken to lower; diagnostics explain why.
    fn lower(
        &mut self,
        options: &BuildOptions,
        diagnostics: &mut DiagnosticSink,
    ) -> Option<vela_ir::Module>;

    /// The inference trace recorded under `--trace-inference`, if any.
    fn take_trace(&mut self) -> Option<String> {
        None
    }
}

/// The back-end contract: native emission and linking.
pub trait Backend {
    fn emit(
        &mut self,
        module: &vela_ir::Module,
        options: &BuildOptions,
        diagnostics: &mut DiagnosticSink,
    ) -> Option<PathBuf>;
}

#[derive(Debug)]
pub struct Driver {
    global: GlobalOptions,
    pub errors_emitted: usize,
}

impl Driver {
    pub fn new(global: GlobalOptions) -> Driver {
        Driver {
            global,
            errors_emitted: 0,
        }
    }

    /// Run a command to completion. Returns the process exit code: zero on
    /// success, non-zero when diagnostics carry errors.
    pub fn run(
        &mut self,
        command: Command,
        frontend: &mut dyn Frontend,
        backend: &mut dyn Backend,
    ) -> i32 {
        vela_shared::logger::init(self.global.log_level);

        let (options, check_only) = match command {
            Command::Build(options) => (options, false),
            Command::Check(options) => (options, true),
        };

        let mut diagnostics = DiagnosticSink::new();
        let module = frontend.lower(&options, &mut diagnostics);

        if let Some(trace) = frontend.take_trace() {
            print!("{}", trace);
        }

        let Some(mut module) = module else {
            return self.finish(diagnostics);
        };

        if check_only || options.typecheck_only {
            return self.finish(diagnostics);
        }

        for function in module.function_ids().collect::<Vec<_>>() {
            run_mandatory_passes(&mut module, function, &mut diagnostics);
        }
        if diagnostics.has_errors() {
            return self.finish(diagnostics);
        }

        match options.emit {
            // The raw artifacts are emitted by the front-end itself.
            EmitType::RawAst | EmitType::RawIr => {}
            EmitType::Ir => {
                if let Err(error) = write_ir(&module, options.output.as_deref()) {
                    log::error!("cannot write IR: {}", error);
                    return 1;
                }
            }
            EmitType::Llvm | EmitType::Binary => {
                backend.emit(&module, &options, &mut diagnostics);
            }
        }

        self.finish(diagnostics)
    }

    fn finish(&mut self, diagnostics: DiagnosticSink) -> i32 {
        let failed = diagnostics.has_errors();
        for diag in diagnostics.iter() {
            eprintln!("{}", diag);
            self.errors_emitted += 1;
        }
        if failed {
            1
        } else {
            0
        }
    }
}

fn write_ir(module: &vela_ir::Module, output: Option<&std::path::Path>) -> std::io::Result<()> {
    match output {
        Some(path) => std::fs::write(path, format!("{}", module)),
        None => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            write!(lock, "{}", module)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::{Mutex, MutexGuard};

    use clap::Parser;

    use vela_shared::{
        access::{AccessEffect, AccessEffectSet},
        diag::{Diagnostic, DiagnosticSink},
        scope::ScopeId,
        site::Site,
        ty::Type,
    };

    use crate::{Backend, BuildOptions, Cli, Command, Driver, EmitType, Frontend};

    // `Driver::run` touches the process-wide logger; serialize the tests
    // that call it so level assertions stay deterministic.
    fn run_lock() -> MutexGuard<'static, ()> {
        static LOCK: Mutex<()> = Mutex::new(());
        LOCK.lock().unwrap_or_else(|e| e.into_inner())
    }

    struct MockFrontend {
        broken: bool,
    }

    impl Frontend for MockFrontend {
        fn lower(
            &mut self,
            _options: &BuildOptions,
            diagnostics: &mut DiagnosticSink,
        ) -> Option<vela_ir::Module> {
            if self.broken {
                diagnostics.report(Diagnostic::error("undefined name 'x'", Site::default()));
                return None;
            }
            let mut module = vela_ir::Module::new("main");
            let mut f = vela_ir::Function::new(
                "main",
                Site::default(),
                vela_ir::Linkage::Public,
                vec![],
                Type::word(),
            );
            let entry = f.append_entry_block(ScopeId(0));
            let id = module.add_function(f);
            let mut b = vela_ir::Builder::new(&mut module, id, entry);
            let slot = b.alloc_stack(Type::word());
            b.store(vela_ir::Operand::word(0), vela_ir::Operand::register(slot));
            let access = b.access(
                AccessEffectSet::singleton(AccessEffect::Let),
                vela_ir::Operand::register(slot),
            );
            let loaded = b.load(vela_ir::Operand::register(access));
            b.end_access(vela_ir::Operand::register(access));
            b.store(
                vela_ir::Operand::register(loaded),
                vela_ir::Operand::parameter(entry, 0),
            );
            b.ret();
            Some(module)
        }
    }

    struct NullBackend;

    impl Backend for NullBackend {
        fn emit(
            &mut self,
            _module: &vela_ir::Module,
            _options: &BuildOptions,
            _diagnostics: &mut DiagnosticSink,
        ) -> Option<PathBuf> {
            None
        }
    }

    fn parse(args: &[&str]) -> Cli {
        Cli::parse_from(args)
    }

    #[test]
    fn cli_recognizes_the_documented_flags() {
        let cli = parse(&[
            "velac",
            "build",
            "main.vela",
            "--modules",
            "--import-builtin",
            "--no-std",
            "--typecheck",
            "--trace-inference",
            "main.vela:16",
            "--emit",
            "ir",
            "--transform",
            "dead-code,exclusivity",
            "-L",
            "/usr/lib",
            "-l",
            "m",
            "-o",
            "out",
            "-O",
        ]);
        let Command::Build(options) = cli.command else {
            panic!("expected a build command");
        };
        assert!(options.compile_as_modules);
        assert!(options.import_builtin);
        assert!(options.no_std);
        assert!(options.typecheck_only);
        assert_eq!(options.trace_inference.as_ref().map(|t| t.line), Some(16));
        assert_eq!(options.emit, EmitType::Ir);
        assert_eq!(options.transform, vec!["dead-code", "exclusivity"]);
        assert_eq!(options.libraries, vec!["m"]);
        assert!(options.optimize);
    }

    #[test]
    fn check_of_a_sound_module_exits_zero() {
        let _guard = run_lock();
        let cli = parse(&["velac", "check", "main.vela"]);
        let mut driver = Driver::new(cli.global);
        let code = driver.run(cli.command, &mut MockFrontend { broken: false }, &mut NullBackend);
        assert_eq!(code, 0);
        assert_eq!(driver.errors_emitted, 0);
    }

    #[test]
    fn front_end_errors_produce_a_nonzero_exit() {
        let _guard = run_lock();
        let cli = parse(&["velac", "build", "main.vela"]);
        let mut driver = Driver::new(cli.global);
        let code = driver.run(cli.command, &mut MockFrontend { broken: true }, &mut NullBackend);
        assert_eq!(code, 1);
        assert_eq!(driver.errors_emitted, 1);
    }

    #[test]
    fn build_runs_the_mandatory_passes() {
        let _guard = run_lock();
        let cli = parse(&["velac", "build", "main.vela", "--emit", "llvm"]);
        let mut driver = Driver::new(cli.global);
        let code = driver.run(cli.command, &mut MockFrontend { broken: false }, &mut NullBackend);
        assert_eq!(code, 0);
    }

    #[test]
    fn configured_log_level_takes_effect() {
        let _guard = run_lock();
        let cli = parse(&["velac", "--log-level", "debug", "check", "main.vela"]);
        let mut driver = Driver::new(cli.global);
        driver.run(cli.command, &mut MockFrontend { broken: false }, &mut NullBackend);
        assert_eq!(log::max_level(), log::LevelFilter::Debug);
    }
}
