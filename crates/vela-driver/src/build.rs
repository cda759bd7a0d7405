use std::path::PathBuf;
use std::str::FromStr;

use clap::{Args, ValueEnum};

/// The artifact a compilation produces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum EmitType {
    #[value(name = "raw-ast")]
    RawAst,
    #[value(name = "raw-ir")]
    RawIr,
    #[value(name = "ir")]
    Ir,
    #[value(name = "llvm")]
    Llvm,
    #[value(name = "binary")]
    Binary,
}

impl std::fmt::Display for EmitType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EmitType::RawAst => "raw-ast",
            EmitType::RawIr => "raw-ir",
            EmitType::Ir => "ir",
            EmitType::Llvm => "llvm",
            EmitType::Binary => "binary",
        };
        write!(f, "{}", s)
    }
}

/// A `file:line` position at which inference tracing activates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceSpec {
    pub file: String,
    pub line: u32,
}

impl FromStr for TraceSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<TraceSpec, String> {
        let Some((file, line)) = s.rsplit_once(':') else {
            return Err(format!("expected file:line, found '{}'", s));
        };
        let line = line
            .parse::<u32>()
            .map_err(|_| format!("invalid line number in '{}'", s))?;
        Ok(TraceSpec {
            file: file.to_string(),
            line,
        })
    }
}

impl std::fmt::Display for TraceSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

#[derive(Debug, Args)]
pub struct BuildOptions {
    #[arg(help = "Source files or module roots to compile")]
    pub inputs: Vec<PathBuf>,

    #[arg(long = "modules", help = "Compile inputs as separate modules")]
    pub compile_as_modules: bool,

    #[arg(long = "import-builtin", help = "Make the built-in module visible")]
    pub import_builtin: bool,

    #[arg(long = "no-std", help = "Do not link the standard library")]
    pub no_std: bool,

    #[arg(long = "typecheck", help = "Stop after type checking")]
    pub typecheck_only: bool,

    #[arg(
        long = "trace-inference",
        value_name = "file:line",
        help = "Emit a constraint-solving trace for the given source position"
    )]
    pub trace_inference: Option<TraceSpec>,

    #[arg(long = "emit", value_enum, default_value_t = EmitType::Binary, help = "The artifact to produce")]
    pub emit: EmitType,

    #[arg(
        long = "transform",
        value_delimiter = ',',
        help = "Apply only the named IR transformations"
    )]
    pub transform: Vec<String>,

    #[arg(short = 'L', value_name = "path", help = "Add a library search path")]
    pub library_paths: Vec<PathBuf>,

    #[arg(short = 'l', value_name = "name", help = "Link the given library")]
    pub libraries: Vec<String>,

    #[arg(short = 'o', long = "output", help = "Write the artifact here")]
    pub output: Option<PathBuf>,

    #[arg(short = 'O', long = "optimize", help = "Optimize the produced artifact")]
    pub optimize: bool,
}

#[cfg(test)]
mod tests {
    use super::TraceSpec;

    #[test]
    fn trace_spec_parses_file_and_line() {
        let spec: TraceSpec = "main.vela:16".parse().expect("valid spec");
        assert_eq!(spec.file, "main.vela");
        assert_eq!(spec.line, 16);

        assert!("main.vela".parse::<TraceSpec>().is_err());
        assert!("main.vela:x".parse::<TraceSpec>().is_err());
    }
}
