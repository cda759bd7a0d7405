use clap::Args;

#[derive(Debug, Args)]
pub struct GlobalOptions {
    #[arg(
        long,
        env = "LOG_LEVEL",
        help = "Sets the log level",
        default_value = "info",
        hide = true,
        global = true
    )]
    pub log_level: log::LevelFilter,

    #[arg(short, long, help = "Print the compilation pipeline as it runs", global = true)]
    pub verbose: bool,
}
