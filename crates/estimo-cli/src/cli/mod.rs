use clap::{Args, Parser, Subcommand, ValueEnum};

/// Top-level CLI parser for the `est` binary.
#[derive(Debug, Parser)]
#[command(name = "est", version, about = "Estimo - team effort and risk estimation")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose mode (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Database path, overriding `database.path` from configuration
    #[arg(long, global = true, value_name = "PATH")]
    pub db: Option<String>,
}

/// Global flags shared by every command.
#[derive(Clone, Debug, Default)]
pub struct GlobalFlags {
    pub quiet: bool,
    pub verbose: bool,
    pub db: Option<String>,
}

impl Cli {
    #[must_use]
    pub fn global_flags(&self) -> GlobalFlags {
        GlobalFlags {
            quiet: self.quiet,
            verbose: self.verbose,
            db: self.db.clone(),
        }
    }
}

#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    /// Create the database (running migrations) and optionally seed roles.
    Init(InitArgs),
    /// Talk to the router over stdin: `/cmd args`, `#N` to pick a choice, anything else is text.
    Console(ConsoleArgs),
    /// Print the report of one epic.
    Report(ReportArgs),
}

#[derive(Clone, Debug, Args)]
pub struct InitArgs {
    /// Role to create if missing (repeatable)
    #[arg(long = "role", value_name = "NAME")]
    pub roles: Vec<String>,
}

#[derive(Clone, Debug, Args)]
pub struct ConsoleArgs {
    /// Handle to speak as
    #[arg(long = "as", value_name = "HANDLE")]
    pub handle: String,

    /// Conversation id (defaults to one per handle)
    #[arg(long)]
    pub conversation: Option<String>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ReportFormat {
    Json,
    Text,
}

#[derive(Clone, Debug, Args)]
pub struct ReportArgs {
    /// Epic number
    pub number: String,

    /// Output format
    #[arg(short, long, default_value = "json")]
    pub format: ReportFormat,
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};
    use pretty_assertions::assert_eq;

    use super::{Cli, Commands, ReportFormat};

    #[test]
    fn clap_command_tree_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from(["est", "report", "E-1", "--db", ":memory:", "--quiet"])
            .expect("cli should parse");
        let flags = cli.global_flags();
        assert!(flags.quiet);
        assert_eq!(flags.db.as_deref(), Some(":memory:"));
        match cli.command {
            Commands::Report(args) => {
                assert_eq!(args.number, "E-1");
                assert_eq!(args.format, ReportFormat::Json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn init_collects_repeated_roles() {
        let cli = Cli::try_parse_from(["est", "init", "--role", "dev", "--role", "qa"])
            .expect("cli should parse");
        match cli.command {
            Commands::Init(args) => assert_eq!(args.roles, vec!["dev", "qa"]),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn console_requires_a_handle() {
        assert!(Cli::try_parse_from(["est", "console"]).is_err());
        let cli = Cli::try_parse_from(["est", "--verbose", "console", "--as", "@ann"])
            .expect("cli should parse");
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Console(ref a) if a.handle == "@ann"));
    }

    #[test]
    fn report_format_rejects_unknown_values() {
        assert!(Cli::try_parse_from(["est", "report", "E-1", "--format", "xml"]).is_err());
    }
}
