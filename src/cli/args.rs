use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "medivault")]
#[command(about = "Offline mutation queue and sync for MediVault patient records")]
#[command(long_about = "medivault - offline queue for MediVault

Patient and prescription changes made while the MediVault service is
unreachable are queued on disk and replayed in order once it is back.

QUICK START:
  medivault login --email dr@example.org     Sign in and store the session
  medivault queue add delete-patient --id a1 --payload '{\"patientId\": 7}'
  medivault queue list                       Show pending actions
  medivault sync run                         Deliver pending actions now
  medivault sync watch                       Keep delivering as connectivity allows

OUTPUT FORMATS:
  --output pretty    Human-readable colored output (default)
  --output json      Machine-readable JSON for scripting

For more information on a specific command, run:
  medivault <command> --help")]
#[command(version, propagate_version = true)]
pub struct Cli {
    /// Output format for command results
    ///
    /// Use 'pretty' for human-readable colored output,
    /// or 'json' for machine-readable output suitable for scripting.
    /// Defaults to `general.default_output` from the config file.
    #[arg(short, long, value_enum, global = true)]
    pub output: Option<OutputFormat>,

    /// Increase log verbosity (-v info, -vv debug)
    ///
    /// Logs go to stderr. `RUST_LOG` takes precedence when set.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for command results.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable colored output.
    #[default]
    Pretty,
    /// Machine-readable JSON output.
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Inspect and edit the offline queue
    ///
    /// # Subcommands
    ///
    ///   add      Queue a mutation
    ///   list     Show pending actions in delivery order
    ///   status   Show the pending count and the next action
    ///   peek     Show the next action in full
    ///   drop     Discard the next action without delivering it
    ///
    /// # Examples
    ///
    ///   medivault queue add create-patient --id a1 --payload @patient.json
    ///   medivault queue list --output json
    ///   medivault queue drop --force
    Queue(QueueArgs),

    /// Deliver queued actions to the server
    ///
    /// # Subcommands
    ///
    ///   run        One delivery pass
    ///   watch      Deliver on reconnect and periodically while online
    ///   failures   Review actions dropped after a permanent failure
    ///
    /// # Examples
    ///
    ///   medivault sync run
    ///   medivault sync watch --interval 10
    ///   medivault sync failures --limit 5
    Sync(SyncArgs),

    /// Sign in and store the session token
    ///
    /// Queued actions are delivered with this token.
    Login {
        /// Account email
        #[arg(long)]
        email: String,

        /// Account password
        #[arg(long, env = "MEDIVAULT_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Forget the stored session
    Logout,

    /// Show the signed-in user
    Whoami,

    /// Generate shell completions
    ///
    /// # Examples
    ///
    ///   medivault completions bash > ~/.local/share/bash-completion/completions/medivault
    ///   medivault completions zsh > ~/.zfunc/_medivault
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Arguments for the queue command.
#[derive(Args)]
pub struct QueueArgs {
    #[command(subcommand)]
    pub command: QueueCommands,
}

/// Queue subcommands.
#[derive(Subcommand)]
pub enum QueueCommands {
    /// Queue a mutation
    ///
    /// Kinds: create-patient, update-patient, delete-patient,
    /// upload-prescription, update-prescription, delete-prescription.
    /// Queuing an id that is already pending does nothing.
    Add {
        /// Action kind
        kind: String,

        /// Action id used for deduplication
        ///
        /// Defaults to the payload's uploadId for upload-prescription.
        #[arg(long)]
        id: Option<String>,

        /// JSON payload, or @path to read it from a file
        #[arg(long, short = 'p')]
        payload: String,
    },

    /// List pending actions in delivery order
    List {
        /// Maximum actions to show
        #[arg(long, short = 'n')]
        limit: Option<usize>,
    },

    /// Show the pending count and the next action
    Status,

    /// Show the next action in full
    Peek,

    /// Discard the next action without delivering it
    Drop {
        /// Required, since the action is lost
        #[arg(long)]
        force: bool,
    },
}

/// Arguments for the sync command.
#[derive(Args)]
pub struct SyncArgs {
    #[command(subcommand)]
    pub command: SyncCommands,
}

/// Sync subcommands.
#[derive(Subcommand)]
pub enum SyncCommands {
    /// Run one delivery pass
    ///
    /// Stops at the first action that fails for a reason that may clear up
    /// (network, timeout, server error) and leaves it queued.
    Run,

    /// Deliver on reconnect and periodically while online
    Watch {
        /// Seconds between passes (defaults to `sync.watch_interval_secs`)
        #[arg(long, short = 'i')]
        interval: Option<u64>,

        /// Stop after this many passes
        #[arg(long)]
        cycles: Option<u32>,
    },

    /// Review actions dropped after a permanent failure
    Failures {
        /// Maximum failures to show
        #[arg(long, short = 'n', default_value = "20")]
        limit: usize,

        /// Delete the failure log
        #[arg(long)]
        clear: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default_output_is_unset() {
        let cli = Cli::try_parse_from(["medivault", "queue", "list"]).unwrap();
        assert!(cli.output.is_none());
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_cli_output_format_short() {
        let cli = Cli::try_parse_from(["medivault", "-o", "json", "queue", "status"]).unwrap();
        assert_eq!(cli.output, Some(OutputFormat::Json));
    }

    #[test]
    fn test_cli_verbose_counts() {
        let cli = Cli::try_parse_from(["medivault", "sync", "run", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_cli_queue_add() {
        let cli = Cli::try_parse_from([
            "medivault",
            "queue",
            "add",
            "delete-patient",
            "--id",
            "a1",
            "--payload",
            r#"{"patientId": 7}"#,
        ])
        .unwrap();

        if let Commands::Queue(args) = cli.command {
            if let QueueCommands::Add { kind, id, payload } = args.command {
                assert_eq!(kind, "delete-patient");
                assert_eq!(id.as_deref(), Some("a1"));
                assert!(payload.contains("patientId"));
                return;
            }
        }
        panic!("Expected queue add");
    }

    #[test]
    fn test_cli_sync_watch() {
        let cli =
            Cli::try_parse_from(["medivault", "sync", "watch", "--interval", "5", "--cycles", "2"])
                .unwrap();
        if let Commands::Sync(args) = cli.command {
            if let SyncCommands::Watch { interval, cycles } = args.command {
                assert_eq!(interval, Some(5));
                assert_eq!(cycles, Some(2));
                return;
            }
        }
        panic!("Expected sync watch");
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["medivault"]).is_err());
        assert!(Cli::try_parse_from(["medivault", "queue"]).is_err());
    }
}
