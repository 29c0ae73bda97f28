//! erp-migrate - 铸造 ERP 数据库迁移命令行

use std::process::ExitCode;

use clap::{ArgAction, Args, Parser, Subcommand};
use nobal_bootstrap::{RuntimeConfig, init_runtime, shutdown_signal};
use nobal_errors::AppError;
use tracing::warn;

mod commands;
mod output;
mod probe;

#[derive(Parser)]
#[command(
    name = "erp-migrate",
    about = "Schema migrations and maintenance for the foundry ERP database",
    version
)]
struct Cli {
    #[arg(
        long,
        global = true,
        default_value = "config",
        env = "ERP_CONFIG_DIR",
        help = "Directory holding default.toml and {APP_ENV}.toml"
    )]
    config_dir: String,
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending migrations in version order
    Migrate(MigrateArgs),
    /// Show what migrate would do without executing anything
    Plan(TargetArgs),
    /// List every migration with its applied / pending / drifted state
    Status,
    /// Compare the ledger against the catalog
    Verify,
    /// Record migrations up to a version as applied without running them
    Baseline(BaselineArgs),
    /// Rewrite drifted checksums in the ledger to the catalog values
    Repair,
    /// Read-only schema inspection
    #[command(subcommand)]
    Inspect(InspectCommands),
    /// Empty tables with foreign key checks disabled for the session
    Truncate(TruncateArgs),
    /// GET the configured API endpoints and report status and latency
    Probe,
    /// Check connectivity, ledger, lock and pending migrations
    Doctor,
}

#[derive(Args)]
struct TargetArgs {
    #[arg(long, help = "Stop after this version (inclusive)")]
    target: Option<i64>,
}

#[derive(Args)]
struct MigrateArgs {
    #[command(flatten)]
    target: TargetArgs,
    #[arg(
        long,
        action = ArgAction::SetTrue,
        help = "Only print the plan, same as the plan command"
    )]
    dry_run: bool,
}

#[derive(Args)]
struct BaselineArgs {
    #[arg(long, help = "Highest version already present in the database")]
    version: i64,
}

#[derive(Subcommand)]
enum InspectCommands {
    /// List base tables of the current database
    Tables,
    /// Show the columns of a table
    Describe { table: String },
    /// Show foreign keys on and referencing a table
    ForeignKeys { table: String },
}

#[derive(Args)]
struct TruncateArgs {
    #[arg(required = true, help = "Tables to empty")]
    tables: Vec<String>,
    #[arg(
        long,
        action = ArgAction::SetTrue,
        help = "Confirm that all rows of the given tables will be deleted"
    )]
    yes: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let runtime = RuntimeConfig {
        config_dir: cli.config_dir.clone(),
        json_logs: cli.json,
    };

    let config = match init_runtime(&runtime) {
        Ok(config) => config,
        Err(e) => return fail(&e, cli.json),
    };

    let result = tokio::select! {
        result = commands::run(cli.command, config, cli.json) => result,
        _ = shutdown_signal() => {
            warn!("Interrupted, in-flight statement may have completed on the server");
            Err(AppError::internal("interrupted"))
        }
    };

    match result {
        Ok(code) => code,
        Err(e) => fail(&e, cli.json),
    }
}

fn fail(error: &AppError, json: bool) -> ExitCode {
    eprintln!("{}", output::render_error(error, json));
    ExitCode::from(error.exit_code())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_migrate_target() {
        let cli = Cli::try_parse_from(["erp-migrate", "--json", "migrate", "--target", "7"]).unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Migrate(args) => {
                assert_eq!(args.target.target, Some(7));
                assert!(!args.dry_run);
            }
            _ => panic!("expected migrate"),
        }
    }

    #[test]
    fn test_truncate_requires_tables() {
        assert!(Cli::try_parse_from(["erp-migrate", "truncate", "--yes"]).is_err());

        let cli =
            Cli::try_parse_from(["erp-migrate", "truncate", "stock_ledger", "stock_balance"]).unwrap();
        match cli.command {
            Commands::Truncate(args) => {
                assert_eq!(args.tables, vec!["stock_ledger", "stock_balance"]);
                assert!(!args.yes);
            }
            _ => panic!("expected truncate"),
        }
    }

    #[test]
    fn test_parse_inspect_and_baseline() {
        let cli = Cli::try_parse_from(["erp-migrate", "inspect", "foreign-keys", "selling_sales_order"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Inspect(InspectCommands::ForeignKeys { ref table }) if table == "selling_sales_order"
        ));

        let cli = Cli::try_parse_from(["erp-migrate", "baseline", "--version", "12"]).unwrap();
        assert!(matches!(cli.command, Commands::Baseline(BaselineArgs { version: 12 })));
    }
}
