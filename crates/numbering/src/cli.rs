use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use crate::config::{LabelConfig, NumberingConfig};
use crate::format::{DisplayFormat, NumberStyle, DEFAULT_PREFIX};
use crate::scope::Scope;
use crate::service::NumberingService;

#[derive(Parser, Debug)]
#[command(name = "numbering")]
#[command(about = "Issue and inspect gap-free test numbers", long_about = None)]
pub struct Cli {
    /// Database connection URL
    #[arg(long, global = true, env = "NUMBERING_DATABASE_URL", default_value = "sqlite://numbering.db?mode=rwc")]
    pub database_url: String,

    /// Maximum database connections in pool
    #[arg(long, global = true, env = "NUMBERING_MAX_CONNECTIONS", default_value = "5")]
    pub max_connections: u32,

    /// Attempts for a conflicting counter transaction
    #[arg(long, global = true, env = "NUMBERING_MAX_RETRIES", default_value = "5")]
    pub max_retries: u32,

    /// Number style for new labels (simple, padded, roman)
    #[arg(long, global = true, env = "NUMBERING_LABEL_STYLE", default_value = "simple")]
    pub style: NumberStyle,

    /// Minimum digits for padded labels
    #[arg(long, global = true, env = "NUMBERING_LABEL_PADDING")]
    pub padding: Option<usize>,

    /// Word placed before the number
    #[arg(long, global = true, env = "NUMBERING_LABEL_PREFIX", default_value = DEFAULT_PREFIX)]
    pub prefix: String,

    /// Text placed after the number
    #[arg(long, global = true, env = "NUMBERING_LABEL_SUFFIX")]
    pub suffix: Option<String>,

    /// Write the assignment record inside the counter transaction
    #[arg(long, global = true, env = "NUMBERING_RECORD_IN_TRANSACTION")]
    pub record_in_transaction: bool,

    /// Log SQL statements
    #[arg(long, global = true, env = "NUMBERING_SQL_LOGGING")]
    pub sql_logging: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info", env = "LOG_LEVEL")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct ScopeArgs {
    /// Class the number belongs to
    #[arg(long)]
    pub class_id: String,

    #[arg(long, default_value = "")]
    pub class_name: String,

    /// Narrow the counter to one subject of the class
    #[arg(long)]
    pub subject_id: Option<String>,

    #[arg(long)]
    pub subject_name: Option<String>,

    #[arg(long, default_value = "")]
    pub teacher_id: String,

    #[arg(long, default_value = "")]
    pub teacher_name: String,
}

impl From<ScopeArgs> for Scope {
    fn from(args: ScopeArgs) -> Self {
        Scope {
            class_id: args.class_id,
            class_name: args.class_name,
            subject_id: args.subject_id,
            subject_name: args.subject_name,
            teacher_id: args.teacher_id,
            teacher_name: args.teacher_name,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ScopeKeyArgs {
    #[arg(long)]
    pub class_id: String,

    #[arg(long)]
    pub subject_id: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the counter and assignment tables
    Init,

    /// Issue the next number for a scope
    Issue {
        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Link an issued number to the test created for it
    Complete {
        /// Assignment id returned by `issue`
        assignment_id: String,

        #[arg(long)]
        entity_id: String,

        #[arg(long)]
        title: String,
    },

    /// Propagate a renamed test onto its assignments and counters
    Rename {
        entity_id: String,

        #[arg(long)]
        title: String,
    },

    /// Set the next number a scope will issue
    Reset {
        #[command(flatten)]
        scope: ScopeArgs,

        #[arg(long)]
        to: i64,
    },

    /// Show the counter of a scope
    Status {
        #[command(flatten)]
        scope: ScopeKeyArgs,
    },

    /// Suggest the next number from gaps in the assignment log
    Suggest {
        #[command(flatten)]
        scope: ScopeKeyArgs,
    },

    /// List every assignment of a scope
    List {
        #[command(flatten)]
        scope: ScopeKeyArgs,
    },

    /// List assignments that were never linked to a test
    Pending {
        #[command(flatten)]
        scope: ScopeKeyArgs,
    },

    /// List all counters of a class
    Counters {
        #[arg(long)]
        class_id: String,
    },

    /// Render a label without touching the database
    Format {
        value: i64,

        #[arg(long)]
        subject_name: Option<String>,
    },
}

impl Cli {
    pub fn config(&self) -> NumberingConfig {
        NumberingConfig {
            max_connections: self.max_connections,
            max_transaction_retries: self.max_retries,
            enable_sql_logging: self.sql_logging,
            record_in_transaction: self.record_in_transaction,
            label: LabelConfig {
                style: self.style,
                padding: self.padding,
                prefix: Some(self.prefix.clone()),
                suffix: self.suffix.clone(),
            },
            ..NumberingConfig::new(self.database_url.clone())
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(|e| anyhow!(e))?;
    println!("{}", json);
    Ok(())
}

/// Run one CLI command to completion
pub async fn execute(cli: Cli) -> Result<()> {
    let config = cli.config();

    match cli.command {
        Commands::Format { value, subject_name } => {
            let format: DisplayFormat = config.display_format().with_subject(subject_name);
            println!("{}", format.label(value)?);
            Ok(())
        }
        command => {
            let service = NumberingService::connect(&config).await?;
            execute_with_service(&service, command).await
        }
    }
}

async fn execute_with_service(service: &NumberingService, command: Commands) -> Result<()> {
    match command {
        Commands::Init => {
            service.database().ensure_schema().await?;
            println!("Schema ready");
        }
        Commands::Issue { scope } => {
            let issued = service.issue(&scope.into()).await?;
            print_json(&issued)?;
        }
        Commands::Complete {
            assignment_id,
            entity_id,
            title,
        } => match service.complete(&assignment_id, &entity_id, &title).await? {
            Some(record) => print_json(&record)?,
            None => println!("Assignment {} not found", assignment_id),
        },
        Commands::Rename { entity_id, title } => {
            let renamed = service.update_entity_title(&entity_id, &title).await?;
            println!("Renamed {} assignment(s)", renamed);
        }
        Commands::Reset { scope, to } => {
            let counter = service.reset_counter(&scope.into(), to).await?;
            print_json(&counter)?;
        }
        Commands::Status { scope } => {
            let status = service
                .counter_status(&scope.class_id, scope.subject_id.as_deref())
                .await;
            print_json(&status)?;
        }
        Commands::Suggest { scope } => {
            let suggestion = service.suggest(&scope.class_id, scope.subject_id.as_deref()).await;
            print_json(&suggestion)?;
        }
        Commands::List { scope } => {
            let records = service
                .list_assignments(&scope.class_id, scope.subject_id.as_deref())
                .await;
            print_json(&records)?;
        }
        Commands::Pending { scope } => {
            let records = service
                .pending_assignments(&scope.class_id, scope.subject_id.as_deref())
                .await;
            print_json(&records)?;
        }
        Commands::Counters { class_id } => {
            let counters = service.list_counters(&class_id).await;
            print_json(&counters)?;
        }
        Commands::Format { value, .. } => {
            return Err(anyhow!("format {} does not need a database", value));
        }
    }

    Ok(())
}
