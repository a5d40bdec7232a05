use std::fmt;

use clap::{Parser, Subcommand, ValueEnum};

/// CLI surface definition.
#[derive(Parser, Debug)]
#[command(
    name = "lockbox",
    about = "Encrypted on-device object store",
    version,
    propagate_version = true
)]
pub struct Cli {
    /// Optional subcommand; defaults to `info` when absent.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print version and exit.
    Version,
    /// Show the domain, its directory and which secret backend is in use.
    Info,
    /// Round-trip a probe record through the store.
    Health,
    /// Manage CLI configuration.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print a stored value.
    Get { kind: ValueKind, name: String },
    /// Store a value.
    Set {
        kind: ValueKind,
        name: String,
        value: String,
    },
    /// Remove a stored value.
    Delete { kind: ValueKind, name: String },
    /// List the names of stored values of one kind.
    Keys { kind: ValueKind },
    /// Delete every record of the configured domain.
    Wipe {
        /// Required; wiping cannot be undone.
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Create a default config file if one does not exist.
    Init,
}

/// Value types the `get`/`set` family understands.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Bool,
    String,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F64,
    /// RFC 3339 UTC timestamp.
    Timestamp,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bool => "bool",
            Self::String => "string",
            Self::I16 => "i16",
            Self::U16 => "u16",
            Self::I32 => "i32",
            Self::U32 => "u32",
            Self::I64 => "i64",
            Self::U64 => "u64",
            Self::F64 => "f64",
            Self::Timestamp => "timestamp",
        };
        f.write_str(name)
    }
}
