use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "class-store")]
#[command(about = "Inspect classes and resources in class directories, jars and zips")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Primary input (class file, jar/zip or directory); repeatable
    #[arg(short = 'p', long = "path", value_name = "PATH", global = true)]
    pub paths: Vec<PathBuf>,

    /// Library input scanned for classes only; repeatable
    #[arg(long = "lib", value_name = "PATH", global = true)]
    pub libs: Vec<PathBuf>,

    /// Refuse to walk directories
    #[arg(long, global = true)]
    pub no_walk: bool,

    #[arg(long, value_name = "FILTER", global = true)]
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// List registered classes
    Classes {
        /// Only primary (own) classes
        #[arg(long)]
        own: bool,
    },
    /// List every registered resource key
    Resources,
    /// List a class's methods with their code lengths
    Methods { class_name: String },
    /// Print one method's bytecode as hex
    Bytecode {
        class_name: String,
        method: String,
        descriptor: String,
    },
    /// Write a resource's raw bytes to stdout
    Cat { resource: String },
}
