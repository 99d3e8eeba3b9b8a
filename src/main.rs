use anyhow::{Context, Result};
use clap::Parser;
use class_store::cli::{Cli, Commands};
use class_store::config::Config;
use class_store::context::{FileStructContext, StructContext};
use class_store::naming::{source_entry_name, to_binary_name};
use serde::Serialize;
use std::io::Write;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Serialize)]
struct ClassSummary {
    name: String,
    binary_name: String,
    own: bool,
    source: String,
    source_entry: Option<String>,
    super_class: Option<String>,
    interfaces: Vec<String>,
    fields: usize,
    methods: usize,
    major_version: u16,
    content_hash: String,
}

#[derive(Debug, Serialize)]
struct MethodSummary {
    name: String,
    descriptor: String,
    access_flags: u16,
    code_length: Option<u32>,
}

#[derive(Debug, Serialize)]
struct BytecodeOutput {
    class_name: String,
    method: String,
    descriptor: String,
    length: usize,
    code: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::resolve(&cli)?;
    init_tracing(&config.log_filter);

    let mut context = config.load_context()?;
    let result = run(&context, &cli.command);
    let closed = context.close();
    result?;
    closed
}

fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(context: &FileStructContext, command: &Commands) -> Result<()> {
    match command {
        Commands::Classes { own } => {
            let classes = context.classes();
            let mut summaries: Vec<ClassSummary> = classes
                .values()
                .filter(|class| !*own || class.is_own())
                .map(|class| ClassSummary {
                    name: class.qualified_name.clone(),
                    binary_name: to_binary_name(&class.qualified_name),
                    own: class.is_own(),
                    source: class.source.clone(),
                    source_entry: source_entry_name(&class.source, None),
                    super_class: class.super_class.clone(),
                    interfaces: class.interfaces.clone(),
                    fields: class.fields.len(),
                    methods: class.methods.len(),
                    major_version: class.major_version,
                    content_hash: class.content_hash.clone(),
                })
                .collect();
            summaries.sort_by(|a, b| a.name.cmp(&b.name));
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        }
        Commands::Resources => {
            println!("{}", serde_json::to_string_pretty(&context.resources())?);
        }
        Commands::Methods { class_name } => {
            let class = context
                .get_class(&normalize_class_name(class_name))
                .with_context(|| format!("Class not found: {class_name}"))?;
            let methods: Vec<MethodSummary> = class
                .methods
                .iter()
                .map(|m| MethodSummary {
                    name: m.name.clone(),
                    descriptor: m.descriptor.clone(),
                    access_flags: m.access_flags,
                    code_length: m.code_length,
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&methods)?);
        }
        Commands::Bytecode {
            class_name,
            method,
            descriptor,
        } => {
            let class = context
                .get_class(&normalize_class_name(class_name))
                .with_context(|| format!("Class not found: {class_name}"))?;
            let handle = class
                .method(method, descriptor)
                .with_context(|| format!("Method not found: {class_name}.{method}{descriptor}"))?;
            let code = handle
                .bytecode(context, &class)?
                .with_context(|| format!("Method has no code: {class_name}.{method}{descriptor}"))?;
            let output = BytecodeOutput {
                class_name: class.qualified_name.clone(),
                method: method.clone(),
                descriptor: descriptor.clone(),
                length: code.len(),
                code: hex::encode(&code),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Commands::Cat { resource } => {
            let bytes = context
                .read_resource(resource)?
                .with_context(|| format!("Resource not found: {resource}"))?;
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&bytes)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

/// Accepts both `a.b.C` and `a/b/C`.
fn normalize_class_name(name: &str) -> String {
    name.trim().trim_end_matches(".class").replace('.', "/")
}
