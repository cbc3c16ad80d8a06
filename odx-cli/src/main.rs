use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

use odx_db::{Database, EffectiveLayer, LoadOptions, MessageRole};

mod json;

#[derive(Parser)]
#[command(
    name = "odx-cli",
    about = "Inspect ODX diagnostic databases and code messages against them"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Keep loading when references cannot be resolved
    #[arg(long, global = true)]
    lenient: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Summarize the layers and services of a database
    Info {
        /// Input file (.pdx or .odx)
        input: PathBuf,
    },
    /// List the services visible on a layer, inheritance applied
    Services {
        input: PathBuf,
        /// Layer short name
        layer: String,
    },
    /// Find the services whose messages match a coded message
    Identify {
        input: PathBuf,
        layer: String,
        /// Message bytes as hex (e.g. "1003" or "10 03")
        data: String,
    },
    /// Decode a coded message against every applicable definition
    Decode {
        input: PathBuf,
        layer: String,
        /// Message bytes as hex
        data: String,
        /// Request the message responds to, as hex; restricts matching to
        /// responses of the service that owns this request
        #[arg(long)]
        request: Option<String>,
    },
    /// Encode a request for a named service from JSON parameter values
    Encode {
        input: PathBuf,
        layer: String,
        /// Service short name
        service: String,
        /// Parameter values as a JSON object
        values: String,
    },
}

fn load_database(input: &Path, lenient: bool) -> Result<Database> {
    let options = LoadOptions {
        strict: !lenient,
        ..LoadOptions::default()
    };
    match input.extension().and_then(|e| e.to_str()) {
        Some("pdx") => Database::from_pdx_file(input, options)
            .with_context(|| format!("loading PDX from {}", input.display())),
        Some("odx") => {
            let text = std::fs::read_to_string(input)
                .with_context(|| format!("reading {}", input.display()))?;
            Database::from_xml(&[text], options)
                .with_context(|| format!("loading ODX from {}", input.display()))
        }
        Some(ext) => bail!("Unknown file extension: .{ext}. Use .pdx or .odx"),
        None => bail!("Cannot detect format: file has no extension"),
    }
}

fn effective_layer(db: &Database, name: &str) -> Result<std::sync::Arc<EffectiveLayer>> {
    let handle = db
        .layer_by_name(name)
        .with_context(|| format!("no diagnostic layer named '{name}'"))?;
    db.effective_layer(handle)
        .with_context(|| format!("flattening inheritance of layer '{name}'"))
}

fn role_name(role: MessageRole) -> &'static str {
    match role {
        MessageRole::Request => "request",
        MessageRole::PosResponse => "pos-response",
        MessageRole::NegResponse => "neg-response",
        MessageRole::GlobalNegResponse => "global-neg-response",
    }
}

fn run_info(input: &Path, lenient: bool) -> Result<()> {
    let db = load_database(input, lenient)?;

    println!("File:    {}", input.display());
    for (handle, layer) in db.layers() {
        let effective = db.effective_layer(handle)?;
        println!(
            "{:<17} {}  (services: {}, dops: {}, tables: {})",
            layer.kind.odx_name(),
            layer.short_name,
            effective.services.len(),
            effective.dops.len(),
            effective.tables.len()
        );
    }
    Ok(())
}

fn run_services(input: &Path, layer: &str, lenient: bool) -> Result<()> {
    let db = load_database(input, lenient)?;
    let effective = effective_layer(&db, layer)?;

    for &(ref name, handle) in &effective.services {
        let service = db.service(handle);
        match &service.semantic {
            Some(semantic) => println!("{name}  [{semantic}]"),
            None => println!("{name}"),
        }
    }
    Ok(())
}

fn run_identify(input: &Path, layer: &str, data: &str, lenient: bool) -> Result<()> {
    let db = load_database(input, lenient)?;
    let effective = effective_layer(&db, layer)?;
    let bytes = json::parse_hex(data)?;

    let candidates = db
        .identify(&effective, &bytes)
        .with_context(|| format!("identifying '{data}' on layer '{layer}'"))?;
    for handle in candidates {
        println!("{}", db.service(handle).short_name);
    }
    Ok(())
}

fn run_decode(
    input: &Path,
    layer: &str,
    data: &str,
    request: Option<&str>,
    lenient: bool,
) -> Result<()> {
    let db = load_database(input, lenient)?;
    let effective = effective_layer(&db, layer)?;
    let bytes = json::parse_hex(data)?;
    let request_bytes = request.map(json::parse_hex).transpose()?;

    let decoded = db
        .decode_message(&effective, &bytes, request_bytes.as_deref())
        .with_context(|| format!("decoding '{data}' on layer '{layer}'"))?;
    for message in decoded {
        let rendered = serde_json::json!({
            "service": message.service_name,
            "message": message.message_name,
            "role": role_name(message.role),
            "values": json::from_param_value(&message.values),
        });
        println!("{}", serde_json::to_string_pretty(&rendered)?);
    }
    Ok(())
}

fn run_encode(
    input: &Path,
    layer: &str,
    service: &str,
    values: &str,
    lenient: bool,
) -> Result<()> {
    let db = load_database(input, lenient)?;
    let effective = effective_layer(&db, layer)?;

    let parsed: serde_json::Value =
        serde_json::from_str(values).context("parameter values must be a JSON object")?;
    let values = json::to_param_value(&parsed)?;

    let bytes = db
        .encode_request(&effective, service, &values)
        .with_context(|| format!("encoding a '{service}' request"))?;
    println!("{}", json::hex_string(&bytes));
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match cli.command {
        Command::Info { input } => run_info(&input, cli.lenient),
        Command::Services { input, layer } => run_services(&input, &layer, cli.lenient),
        Command::Identify { input, layer, data } => {
            run_identify(&input, &layer, &data, cli.lenient)
        }
        Command::Decode {
            input,
            layer,
            data,
            request,
        } => run_decode(&input, &layer, &data, request.as_deref(), cli.lenient),
        Command::Encode {
            input,
            layer,
            service,
            values,
        } => run_encode(&input, &layer, &service, &values, cli.lenient),
    }
}
