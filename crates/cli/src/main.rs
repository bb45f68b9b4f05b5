mod dot;
mod json;

use std::collections::BTreeSet;
use std::ffi::OsString;
use std::fs;
use std::io::{BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use anyhow::Error;
use clap::{Parser, Subcommand};
use humansize::{format_size, DECIMAL};
use log::LevelFilter;
use serde::Serialize;
use replidoc::{ActorId, ActorPolicy, Change, Document, LoadOptions, ReadDoc};
use replidoc::encoding::{EncodeOptions, ENCODE_FULL};
use crate::dot::generate_svg_with_dot;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Log more. Pass twice for trace logging.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new, empty replidoc file on disk
    Create {
        filename: PathBuf,

        /// Initialize the document with the contents of this JSON file. The file must contain a
        /// JSON object.
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Actor id (32 hex characters) to edit as. Defaults to a random actor.
        #[arg(short, long)]
        actor: Option<ActorId>,

        /// Force overwrite the file which exists with the same name.
        #[arg(short, long)]
        force: bool,
    },

    /// Dump (cat) the contents of a replidoc file to stdout or to a file
    Cat {
        /// Replidoc file to read
        filename: PathBuf,

        /// Output contents to the named file instead of stdout
        #[arg(short, long)]
        output: Option<OsString>,

        /// Use pretty JSON output
        #[arg(short, long)]
        pretty: bool,

        /// Only print the value at this path (eg `cards.0.title`)
        #[arg(long)]
        path: Option<String>,
    },

    /// Set the value at a path to some JSON.
    ///
    /// Objects become maps and arrays become lists. Setting index N of a list with N items
    /// appends to it.
    Set {
        /// Replidoc file to modify
        filename: PathBuf,

        /// Dot separated path to the value to set, eg `cards.0.title`
        path: String,

        /// JSON value. Use - to read the value from stdin.
        value: String,

        /// Insert a new element into the list at this index instead of replacing one
        #[arg(short, long)]
        insert: bool,

        /// Store strings as text objects, which merge per character
        #[arg(short, long)]
        text: bool,

        /// Message to store in the change
        #[arg(short, long)]
        message: Option<String>,

        /// Edit as this actor instead of the actor stored in the file
        #[arg(short, long)]
        actor: Option<ActorId>,
    },

    /// Delete the value at a path
    Delete {
        /// Replidoc file to modify
        filename: PathBuf,

        /// Dot separated path to the value to delete
        path: String,

        /// Edit as this actor instead of the actor stored in the file
        #[arg(short, long)]
        actor: Option<ActorId>,
    },

    /// Print the changes contained within a replidoc file, in causal order
    Log {
        /// Replidoc file to read
        filename: PathBuf,

        /// Output the changes in JSON format
        #[arg(short, long)]
        json: bool,

        /// Also print the ops in each change
        #[arg(long)]
        ops: bool,
    },

    /// Get (print) the current heads of a replidoc file
    Heads {
        /// Replidoc file to read
        filename: PathBuf,
    },

    /// Merge the changes from one or more replidoc files into another
    Merge {
        /// The file to merge into
        filename: PathBuf,

        /// Files to merge from. These are not modified.
        #[arg(required = true)]
        from: Vec<PathBuf>,

        /// Output the result to the specified filename instead of overwriting the target
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print some statistics about a replidoc file
    Stats {
        /// Replidoc file to read
        filename: PathBuf,

        /// Output the result to the specified filename. If missing, output is printed to stdout.
        #[arg(short, long)]
        output: Option<OsString>,
    },

    /// Rewrite a replidoc file, eg to change how its stored.
    Repack {
        filename: PathBuf,

        /// Output the result to the specified filename. If missing, the file is overwritten.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Don't compress the change records.
        #[arg(short, long)]
        uncompressed: bool,

        /// Don't store the local actor id in the file. The next replica to load it gets a fresh
        /// one.
        #[arg(long)]
        no_actor: bool,
    },

    /// Generate a diagram of the causal graph contained in a replidoc file.
    ///
    /// This depends on having the `dot` tool from [graphviz](https://graphviz.org/download/)
    /// installed on your computer.
    Dot {
        /// File to read
        filename: PathBuf,

        /// Output the dot source instead of rendering it to SVG
        #[arg(short, long)]
        no_render: bool,

        /// Output the result to the specified filename. If missing, output is saved to
        /// (filename).svg / .dot.
        ///
        /// Use -o- to output to stdout instead.
        #[arg(short, long)]
        output: Option<OsString>,

        /// Path to `dot` command
        #[arg(long)]
        dot_path: Option<OsString>,
    },
}

fn parse_doc(filename: &Path) -> Result<Document, Error> {
    let data = fs::read(filename)?;
    Ok(Document::load(&data)?)
}

fn load_file(filename: &Path, actor: Option<ActorId>) -> Result<Document, Error> {
    let data = fs::read(filename)?;
    let policy = match actor {
        Some(actor) => ActorPolicy::Explicit(actor),
        None => ActorPolicy::Reuse,
    };
    Ok(Document::load_with(&data, LoadOptions::default().actor(policy))?)
}

#[derive(Serialize)]
struct LogEntry<'a> {
    hash: String,
    actor: String,
    seq: u64,
    start_op: u64,
    time: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
    deps: Vec<String>,
    ops: usize,
}

impl<'a> From<&'a Change> for LogEntry<'a> {
    fn from(change: &'a Change) -> Self {
        Self {
            hash: change.hash().to_string(),
            actor: change.actor().to_string(),
            seq: change.seq(),
            start_op: change.start_op(),
            time: change.time(),
            message: change.message(),
            deps: change.deps().iter().map(|h| h.to_string()).collect(),
            ops: change.len(),
        }
    }
}

#[derive(Serialize)]
struct Stats {
    file_size: usize,
    file_size_human: String,
    changes: usize,
    ops: usize,
    actors: usize,
    heads: Vec<String>,
    pending: usize,
    missing_deps: Vec<String>,
}

fn main() -> Result<(), Error> {
    let cli: Cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    match cli.command {
        Commands::Create { filename, input, actor, force } => {
            let mut doc = Document::with_actor(actor.unwrap_or_else(ActorId::random));

            if let Some(input) = input {
                let content: serde_json::Value = serde_json::from_str(&fs::read_to_string(input)?)?;
                let serde_json::Value::Object(fields) = content else {
                    anyhow::bail!("The input file must contain a JSON object");
                };
                doc.change(|tx| {
                    for (k, v) in fields.iter() {
                        let slot = json::Slot::Put(k.as_str().into());
                        json::write_json(tx, &replidoc::ROOT, slot, v, false)?;
                    }
                    Ok(())
                })?;
            }

            let data = doc.save_with(&ENCODE_FULL);
            maybe_overwrite(&filename, &data, force)?;
        }

        Commands::Cat { filename, output, pretty, path } => {
            let doc = parse_doc(&filename)?;
            let value = match path {
                None => doc.hydrate(),
                Some(path) => json::read_path(&doc, &path)?,
            };
            write_serde_data(output, pretty, &value)?;
        }

        Commands::Set { filename, path, value, insert, text, message, actor } => {
            let mut doc = load_file(&filename, actor)?;

            let value = if value == "-" {
                let mut s = String::new();
                std::io::stdin().read_to_string(&mut s)?;
                s
            } else { value };
            let value: serde_json::Value = serde_json::from_str(&value)?;

            json::set_path(&mut doc, &path, &value, insert, text, message)?;
            log::info!("New heads {:?}", doc.heads());
            fs::write(&filename, doc.save())?;
        }

        Commands::Delete { filename, path, actor } => {
            let mut doc = load_file(&filename, actor)?;
            json::delete_path(&mut doc, &path)?;
            fs::write(&filename, doc.save())?;
        }

        Commands::Log { filename, json, ops } => {
            let doc = parse_doc(&filename)?;
            for change in doc.changes() {
                if json {
                    let entry = LogEntry::from(change);
                    println!("{}", serde_json::to_string(&entry)?);
                    continue;
                }

                println!("change {}", change.hash());
                println!("Actor: {} seq {}", change.actor(), change.seq());
                if !change.deps().is_empty() {
                    let deps: Vec<String> = change.deps().iter().map(|h| h.to_string()).collect();
                    println!("Deps:  {}", deps.join(" "));
                }
                println!("Time:  {}", change.time());
                if let Some(message) = change.message() {
                    println!("\n    {message}");
                }
                if ops {
                    println!();
                    for op in change.ops() {
                        println!("    {:?}", op);
                    }
                }
                println!();
            }
        }

        Commands::Heads { filename } => {
            let doc = parse_doc(&filename)?;
            let heads: Vec<String> = doc.heads().iter().map(|h| h.to_string()).collect();
            println!("{}", serde_json::to_string(&heads)?);
        }

        Commands::Merge { filename, from, output } => {
            let mut doc = load_file(&filename, None)?;
            for path in from {
                let other = load_file(&path, None)?;
                let result = doc.merge(&other)?;
                println!("{}: applied {} changes ({} already known)",
                    path.display(), result.applied.len(), result.duplicates);
                for (hash, err) in &result.rejected {
                    eprintln!("Warning: rejected change {hash}: {err}");
                }
                if result.pending > 0 {
                    eprintln!("Warning: {} changes are waiting on missing dependencies", result.pending);
                }
            }
            fs::write(output.unwrap_or(filename), doc.save())?;
        }

        Commands::Stats { filename, output } => {
            let data = fs::read(&filename)?;
            let doc = Document::load(&data)?;

            let actors: BTreeSet<ActorId> = doc.changes().iter().map(|c| *c.actor()).collect();
            let stats = Stats {
                file_size: data.len(),
                file_size_human: format_size(data.len(), DECIMAL),
                changes: doc.num_changes(),
                ops: doc.num_ops(),
                actors: actors.len(),
                heads: doc.heads().iter().map(|h| h.to_string()).collect(),
                pending: doc.num_pending(),
                missing_deps: doc.get_missing_deps().iter().map(|h| h.to_string()).collect(),
            };
            write_serde_data(output, true, &stats)?;
        }

        Commands::Repack { filename, output, uncompressed, no_actor } => {
            let data = fs::read(&filename)?;
            let doc = Document::load(&data)?;
            let opts = EncodeOptions::default()
                .compress_content(!uncompressed)
                .store_actor(!no_actor);
            let out = doc.save_with(&opts);
            println!("{} -> {}", format_size(data.len(), DECIMAL), format_size(out.len(), DECIMAL));
            fs::write(output.unwrap_or(filename), out)?;
        }

        Commands::Dot { filename, no_render, output, dot_path } => {
            let doc = parse_doc(&filename)?;
            let dot_input = doc.causal_graph().to_dot_graph();

            let (content, ext) = if no_render {
                (dot_input, "dot")
            } else {
                (generate_svg_with_dot(dot_input, dot_path)?, "svg")
            };

            match output {
                Some(o) if o == "-" => print!("{content}"),
                Some(o) => fs::write(o, content)?,
                None => {
                    let out = filename.with_extension(ext);
                    eprintln!("Writing to {}", out.display());
                    fs::write(out, content)?;
                }
            }
        }
    }

    Ok(())
}

fn write_serde_data<T: Serialize>(output: Option<OsString>, pretty: bool, val: &T) -> Result<(), Error> {
    let output = output.filter(|path| path != "-");

    let mut writer: Box<dyn Write> = match output {
        Some(path) => Box::new(BufWriter::new(fs::File::create(path)?)),
        None => Box::new(BufWriter::new(std::io::stdout())),
    };

    if pretty {
        serde_json::to_writer_pretty(&mut writer, val)?;
    } else {
        serde_json::to_writer(&mut writer, val)?;
    }
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

fn maybe_overwrite(output: &Path, new_data: &[u8], force: bool) -> Result<(), Error> {
    let file_result = fs::OpenOptions::new()
        .create_new(!force)
        .create(true)
        .write(true)
        .truncate(true)
        .open(output);

    if let Err(x) = file_result.as_ref() {
        if x.kind() == ErrorKind::AlreadyExists {
            eprintln!("Output file '{}' already exists. Overwrite by passing -f", output.display());
        }
    }

    file_result?.write_all(new_data)?;
    Ok(())
}
