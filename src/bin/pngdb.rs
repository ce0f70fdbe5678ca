//! pngdb command-line driver
//!
//! Pushes files into a database file, lists the virtual directory tree and
//! extracts files or raw entries back out.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use pngdb::{Config, DbEntry, DirEntry, EntryId, FileBackend, PngDbError, Result, Store};
use tracing_subscriber::{fmt, EnvFilter};

/// pngdb
#[derive(Parser, Debug)]
#[command(name = "pngdb")]
#[command(about = "Single-file content-addressable store for PNG files")]
#[command(version)]
struct Args {
    /// Database file
    #[arg(short, long, default_value = "db.pngdb", global = true)]
    db: PathBuf,

    /// Open the database without write access
    #[arg(long, global = true)]
    read_only: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Store one file and list it under the root directory
    Push {
        /// The file to store
        file: PathBuf,
    },

    /// Store every *.png file of a directory that is not yet in the database
    PushDir {
        /// The directory to scan
        dir: PathBuf,
    },

    /// Recursively list a virtual directory
    ListDir {
        /// Directory path ("" is the root)
        #[arg(default_value = "")]
        path: String,
    },

    /// Write a stored file back to disk
    Extract {
        /// Virtual path, e.g. "/image.png"
        path: String,

        /// Output file (defaults to the base name of the path)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the raw bytes of an entry
    Cat {
        /// Entry id in hex
        id: String,
    },
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,pngdb=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let read_only = args.read_only
        || matches!(
            args.command,
            Commands::ListDir { .. } | Commands::Extract { .. } | Commands::Cat { .. }
        );

    let config = Config::builder()
        .db_path(&args.db)
        .read_only(read_only)
        .build();
    let db = FileBackend::open(config)?;
    tracing::debug!("pngdb v{} opened {}", pngdb::VERSION, args.db.display());

    match args.command {
        Commands::Push { file } => {
            let size = push_file(&db, &file)?;
            println!("{}: {} bytes", file.display(), size);
        }
        Commands::PushDir { dir } => push_dir(&db, &dir)?,
        Commands::ListDir { path } => list_dir(&db, &path)?,
        Commands::Extract { path, output } => extract(&db, &path, output)?,
        Commands::Cat { id } => {
            let entry = db.get(&EntryId::from_hex(&id)?)?;
            io::stdout().write_all(entry.raw())?;
        }
    }
    Ok(())
}

// =============================================================================
// Commands
// =============================================================================

fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Store a file's bytes and register it as `/<name>`; returns its size
fn push_file(db: &FileBackend, file: &Path) -> Result<u32> {
    let name = base_name(file);
    let raw = fs::read(file)?;
    let size = u32::try_from(raw.len()).map_err(|_| {
        PngDbError::InvalidEntry(format!("{}: file too large", file.display()))
    })?;

    let content = if raw.is_empty() {
        None
    } else {
        let entry = DbEntry::with_level(raw, db.config().compression_level)?;
        Some(db.push(&entry)?)
    };

    db.push_to_dir("", &DirEntry::file(name.clone(), size))?;
    db.set_file_ref(content.as_ref(), &format!("/{}", name))?;
    Ok(size)
}

fn push_dir(db: &FileBackend, dir: &Path) -> Result<()> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().map_or(false, |ext| ext == "png"))
        .collect();
    files.sort();

    for file in files {
        let name = base_name(&file);
        match db.has_file_ref(&format!("/{}", name)) {
            Ok(true) => continue,
            Ok(false) => {}
            Err(e) => {
                eprintln!("error: {}: {}", name, e);
                continue;
            }
        }
        if let Err(e) = push_file(db, &file) {
            eprintln!("error: {}: {}", name, e);
            continue;
        }
        let stats = db.stats();
        println!(
            "{}: {:.1}%, {} / {}",
            name,
            100.0 * stats.reuse_ratio(),
            stats.push_reuse,
            stats.push_new
        );
    }
    println!("success");
    Ok(())
}

fn list_dir(db: &FileBackend, path: &str) -> Result<()> {
    let entries = match db.get_dir(path) {
        Ok(entries) => entries,
        Err(PngDbError::NotFound) => Vec::new(),
        Err(e) => return Err(e),
    };
    for entry in entries {
        let full = format!("{}/{}", path, entry.name);
        if entry.is_file() {
            println!("file: {}, {} bytes", full, entry.size);
        } else if entry.is_dir() {
            println!("dir: {}/", full);
            list_dir(db, &full)?;
        } else {
            println!("{:04X}: {}", entry.mode, full);
        }
    }
    Ok(())
}

fn extract(db: &FileBackend, path: &str, output: Option<PathBuf>) -> Result<()> {
    let content = db.get_file_ref(path)?;
    let output = output.unwrap_or_else(|| PathBuf::from(base_name(Path::new(path))));

    let raw = match &content {
        Some(id) => {
            println!("entry id: {}", id);
            db.get(id)?.into_raw()
        }
        None => Vec::new(),
    };
    fs::write(&output, &raw)?;
    println!("wrote {} bytes to {}", raw.len(), output.display());
    Ok(())
}
