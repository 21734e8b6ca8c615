//! kura command-line tool.
//!
//! Usage:
//!   kura ls /
//!   kura mkdir /docs
//!   kura put ./notes.txt /docs/notes.txt --mime text/plain
//!   kura cat /docs/notes.txt
//!   kura rm -r /docs
//!
//! The database defaults to `$XDG_DATA_HOME/kura/kura.db`; override it with
//! `--db` or `KURA_DB`. A RON config is read from `--config`, or from
//! `$XDG_CONFIG_HOME/kura/kura.ron` when present.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::AsyncReadExt;
use tracing_subscriber::{EnvFilter, fmt};

use kura_fs::{FileDesc, FsConfig, KuraFs, Stat};

const DEFAULT_MIME: &str = "application/octet-stream";

/// Browse and edit a kura filesystem database.
#[derive(Parser, Debug)]
#[command(name = "kura", version)]
#[command(about = "Browse and edit a kura filesystem database")]
struct Args {
    /// Database file
    #[arg(long, env = "KURA_DB", global = true)]
    db: Option<PathBuf>,

    /// RON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List a directory
    Ls {
        #[arg(default_value = "/")]
        path: String,
        /// Show size and modification time
        #[arg(short, long)]
        long: bool,
    },
    /// Create a directory (the parent must exist)
    Mkdir { path: String },
    /// Show metadata for a file or directory
    Stat { path: String },
    /// Write a file's content to stdout
    Cat { path: String },
    /// Store a local file (or `-` for stdin) in one write
    Put {
        local: PathBuf,
        path: String,
        #[arg(long, default_value = DEFAULT_MIME)]
        mime: String,
    },
    /// Append a local file (or `-` for stdin) to an existing file
    Append { path: String, local: PathBuf },
    /// Create an empty file
    Touch {
        path: String,
        #[arg(long, default_value = DEFAULT_MIME)]
        mime: String,
    },
    /// Remove a file or directory
    Rm {
        path: String,
        /// Remove a non-empty directory and everything below it
        #[arg(short, long)]
        recursive: bool,
    },
    /// Stream a file out to a local path
    Export { path: String, local: PathBuf },
    /// Stream a local file in, replacing any existing content
    Import {
        local: PathBuf,
        path: String,
        #[arg(long, default_value = DEFAULT_MIME)]
        mime: String,
    },
    /// Show record counts and stored bytes
    Df,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = resolve_config(args.db, args.config.as_deref())?;
    if let Some(parent) = config.database.as_deref().and_then(Path::parent) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating data directory {}", parent.display()))?;
    }

    let fs = KuraFs::mount(config).context("mounting filesystem")?;
    run(&fs, args.command).await
}

async fn run(fs: &KuraFs, command: Command) -> Result<()> {
    match command {
        Command::Ls { path, long } => {
            let listing = fs.readdir(&path).await?;
            for dir in &listing.dirs {
                if long {
                    println!("{:>12}  {:>13}  {}/", "-", dir.updated_at, dir.name);
                } else {
                    println!("{}/", dir.name);
                }
            }
            for file in &listing.files {
                if long {
                    println!("{:>12}  {:>13}  {}", file.size, file.updated_at, file.name);
                } else {
                    println!("{}", file.name);
                }
            }
        }
        Command::Mkdir { path } => {
            fs.mkdir(&path).await?;
        }
        Command::Stat { path } => {
            print!("{}", format_stat(&fs.stat(&path).await?));
        }
        Command::Cat { path } => {
            let mut stdout = tokio::io::stdout();
            fs.export_to(&path, &mut stdout).await?;
        }
        Command::Put { local, path, mime } => {
            let data = read_local(&local).await?;
            let file = fs.write_file(&path, &data, FileDesc::new(mime)).await?;
            tracing::info!(%path, size = file.size, blocks = file.block_ids.len(), "stored");
        }
        Command::Append { path, local } => {
            let data = read_local(&local).await?;
            let file = fs.append(path.as_str(), &data).await?;
            tracing::info!(%path, size = file.size, "appended");
        }
        Command::Touch { path, mime } => {
            if !fs.exists(&path).await? {
                fs.create_file(&path, FileDesc::new(mime)).await?;
            }
        }
        Command::Rm { path, recursive } => {
            let removed = fs.remove(&path, recursive).await?;
            tracing::info!(
                %path,
                directories = removed.directories,
                files = removed.files,
                blocks = removed.blocks,
                "removed"
            );
        }
        Command::Export { path, local } => {
            let mut out = tokio::fs::File::create(&local)
                .await
                .with_context(|| format!("creating {}", local.display()))?;
            let written = fs.export_to(&path, &mut out).await?;
            tracing::info!(%path, local = %local.display(), written, "exported");
        }
        Command::Import { local, path, mime } => {
            let mut input = tokio::fs::File::open(&local)
                .await
                .with_context(|| format!("opening {}", local.display()))?;
            let file = fs.import_from(&path, &mut input, FileDesc::new(mime)).await?;
            tracing::info!(%path, size = file.size, blocks = file.block_ids.len(), "imported");
        }
        Command::Df => {
            let usage = fs.usage().await?;
            println!("directories  {}", usage.directories);
            println!("files        {}", usage.files);
            println!("blocks       {}", usage.blocks);
            println!("stored bytes {}", usage.stored_bytes);
        }
    }
    Ok(())
}

/// Build the effective config: file first, then `--db` on top, then the
/// default database location if neither named one.
fn resolve_config(db: Option<PathBuf>, config: Option<&Path>) -> Result<FsConfig> {
    let config_path = config.map(Path::to_path_buf).or_else(|| {
        dirs::config_dir()
            .map(|p| p.join("kura").join("kura.ron"))
            .filter(|p| p.exists())
    });

    let mut fs_config = match config_path {
        Some(path) => FsConfig::load(&path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => FsConfig::default(),
    };
    if let Some(db) = db {
        fs_config.database = Some(db);
    }
    if fs_config.database.is_none() {
        fs_config.database = Some(default_db_path());
    }
    Ok(fs_config)
}

fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("kura")
        .join("kura.db")
}

async fn read_local(path: &Path) -> Result<Vec<u8>> {
    if path == Path::new("-") {
        let mut data = Vec::new();
        tokio::io::stdin().read_to_end(&mut data).await?;
        return Ok(data);
    }
    tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))
}

fn format_stat(stat: &Stat) -> String {
    let kind = if stat.is_directory { "directory" } else { "file" };
    let mut out = format!(
        "name:     {}\ntype:     {kind}\nsize:     {}\ncreated:  {}\nupdated:  {}\n",
        stat.name, stat.size, stat.created_at, stat.updated_at
    );
    if let Some(mime) = &stat.mime_type {
        out.push_str(&format!("mime:     {mime}\n"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_db_flag_overrides_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("kura.ron");
        std::fs::write(&config_path, "(database: Some(\"/from/config.db\"), prefetch_depth: 5)")
            .unwrap();

        let config = resolve_config(None, Some(&config_path)).unwrap();
        assert_eq!(config.database, Some(PathBuf::from("/from/config.db")));
        assert_eq!(config.prefetch_depth, 5);

        let config = resolve_config(Some(dir.path().join("flag.db")), Some(&config_path)).unwrap();
        assert_eq!(config.database, Some(dir.path().join("flag.db")));
        assert_eq!(config.prefetch_depth, 5);
    }

    #[test]
    fn test_parse_commands() {
        let args = Args::try_parse_from(["kura", "--db", "x.db", "rm", "-r", "/a"]).unwrap();
        assert_eq!(args.db, Some(PathBuf::from("x.db")));
        assert!(matches!(
            args.command,
            Command::Rm { ref path, recursive: true } if path == "/a"
        ));
    }

    #[test]
    fn test_format_stat() {
        let stat = Stat {
            name: "a.txt".into(),
            is_directory: false,
            size: 3,
            created_at: 1,
            updated_at: 2,
            mime_type: Some("text/plain".into()),
        };
        let text = format_stat(&stat);
        assert!(text.contains("type:     file"));
        assert!(text.contains("mime:     text/plain"));
    }

    #[tokio::test]
    async fn test_run_against_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let fs = KuraFs::mount(FsConfig::with_database(dir.path().join("kura.db"))).unwrap();
        let local = dir.path().join("in.txt");
        std::fs::write(&local, b"from disk").unwrap();

        run(&fs, Command::Mkdir { path: "/d".into() }).await.unwrap();
        run(
            &fs,
            Command::Import {
                local: local.clone(),
                path: "/d/in.txt".into(),
                mime: "text/plain".into(),
            },
        )
        .await
        .unwrap();
        let out = dir.path().join("out.txt");
        run(
            &fs,
            Command::Export {
                path: "/d/in.txt".into(),
                local: out.clone(),
            },
        )
        .await
        .unwrap();
        assert_eq!(std::fs::read(&out).unwrap(), b"from disk");

        run(
            &fs,
            Command::Rm {
                path: "/d".into(),
                recursive: true,
            },
        )
        .await
        .unwrap();
        assert!(!fs.exists("/d").await.unwrap());
    }
}
