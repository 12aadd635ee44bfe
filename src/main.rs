use clap::{Parser, Subcommand};
use std::io::{BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt};
use zipview::credentials::{CredentialStore, SqliteCredentialStore};
use zipview::imaging::read_image_info;
use zipview::password::{PasswordPrompt, PromptReply};
use zipview::types::path_type;
use zipview::{CancelToken, DecodeSize, FileFlags, Loader, ObjectInfo, config, output, scan, warm};

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "zipview")]
#[command(about = "Browse, thumbnail and extract images from folders and archives")]
#[command(long_about = "\
Browse, thumbnail and extract images from folders and archives

Directories and archives (zip, optionally encrypted) are both containers of
images. Archive passwords are resolved automatically:

  1. the password that last opened this archive
  2. no password
  3. every remembered fallback password
  4. an interactive prompt (terminal only, empty line cancels)

Thumbnails at the configured size are cached in an SQLite file in the data
directory, so repeat access skips decoding.

Run 'zipview gen-config' to generate a documented config.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Directory holding config.toml and the SQLite stores
    #[arg(long, default_value = ".", global = true)]
    data_dir: PathBuf,

    /// More logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the images of a directory, archive or image
    List { path: PathBuf },
    /// Decode one image at a given size and save it as PNG
    Thumb {
        path: PathBuf,
        /// Entry inside a directory or archive (default: the first)
        #[arg(long)]
        entry: Option<String>,
        /// Target size as WxH (default: the configured thumbnail size)
        #[arg(long)]
        size: Option<DecodeSize>,
        #[arg(long, default_value = "thumb.png")]
        out: PathBuf,
        /// Skip the thumbnail cache lookup
        #[arg(long)]
        no_cache: bool,
    },
    /// Write one archive entry to disk
    Extract {
        archive: PathBuf,
        entry: String,
        /// Destination (default: the entry's file name)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Show dimensions and EXIF details of an image or archive entry
    Info {
        path: PathBuf,
        #[arg(long)]
        entry: Option<String>,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Recursively list every image and archive
    All { path: PathBuf },
    /// Pre-generate thumbnails for every item in a directory
    Warm {
        dir: PathBuf,
        /// Worker count (default: config, else half the cores)
        #[arg(long)]
        workers: Option<usize>,
    },
    /// Manage remembered archive passwords
    #[command(subcommand)]
    Passwords(PasswordsCommand),
    /// Print a stock config.toml with all options documented
    GenConfig,
}

#[derive(Subcommand)]
enum PasswordsCommand {
    /// Show archives with a stored password and the fallback list
    List,
    /// Append a fallback password
    Add { password: String },
    /// Remove a fallback password
    Remove { password: String },
    /// Drop the stored password of one archive
    Forget { archive: PathBuf },
}

/// Asks on the terminal. An empty line cancels.
struct StdinPrompt;

fn read_line(question: &str) -> Option<String> {
    eprint!("{question}");
    std::io::stderr().flush().ok()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line).ok()?;
    Some(line.trim_end_matches(['\r', '\n']).to_string())
}

impl PasswordPrompt for StdinPrompt {
    fn ask(&self, archive: &Path) -> Option<PromptReply> {
        let password = read_line(&format!(
            "Password for {} (empty to cancel): ",
            archive.display()
        ))?;
        if password.is_empty() {
            return None;
        }
        let remember = read_line("Remember for other archives? [y/N] ")
            .is_some_and(|a| a.eq_ignore_ascii_case("y") || a.eq_ignore_ascii_case("yes"));
        Some(PromptReply { password, remember })
    }
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(format!("zipview={level}")));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = config::load_config(&cli.data_dir)?;

    match cli.command {
        Command::List { path } => {
            let loader = open_loader(&config, &cli.data_dir)?;
            let mut info = object_for(&path)?;
            let entries = loader.source_paths(&mut info)?.to_vec();
            output::print_listing(&info, &entries);
        }
        Command::Thumb {
            path,
            entry,
            size,
            out,
            no_cache,
        } => {
            let loader = open_loader(&config, &cli.data_dir)?;
            let size = size.unwrap_or(loader.thumbnail_size());
            let mut info = object_for(&path)?;
            let image = match entry {
                Some(entry) => loader.image_for(&mut info, Some(&entry), size, !no_cache),
                None => loader.image_at(&mut info, 0, size, !no_cache),
            };
            let Some(image) = image else {
                return Err(format!(
                    "no image decoded from {}{}",
                    path.display(),
                    info.comments.map(|c| format!(": {c}")).unwrap_or_default()
                )
                .into());
            };
            image.save(&out)?;
            println!("{}x{} → {}", image.width(), image.height(), out.display());
        }
        Command::Extract {
            archive,
            entry,
            out,
        } => {
            let loader = open_loader(&config, &cli.data_dir)?;
            let Some(file) = loader.extract_file(&archive, &entry)? else {
                return Err(format!("cannot extract {entry} from {}", archive.display()).into());
            };
            let out = out.unwrap_or_else(|| PathBuf::from(file_name(Path::new(&entry))));
            std::fs::write(&out, &file.bytes)?;
            println!("{} ({} bytes) → {}", entry, file.bytes.len(), out.display());
        }
        Command::Info { path, entry, json } => {
            let (name, bytes) = match entry {
                Some(entry) => {
                    let loader = open_loader(&config, &cli.data_dir)?;
                    let Some(file) = loader.extract_file(&path, &entry)? else {
                        return Err(format!("cannot extract {entry} from {}", path.display()).into());
                    };
                    (entry, file.bytes)
                }
                None => (file_name(&path), std::fs::read(&path)?),
            };
            let Some(info) = read_image_info(&bytes) else {
                return Err(format!("{name} is not a readable image").into());
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                output::print_info(&name, &info);
            }
        }
        Command::All { path } => {
            let objects = scan::get_all(&path);
            output::print_all(&objects, &path);
        }
        Command::Warm { dir, workers } => {
            let loader = open_loader(&config, &cli.data_dir)?;
            let workers = workers.unwrap_or_else(|| config::effective_cache_workers(&config.processing));
            let (tx, rx) = std::sync::mpsc::channel();
            let root = dir.clone();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    println!("{}", output::format_warm_event(&event, &root));
                }
            });
            let summary = warm::warm_cache(&loader, &dir, &CancelToken::new(), workers, Some(tx))?;
            printer.join().map_err(|_| "progress printer panicked")?;
            println!("Cache: {}", summary);
        }
        Command::Passwords(command) => {
            let store = SqliteCredentialStore::open(&config.credentials_path(&cli.data_dir))?;
            match command {
                PasswordsCommand::List => {
                    output::print_passwords(&store.mapped_archives(), &store.fallbacks());
                }
                PasswordsCommand::Add { password } => {
                    if password.is_empty() {
                        return Err("password must not be empty".into());
                    }
                    let added = store.add_fallback(&password);
                    println!("{}", if added > 0 { "Added" } else { "Already present" });
                }
                PasswordsCommand::Remove { password } => {
                    let removed = store.remove_fallback(&password);
                    println!("{}", if removed > 0 { "Removed" } else { "Not found" });
                }
                PasswordsCommand::Forget { archive } => {
                    let removed = store.forget_mapped(&archive);
                    println!("{}", if removed > 0 { "Forgotten" } else { "Not found" });
                }
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Loader over the data directory's stores, prompting only on a terminal.
fn open_loader(config: &config::ViewerConfig, data_dir: &Path) -> Result<Loader, Box<dyn std::error::Error>> {
    let loader = Loader::from_config(config, data_dir)?;
    Ok(if std::io::stdin().is_terminal() {
        loader.with_prompt(Arc::new(StdinPrompt))
    } else {
        loader
    })
}

fn object_for(path: &Path) -> Result<ObjectInfo, Box<dyn std::error::Error>> {
    let flags = path_type(path);
    if flags.is_unknown() {
        return Err(format!("{} is not an image, archive or directory", path.display()).into());
    }
    if flags != FileFlags::DIRECTORY && !path.exists() {
        return Err(format!("{} does not exist", path.display()).into());
    }
    Ok(ObjectInfo::new(path, flags))
}
