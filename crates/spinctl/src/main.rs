use clap::{Parser, Subcommand};
use spinctl::protocol::{self, Command};
use spinctl::types::{ConfigName, ImageRef};
use std::io::Write;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "spinctl", version, about = "Control a running pinwheel daemon", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Control socket of the daemon (defaults to the XDG runtime directory)
    #[arg(short = 's', long, global = true)]
    socket: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone)]
enum Commands {
    /// Spin the wheel.
    Spin,
    /// Append a segment.
    Add {
        text: String,
        /// Image reference shown on the segment (e.g. a data URL)
        #[arg(short = 'i', long)]
        image: Option<String>,
    },
    /// Remove the segment at INDEX.
    Remove { index: usize },
    /// Drop the image of the segment at INDEX.
    ClearImage { index: usize },
    /// Set the cap image, or clear it with --clear.
    Cap {
        image: Option<String>,
        #[arg(long, conflicts_with = "image")]
        clear: bool,
    },
    /// Set the segment font size in pixels (8 to 30).
    FontSize {
        #[arg(allow_negative_numbers = true)]
        px: i64,
    },
    /// Save the current wheel as a named configuration.
    Save { name: String },
    /// Load a named configuration.
    Load { name: String },
    /// Delete a named configuration.
    Delete { name: String },
    /// Announce the saved configuration names.
    List,
    /// Export the current wheel to a file or directory.
    Export { path: Option<PathBuf> },
    /// Apply a previously exported file without saving it.
    Import { path: PathBuf },
    /// Report a scroll; interrupts a spin in flight.
    Scroll,
    /// Report a viewport resize.
    Resize,
}

impl Commands {
    fn into_command(self) -> anyhow::Result<Command> {
        Ok(match self {
            Self::Spin => Command::Spin,
            Self::Add { text, image } => Command::Add {
                text,
                image: image.map(ImageRef::new),
            },
            Self::Remove { index } => Command::Remove(index),
            Self::ClearImage { index } => Command::ClearImage(index),
            Self::Cap { clear: true, .. } => Command::CapClear,
            Self::Cap {
                image: Some(image), ..
            } => Command::Cap(ImageRef::new(image)),
            Self::Cap { image: None, .. } => anyhow::bail!("Either an image or --clear is required"),
            Self::FontSize { px } => Command::FontSize(px),
            Self::Save { name } => Command::Save(name),
            Self::Load { name } => Command::Load(config_name(&name)?),
            Self::Delete { name } => Command::Delete(config_name(&name)?),
            Self::List => Command::List,
            Self::Export { path } => Command::Export(absolute(path.unwrap_or_default())?),
            Self::Import { path } => Command::Import(absolute(path)?),
            Self::Scroll => Command::Scroll,
            Self::Resize => Command::Resize,
        })
    }
}

fn config_name(raw: &str) -> anyhow::Result<ConfigName> {
    ConfigName::parse(raw).ok_or_else(|| anyhow::anyhow!("Configuration name must not be empty"))
}

/// The daemon resolves paths against its own working directory, so send absolute ones.
fn absolute(path: PathBuf) -> anyhow::Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path);
    }
    Ok(std::env::current_dir()?.join(path))
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let socket = cli.socket.unwrap_or_else(protocol::default_socket_path);
    let command = cli.command.into_command()?;
    send_command(&socket, &command)
}

fn send_command(socket: &Path, command: &Command) -> anyhow::Result<()> {
    let mut stream = UnixStream::connect(socket).map_err(|e| {
        anyhow::anyhow!(
            "Failed to connect to pinwheel daemon at {}: {}. Is pinwheel running?",
            socket.display(),
            e
        )
    })?;

    let line = command.to_line();
    log::debug!("Sending '{}'", line);
    writeln!(stream, "{}", line)?;
    Ok(())
}
