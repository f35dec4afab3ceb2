use crate::types::{ConfigName, ImageRef};
use std::path::PathBuf;
use std::str::FromStr;
use strum::{Display as StrumDisplay, EnumIter, EnumString};
use thiserror::Error;

pub const FALLBACK_SOCKET_PATH: &str = "/tmp/pinwheel.sock";

/// Socket under `$XDG_RUNTIME_DIR/pinwheel/`, or [`FALLBACK_SOCKET_PATH`] when there is none.
pub fn default_socket_path() -> PathBuf {
    xdg::BaseDirectories::with_prefix("pinwheel")
        .place_runtime_file("pinwheel.sock")
        .unwrap_or_else(|_| PathBuf::from(FALLBACK_SOCKET_PATH))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, StrumDisplay)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum Verb {
    Spin,
    Add,
    Remove,
    ClearImage,
    Cap,
    CapClear,
    FontSize,
    Save,
    Load,
    Delete,
    List,
    Export,
    Import,
    Scroll,
    Resize,
    Finished,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Spin,
    Add {
        text: String,
        image: Option<ImageRef>,
    },
    Remove(usize),
    ClearImage(usize),
    Cap(ImageRef),
    CapClear,
    FontSize(i64),
    Save(String),
    Load(ConfigName),
    Delete(ConfigName),
    List,
    Export(PathBuf),
    Import(PathBuf),
    Scroll,
    Resize,
    /// The presentation layer finished animating the current spin.
    Finished,
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Empty command line")]
    Empty,
    #[error("Unknown command '{0}'")]
    UnknownVerb(String),
    #[error("'{verb}' is missing its <{argument}> argument")]
    MissingArgument { verb: Verb, argument: &'static str },
    #[error("'{verb}' expects a number, got '{value}'")]
    InvalidNumber { verb: Verb, value: String },
    #[error("Too many arguments for '{0}'")]
    TrailingArguments(Verb),
    #[error(transparent)]
    Quoting(#[from] shell_words::ParseError),
}

impl Command {
    pub fn verb(&self) -> Verb {
        match self {
            Self::Spin => Verb::Spin,
            Self::Add { .. } => Verb::Add,
            Self::Remove(_) => Verb::Remove,
            Self::ClearImage(_) => Verb::ClearImage,
            Self::Cap(_) => Verb::Cap,
            Self::CapClear => Verb::CapClear,
            Self::FontSize(_) => Verb::FontSize,
            Self::Save(_) => Verb::Save,
            Self::Load(_) => Verb::Load,
            Self::Delete(_) => Verb::Delete,
            Self::List => Verb::List,
            Self::Export(_) => Verb::Export,
            Self::Import(_) => Verb::Import,
            Self::Scroll => Verb::Scroll,
            Self::Resize => Verb::Resize,
            Self::Finished => Verb::Finished,
        }
    }

    /// Encodes the command as a single shell-quoted line (without the newline).
    pub fn to_line(&self) -> String {
        let mut words = vec![self.verb().to_string()];
        match self {
            Self::Add { text, image } => {
                words.push(text.clone());
                words.extend(image.as_ref().map(ToString::to_string));
            }
            Self::Remove(index) | Self::ClearImage(index) => words.push(index.to_string()),
            Self::Cap(image) => words.push(image.to_string()),
            Self::FontSize(px) => words.push(px.to_string()),
            Self::Save(name) => words.push(name.clone()),
            Self::Load(name) | Self::Delete(name) => words.push(name.to_string()),
            Self::Export(path) | Self::Import(path) => {
                words.push(path.to_string_lossy().into_owned())
            }
            Self::Spin
            | Self::CapClear
            | Self::List
            | Self::Scroll
            | Self::Resize
            | Self::Finished => {}
        }
        shell_words::join(words)
    }

    pub fn parse_line(line: &str) -> Result<Self, ProtocolError> {
        let words = shell_words::split(line)?;
        let mut words = words.into_iter();
        let head = words.next().ok_or(ProtocolError::Empty)?;
        let verb = Verb::from_str(&head).map_err(|_| ProtocolError::UnknownVerb(head))?;
        let mut args = Args { verb, words };

        let command = match verb {
            Verb::Spin => Self::Spin,
            Verb::Add => Self::Add {
                text: args.required("text")?,
                image: args.optional().map(ImageRef::new),
            },
            Verb::Remove => Self::Remove(args.number("index")?),
            Verb::ClearImage => Self::ClearImage(args.number("index")?),
            Verb::Cap => Self::Cap(ImageRef::new(args.required("image")?)),
            Verb::CapClear => Self::CapClear,
            Verb::FontSize => Self::FontSize(args.number("px")?),
            // Names are validated by the wheel so an empty name can be reported to the user.
            Verb::Save => Self::Save(args.optional().unwrap_or_default()),
            Verb::Load => Self::Load(args.name()?),
            Verb::Delete => Self::Delete(args.name()?),
            Verb::List => Self::List,
            Verb::Export => Self::Export(PathBuf::from(args.optional().unwrap_or_default())),
            Verb::Import => Self::Import(PathBuf::from(args.required("path")?)),
            Verb::Scroll => Self::Scroll,
            Verb::Resize => Self::Resize,
            Verb::Finished => Self::Finished,
        };

        args.finish()?;
        Ok(command)
    }
}

impl FromStr for Command {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_line(s)
    }
}

struct Args {
    verb: Verb,
    words: std::vec::IntoIter<String>,
}

impl Args {
    fn optional(&mut self) -> Option<String> {
        self.words.next()
    }

    fn required(&mut self, argument: &'static str) -> Result<String, ProtocolError> {
        self.words.next().ok_or(ProtocolError::MissingArgument {
            verb: self.verb,
            argument,
        })
    }

    /// A configuration name, trimmed the same way `save` trims it.
    fn name(&mut self) -> Result<ConfigName, ProtocolError> {
        let raw = self.required("name")?;
        ConfigName::parse(&raw).ok_or(ProtocolError::MissingArgument {
            verb: self.verb,
            argument: "name",
        })
    }

    fn number<T: FromStr>(&mut self, argument: &'static str) -> Result<T, ProtocolError> {
        let value = self.required(argument)?;
        value.parse().map_err(|_| ProtocolError::InvalidNumber {
            verb: self.verb,
            value,
        })
    }

    fn finish(mut self) -> Result<(), ProtocolError> {
        match self.words.next() {
            Some(_) => Err(ProtocolError::TrailingArguments(self.verb)),
            None => Ok(()),
        }
    }
}
