//! Command-line arguments.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

/// Local-first media feed.
#[derive(Parser, Debug)]
#[command(name = "snapfeed")]
#[command(about = "Local-first media feed", long_about = None)]
pub struct Cli {
    /// What to do; shows the feed when omitted.
    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    /// The requested command, defaulting to [`Command::Feed`].
    pub fn into_command(self) -> Command {
        self.command.unwrap_or(Command::Feed)
    }
}

/// What the binary was asked to do.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Load the feed and log it
    Feed,

    /// Submit a local media file as a new post
    Post {
        /// Local media file
        file: PathBuf,

        /// Caption words, joined with spaces
        caption: Vec<String>,
    },

    /// Remove every stored post and user
    Clear,
}

/// Guess a MIME type from the file extension, as a picker would report it.
pub fn mime_for(file: &Path) -> Option<String> {
    let ext = file.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "pdf" => "application/pdf",
        _ => return None,
    };
    Some(mime.to_owned())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::error::ErrorKind;

    use super::*;

    fn parse(args: &[&str]) -> Result<Command, clap::Error> {
        Cli::try_parse_from(std::iter::once("snapfeed").chain(args.iter().copied()))
            .map(Cli::into_command)
    }

    #[test]
    fn defaults_to_feed() {
        assert_eq!(parse(&[]).unwrap(), Command::Feed);
        assert_eq!(parse(&["feed"]).unwrap(), Command::Feed);
        assert_eq!(parse(&["clear"]).unwrap(), Command::Clear);
    }

    #[test]
    fn post_takes_caption_words() {
        let command = parse(&["post", "a.mp4", "hello", "there"]).unwrap();
        assert_eq!(
            command,
            Command::Post {
                file: PathBuf::from("a.mp4"),
                caption: vec!["hello".to_owned(), "there".to_owned()],
            }
        );

        let bare = parse(&["post", "a.jpg"]).unwrap();
        assert_eq!(
            bare,
            Command::Post {
                file: PathBuf::from("a.jpg"),
                caption: Vec::new(),
            }
        );
    }

    #[test]
    fn bad_arguments_are_rejected() {
        assert_eq!(
            parse(&["post"]).unwrap_err().kind(),
            ErrorKind::MissingRequiredArgument
        );
        assert!(parse(&["nope"]).is_err());
        assert!(parse(&["clear", "now"]).is_err());
    }

    #[test]
    fn mime_from_extension() {
        assert_eq!(mime_for(Path::new("clip.MOV")).as_deref(), Some("video/quicktime"));
        assert_eq!(mime_for(Path::new("doc.pdf")).as_deref(), Some("application/pdf"));
        assert_eq!(mime_for(Path::new("noext")), None);
    }
}
