use snafu::Snafu;
use std::io;
use std::path::PathBuf;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Failed to open process registry {}: {source}", path.display()))]
    OpenRegistry { path: PathBuf, source: io::Error },

    #[snafu(display("Could not find user {name}"))]
    UnknownUser { name: String },

    #[snafu(display("Missing program name or path"))]
    MissingTarget,
}
