use crate::error::{Error, MissingTargetSnafu, UnknownUserSnafu};
use crate::matcher::{Limits, Target, MAX_CMDLINE_LEN, MAX_PATH_LEN};
use clap::{Parser, ValueEnum};
use clap_complete::Shell;
use snafu::OptionExt;
use std::ffi::OsString;
use std::path::PathBuf;
use users::uid_t;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Normal,
    Verbose,
    Quiet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

#[derive(Parser, Debug)]
#[command(name = "fpid", version)]
/// Find the PIDs of running processes by program name or executable path.
///
/// A target containing a "/" is compared against the resolved executable path of every process.
/// Any other target is compared against the basename of the first command-line argument. Exits
/// with a success status code if at least one process matched.
pub struct CliOptions {
    /// Quiet mode: don't print matching PIDs. The exit status tells if anything was found.
    #[arg(short = 'q', long = "quiet", overrides_with = "verbose")]
    quiet: bool,

    /// Describe every match and summarize the scan on STDERR.
    #[arg(short = 'v', long = "verbose", overrides_with = "quiet")]
    verbose: bool,

    /// Single shot: exit after the first match.
    #[arg(short = 's', long = "single-shot")]
    single_shot: bool,

    /// Only find processes owned by the user with the given name.
    #[arg(short = 'u', long = "user", value_name = "USER")]
    user: Option<String>,

    /// Only find processes owned by you. Has no effect if --user is specified.
    #[arg(short = 'm', long = "mine")]
    mine: bool,

    /// Show color in diagnostics. "auto" will enable color if STDERR is a TTY.
    #[arg(long = "color", value_name = "WHEN", value_enum, default_value = "auto")]
    color_mode: ColorMode,

    /// Skip processes whose executable path is longer than this many bytes.
    #[arg(long = "max-path-len", value_name = "BYTES", default_value_t = MAX_PATH_LEN)]
    max_path_len: usize,

    /// Skip processes whose first command-line argument is longer than this many bytes.
    #[arg(long = "max-cmdline-len", value_name = "BYTES", default_value_t = MAX_CMDLINE_LEN)]
    max_cmdline_len: usize,

    #[arg(long = "proc-root", value_name = "DIR", default_value = "/proc", hide = true)]
    proc_root: PathBuf,

    /// Generate completion script for a given shell and output on STDOUT.
    #[arg(long = "generate-completions", value_name = "SHELL", value_enum)]
    pub generate_completions: Option<Shell>,

    /// Program name, or path of the executable.
    #[arg(value_name = "PROGRAM", required_unless_present = "generate_completions")]
    target: Option<OsString>,
}

#[derive(Debug)]
pub struct Options {
    pub target: Target,
    pub single_shot: bool,
    pub output_mode: OutputMode,
    pub colors: Colors,
    pub owner: Option<uid_t>,
    pub limits: Limits,
    pub proc_root: PathBuf,
}

#[derive(Debug, Clone, Copy)]
pub struct Colors {
    enabled: bool,
}

impl CliOptions {
    pub fn output_mode(&self) -> OutputMode {
        match (self.verbose, self.quiet) {
            (false, false) => OutputMode::Normal,
            (true, false) => OutputMode::Verbose,
            (false, true) => OutputMode::Quiet,

            // Should never happen!
            (true, true) => unreachable!("Should not happen due to overrides_with option"),
        }
    }

    pub fn colors(&self) -> Colors {
        let enabled = match self.color_mode {
            ColorMode::Never => false,
            ColorMode::Always => true,
            ColorMode::Auto => termion::is_tty(&::std::io::stderr()),
        };

        Colors { enabled }
    }
}

impl TryFrom<CliOptions> for Options {
    type Error = Error;

    fn try_from(cli_options: CliOptions) -> Result<Options, Error> {
        let output_mode = cli_options.output_mode();
        let colors = cli_options.colors();

        let owner = match cli_options.user {
            Some(ref name) => Some(uid_of_user(name)?),
            None if cli_options.mine => Some(users::get_current_uid()),
            None => None,
        };

        let target = cli_options.target.context(MissingTargetSnafu)?;

        Ok(Options {
            target: Target::new(target),
            single_shot: cli_options.single_shot,
            output_mode,
            colors,
            owner,
            limits: Limits {
                max_path_len: cli_options.max_path_len,
                max_cmdline_len: cli_options.max_cmdline_len,
            },
            proc_root: cli_options.proc_root,
        })
    }
}

impl OutputMode {
    pub fn show_normal(&self) -> bool {
        match self {
            OutputMode::Verbose | OutputMode::Normal => true,
            OutputMode::Quiet => false,
        }
    }

    pub fn show_verbose(&self) -> bool {
        match self {
            OutputMode::Verbose => true,
            OutputMode::Normal | OutputMode::Quiet => false,
        }
    }
}

impl Colors {
    pub fn reset(&self) -> String {
        if self.enabled {
            format!(
                "{}{}",
                termion::color::Fg(termion::color::Reset),
                termion::style::Reset,
            )
        } else {
            String::new()
        }
    }

    pub fn red(&self) -> String {
        if self.enabled {
            termion::color::Fg(termion::color::Red).to_string()
        } else {
            String::new()
        }
    }

    pub fn faded(&self) -> String {
        if self.enabled {
            termion::style::Faint.to_string()
        } else {
            String::new()
        }
    }
}

fn uid_of_user(name: &str) -> Result<uid_t, Error> {
    users::get_user_by_name(name)
        .map(|user| user.uid())
        .context(UnknownUserSnafu { name })
}
