mod error;
mod matcher;
mod options;
mod processes;
#[cfg(test)]
mod test_utils;

use clap::{CommandFactory, Parser};
use clap_complete::Shell;
use error::Error;
use matcher::{Match, Matcher};
use options::{CliOptions, Colors, Options};
use processes::{ProcFs, Registry};
use std::ffi::OsString;
use std::fmt;
use std::io::{self, Write};
use std::path::Path;

fn generate_completions(shell: Shell, out: &mut dyn Write) {
    let mut command = CliOptions::command();
    let name = command.get_name().to_string();

    clap_complete::generate(shell, &mut command, name, out);
}

fn main() {
    use std::process::exit;

    let stdout = io::stdout();
    let stderr = io::stderr();
    let code = invoke(
        std::env::args_os(),
        |root: &Path| ProcFs::new(root),
        &mut stdout.lock(),
        &mut stderr.lock(),
    );

    exit(code);
}

/// Runs the whole program against the registry found at the configured root, returning the exit
/// status. Nothing touches the registry until the arguments have been fully validated.
fn invoke<I, T, F, R>(args: I, registry_at: F, out: &mut dyn Write, err: &mut dyn Write) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
    F: FnOnce(&Path) -> R,
    R: Registry,
{
    let cli_options = match CliOptions::try_parse_from(args) {
        Ok(cli_options) => cli_options,
        Err(parse_error) => {
            if parse_error.use_stderr() {
                let _ = write!(err, "{}", parse_error.render());
                return 1;
            }

            // Help and version count as success.
            let _ = write!(out, "{}", parse_error.render());
            return 0;
        }
    };

    if let Some(shell) = cli_options.generate_completions {
        generate_completions(shell, out);
        return 0;
    }

    let colors = cli_options.colors();
    let options = match Options::try_from(cli_options) {
        Ok(options) => options,
        Err(error) => {
            report_error(colors, &error, err);
            return 1;
        }
    };

    let registry = registry_at(&options.proc_root);
    match run(&options, &registry, out, err) {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(error) => {
            report_error(colors, &error, err);
            1
        }
    }
}

fn run<R: Registry>(
    options: &Options,
    registry: &R,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> Result<bool, Error> {
    let matcher = Matcher::new(options.target.clone(), options.limits).owned_by(options.owner);
    let mut matches = matcher.scan(registry)?;

    let limit = if options.single_shot { 1 } else { usize::MAX };
    let mut found = 0;

    // PIDs are written as soon as they are found, before the scan continues.
    for process in matches.by_ref().take(limit) {
        found += 1;

        if options.output_mode.show_normal() && print_pid(out, &process).is_err() {
            // Nobody reads the PIDs any more. What was found still decides the exit status.
            break;
        }

        if options.output_mode.show_verbose() {
            diagnostic(
                err,
                format_args!(
                    "Matched {process}",
                    process = human_process_description(options, &process),
                ),
            );
        }
    }

    if options.output_mode.show_verbose() {
        diagnostic(
            err,
            format_args!(
                "Scanned {scanned} processes, {found} matched",
                scanned = matches.scanned(),
            ),
        );
    }

    Ok(found > 0)
}

fn print_pid(out: &mut dyn Write, process: &Match) -> io::Result<()> {
    writeln!(out, "{}", process.pid)?;
    out.flush()
}

/// Writes a line to STDERR. A failure there has nowhere left to be reported, so it is dropped.
fn diagnostic(err: &mut dyn Write, message: fmt::Arguments) {
    let _ = writeln!(err, "{message}");
}

fn report_error(colors: Colors, error: &Error, err: &mut dyn Write) {
    diagnostic(
        err,
        format_args!(
            "{red}ERROR:{reset} {error}",
            red = colors.red(),
            reset = colors.reset(),
        ),
    );
}

fn human_process_description(options: &Options, process: &Match) -> String {
    use matcher::MatchMode;

    let kind = match options.target.mode() {
        MatchMode::Path => "executable",
        MatchMode::Name => "name",
    };

    format!(
        "{pid} {faded}({kind} {identity}){reset}",
        pid = process.pid,
        faded = options.colors.faded(),
        identity = process.identity_lossy(),
        reset = options.colors.reset(),
    )
}
