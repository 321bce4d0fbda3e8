//! Colored terminal output macros for the CLI (`main.rs`).
//!
//! `warning!`/`detail!`/`output!` wrap `ansi_term`-based prefix tags, each
//! with a greppable/accessible-aware three-argument form that suppresses
//! decoration for machine consumption or screen readers.
//!
//! All three write to stderr, never stdout: stdout is reserved for the
//! newline-delimited JSON result stream (§6), and a decorated status line
//! sharing that stream would corrupt it for a line-oriented JSON consumer.

/// Prints a warning line with a bold red `[!]` prefix.
///
/// The two-argument form always prints; the three-argument form
/// (`$name, $greppable, $accessible`) suppresses output entirely when
/// greppable, and drops the color when accessible mode is requested.
#[macro_export]
macro_rules! warning {
    ($name:expr) => {
        eprintln!("{} {}", ansi_term::Colour::Red.bold().paint("[!]"), $name);
    };
    ($name:expr, $greppable:expr, $accessible:expr) => {
        if !$greppable {
            if $accessible {
                eprintln!("{}", $name);
            } else {
                eprintln!("{} {}", ansi_term::Colour::Red.bold().paint("[!]"), $name);
            }
        }
    };
}

/// Prints an informational line with a bold blue `[~]` prefix.
#[macro_export]
macro_rules! detail {
    ($name:expr) => {
        eprintln!("{} {}", ansi_term::Colour::Blue.bold().paint("[~]"), $name);
    };
    ($name:expr, $greppable:expr, $accessible:expr) => {
        if !$greppable {
            if $accessible {
                eprintln!("{}", $name);
            } else {
                eprintln!("{} {}", ansi_term::Colour::Blue.bold().paint("[~]"), $name);
            }
        }
    };
}

/// Prints a scan result line with a bold bright-green `[>]` prefix.
#[macro_export]
macro_rules! output {
    ($name:expr) => {
        eprintln!("{} {}", ansi_term::Colour::RGB(0, 255, 9).bold().paint("[>]"), $name);
    };
    ($name:expr, $greppable:expr, $accessible:expr) => {
        if !$greppable {
            if $accessible {
                eprintln!("{}", $name);
            } else {
                eprintln!("{} {}", ansi_term::Colour::RGB(0, 255, 9).bold().paint("[>]"), $name);
            }
        }
    };
}

#[cfg(test)]
mod tests {
    #[test]
    fn macros_expand_and_run_without_panicking() {
        warning!("warning line");
        warning!("suppressed", true, false);
        detail!("detail line");
        output!("result line");
        output!("suppressed", true, false);
    }
}
