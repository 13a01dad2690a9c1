//! Colored status words for CLI output. Text stays plain when the stream it
//! is printed to is not a terminal.

use std::io::IsTerminal;

use owo_colors::OwoColorize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tone {
    Success,
    Warning,
    Error,
    Note,
}

fn paint(text: &str, tone: Tone, color: bool) -> String {
    if !color {
        return text.to_string();
    }
    match tone {
        Tone::Success => text.green().to_string(),
        Tone::Warning => text.yellow().to_string(),
        Tone::Error => text.red().bold().to_string(),
        Tone::Note => text.cyan().to_string(),
    }
}

/// For stdout.
pub fn success(text: impl AsRef<str>) -> String {
    let color = std::io::stdout().is_terminal();
    paint(text.as_ref(), Tone::Success, color)
}

/// For stderr.
pub fn warning(text: impl AsRef<str>) -> String {
    let color = std::io::stderr().is_terminal();
    paint(text.as_ref(), Tone::Warning, color)
}

/// For stderr.
pub fn error(text: impl AsRef<str>) -> String {
    let color = std::io::stderr().is_terminal();
    paint(text.as_ref(), Tone::Error, color)
}

/// For stderr.
pub fn note(text: impl AsRef<str>) -> String {
    let color = std::io::stderr().is_terminal();
    paint(text.as_ref(), Tone::Note, color)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_when_not_a_terminal() {
        assert_eq!(paint("sent", Tone::Success, false), "sent");
        let colored = paint("sent", Tone::Success, true);
        assert!(
            colored.contains("sent") && colored.starts_with('\u{1b}'),
            "{colored:?}"
        );
    }
}
