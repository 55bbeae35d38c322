//! Inbound message parsing.

/// What an inbound chat message asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/start`, `/help`, or an unknown slash command.
    Help,
    /// `next` / `more`, with or without a slash.
    Next,
    /// `/refresh <title>`: drop the cached result and search again.
    Refresh(String),
    /// `/search <title>` or any other text.
    Search(String),
}

/// Parse a message. Command names are case-insensitive and a trailing
/// `@botname` on the command is ignored.
pub fn parse(text: &str) -> Command {
    let text = text.trim();

    let Some(rest) = text.strip_prefix('/') else {
        return match text.to_lowercase().as_str() {
            "next" | "more" => Command::Next,
            _ => Command::Search(text.to_string()),
        };
    };

    let (head, args) = match rest.split_once(char::is_whitespace) {
        Some((head, args)) => (head, args.trim()),
        None => (rest, ""),
    };
    let name = head.split('@').next().unwrap_or_default().to_lowercase();

    match name.as_str() {
        "next" | "more" => Command::Next,
        "refresh" => Command::Refresh(args.to_string()),
        "search" => Command::Search(args.to_string()),
        _ => Command::Help,
    }
}
