use cryptodash_core::domain::symbols::normalize_symbol;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Analyze(String),
    Refresh,
    Quit,
    Empty,
    Unknown(String),
}

pub fn parse_command(line: &str) -> Command {
    let mut parts = line.split_whitespace();
    let Some(verb) = parts.next() else {
        return Command::Empty;
    };

    match verb.to_ascii_lowercase().as_str() {
        "analyze" | "a" => match parts.next() {
            Some(sym) => Command::Analyze(normalize_symbol(sym)),
            None => Command::Unknown(line.trim().to_string()),
        },
        "refresh" | "r" => Command::Refresh,
        "quit" | "q" | "exit" => Command::Quit,
        _ => Command::Unknown(line.trim().to_string()),
    }
}
