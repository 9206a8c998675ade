use crate::settings::ModelChoice;

pub const HELP_TEXT: &str = "/regen  /clear  /save N  /unsave N  /saved  /search TERM  /export  \
/model flash|pro  /web [on|off]  /maps [on|off]  /theme  /speak [N]  /quit   F2 dictate  PgUp/PgDn scroll";

/// Slash commands typed into the composer.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Regenerate,
    Clear,
    Save(usize),
    Unsave(usize),
    ShowSaved,
    Search(String),
    Export,
    Model(ModelChoice),
    Web(Option<bool>),
    Maps(Option<bool>),
    Theme,
    Speak(Option<usize>),
    Help,
    Quit,
}

impl Command {
    /// Parses `input` if it is a slash command. `None` means plain chat text;
    /// `Some(Err(_))` is a command that could not be understood.
    pub fn parse(input: &str) -> Option<Result<Command, String>> {
        let input = input.trim();
        let rest = input.strip_prefix('/')?;
        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };

        let command = match name.to_ascii_lowercase().as_str() {
            "regen" | "regenerate" | "r" => Ok(Command::Regenerate),
            "clear" => Ok(Command::Clear),
            "save" => position(arg).map(Command::Save),
            "unsave" => position(arg).map(Command::Unsave),
            "saved" | "wisdom" => Ok(Command::ShowSaved),
            "search" | "find" => Ok(Command::Search(arg.to_string())),
            "export" | "copy" => Ok(Command::Export),
            "model" => ModelChoice::parse(arg)
                .map(Command::Model)
                .ok_or_else(|| format!("unknown model '{arg}' (flash or pro)")),
            "web" | "search-tool" => toggle(arg).map(Command::Web),
            "maps" => toggle(arg).map(Command::Maps),
            "theme" | "dark" => Ok(Command::Theme),
            "speak" | "say" => {
                if arg.is_empty() {
                    Ok(Command::Speak(None))
                } else {
                    position(arg).map(|n| Command::Speak(Some(n)))
                }
            }
            "help" | "commands" | "?" => Ok(Command::Help),
            "quit" | "exit" | "q" => Ok(Command::Quit),
            other => Err(format!("unknown command /{other}; try /help")),
        };
        Some(command)
    }
}

/// One-based message or excerpt number.
fn position(arg: &str) -> Result<usize, String> {
    match arg.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(format!("expected a number from the list, got '{arg}'")),
    }
}

fn toggle(arg: &str) -> Result<Option<bool>, String> {
    if arg.is_empty() {
        return Ok(None);
    }
    crate::util::parse_bool_str(arg)
        .map(Some)
        .ok_or_else(|| format!("expected on or off, got '{arg}'"))
}
