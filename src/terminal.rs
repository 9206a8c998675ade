use crossterm::{
    cursor::Show,
    event::{
        DisableBracketedPaste, DisableMouseCapture, EnableBracketedPaste, EnableMouseCapture,
    },
    execute,
    terminal::{
        disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen, SetTitle,
    },
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io::{self, Stdout};
use std::sync::Once;

pub type TerminalType = Terminal<CrosstermBackend<Stdout>>;

pub const WINDOW_TITLE: &str = "Tappi";

static PANIC_HOOK_INSTALLED: Once = Once::new();

/// Restores the terminal before the default hook prints, so a panic message
/// is not swallowed by the alternate screen.
pub fn install_panic_hook_once() {
    PANIC_HOOK_INSTALLED.call_once(|| {
        let original_hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |panic_info| {
            let _ = restore();
            original_hook(panic_info);
        }));
    });
}

/// Raw mode, alternate screen, bracketed paste and mouse wheel reporting.
/// Anything already switched on is rolled back if a later step fails.
pub fn setup() -> anyhow::Result<TerminalType> {
    install_panic_hook_once();

    enable_raw_mode()?;
    let entered = execute!(
        io::stdout(),
        EnterAlternateScreen,
        EnableBracketedPaste,
        EnableMouseCapture,
        SetTitle(WINDOW_TITLE)
    )
    .map_err(anyhow::Error::from)
    .and_then(|()| {
        let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;
        terminal.clear()?;
        Ok(terminal)
    });

    if entered.is_err() {
        let _ = restore();
    }
    entered
}

pub fn restore() -> anyhow::Result<()> {
    let _ = disable_raw_mode();
    execute!(
        io::stdout(),
        DisableMouseCapture,
        DisableBracketedPaste,
        LeaveAlternateScreen,
        Show
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_hook_installs_once() {
        install_panic_hook_once();
        install_panic_hook_once();
        assert!(PANIC_HOOK_INSTALLED.is_completed());
    }
}
