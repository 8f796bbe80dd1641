//! Interactive export picker.

use anyhow::Result;
use dialoguer::{Select, theme::ColorfulTheme};

use chatexport::{ExportAction, OperationState, Outcome};

use crate::Session;

pub fn run(session: &mut Session) -> Result<()> {
    let theme = ColorfulTheme::default();

    loop {
        // Let finished actions fall back to idle before redrawing
        session.tick();

        let mut items: Vec<String> = ExportAction::ALL
            .iter()
            .map(|action| menu_item(*action, &session.state(*action)))
            .collect();
        items.push("Exit".to_string());

        let selection = Select::with_theme(&theme)
            .with_prompt("Export transcript")
            .items(&items)
            .default(0)
            .interact()?;

        if selection == ExportAction::ALL.len() {
            break;
        }

        let action = ExportAction::ALL[selection];
        let (state, outcome) = session.run(action);
        match (&state, outcome) {
            (OperationState::Success, Some(Outcome::Saved { filename })) => {
                let shown = session
                    .last_saved()
                    .map(|path| path.display().to_string())
                    .unwrap_or(filename);
                println!("\nSaved {shown}\n");
            }
            (OperationState::Success, Some(Outcome::Copied { bytes })) => {
                println!("\nCopied {bytes} bytes to clipboard\n");
            }
            (OperationState::Error(message), _) => println!("\nFailed: {message}\n"),
            _ => {}
        }
    }

    Ok(())
}

fn menu_item(action: ExportAction, state: &OperationState) -> String {
    match state {
        OperationState::Idle => action.label().to_string(),
        OperationState::Loading => format!("{} (working...)", action.label()),
        OperationState::Success => format!("{} ✓", action.label()),
        OperationState::Error(message) => format!("{} ✗ {message}", action.label()),
    }
}
