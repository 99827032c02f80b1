// Terminal interaction: hidden password prompts via `dialoguer` and an
// `indicatif` spinner for long listings. Prompting sits behind the
// `Prompter` trait so credential resolution can be driven from tests.

use std::time::Duration;

use dialoguer::Password;
use indicatif::{ProgressBar, ProgressStyle};

/// Source of interactively entered secrets. Every call blocks until the
/// operator answers; `None` means no answer could be read.
pub trait Prompter {
    fn password(&self, prompt: &str) -> Option<String>;
}

impl<P: Prompter + ?Sized> Prompter for &P {
    fn password(&self, prompt: &str) -> Option<String> {
        (**self).password(prompt)
    }
}

/// Reads secrets from the controlling terminal without echoing them.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn password(&self, prompt: &str) -> Option<String> {
        match Password::new()
            .with_prompt(prompt)
            .allow_empty_password(true)
            .interact()
        {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(error = %err, "could not read from terminal");
                None
            }
        }
    }
}

/// Spinner on stderr while a listing is fetched. Call `finish_and_clear`
/// before printing results.
pub fn spinner(message: impl Into<String>) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    spinner.set_style(style);
    spinner.set_message(message.into());
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}
