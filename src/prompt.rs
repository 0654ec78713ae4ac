//! Interactive input used by the flow and the CLI.

use std::io;

use secrecy::SecretString;

/// Source of interactive answers.
///
/// The authentication flow only calls [`Prompter::input`] (one-time codes
/// when none was supplied up front) and [`Prompter::notify`] (push approval
/// hints). The CLI also uses it for passwords and role selection.
pub trait Prompter: Send + Sync {
    fn input(&self, prompt: &str) -> io::Result<String>;

    fn password(&self, prompt: &str) -> io::Result<SecretString>;

    /// Returns the index of the chosen option.
    fn select(&self, prompt: &str, options: &[String]) -> io::Result<usize>;

    /// Show a message that needs no answer.
    fn notify(&self, message: &str) {
        eprintln!("{message}");
    }
}

/// Prompter on the controlling terminal, writing to stderr so stdout stays
/// clean for command output.
#[cfg(feature = "cli")]
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompter;

#[cfg(feature = "cli")]
impl Prompter for TerminalPrompter {
    fn input(&self, prompt: &str) -> io::Result<String> {
        use dialoguer::{theme::ColorfulTheme, Input};

        Input::<String>::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .interact_text_on(&dialoguer::console::Term::stderr())
            .map(|s| s.trim().to_string())
            .map_err(dialoguer_to_io)
    }

    fn password(&self, prompt: &str) -> io::Result<SecretString> {
        use dialoguer::{theme::ColorfulTheme, Password};

        Password::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .interact_on(&dialoguer::console::Term::stderr())
            .map(SecretString::from)
            .map_err(dialoguer_to_io)
    }

    fn select(&self, prompt: &str, options: &[String]) -> io::Result<usize> {
        use dialoguer::{theme::ColorfulTheme, Select};

        if options.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "nothing to select from",
            ));
        }

        Select::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .items(options)
            .default(0)
            .interact_on(&dialoguer::console::Term::stderr())
            .map_err(dialoguer_to_io)
    }
}

#[cfg(feature = "cli")]
fn dialoguer_to_io(err: dialoguer::Error) -> io::Error {
    io::Error::other(err)
}
