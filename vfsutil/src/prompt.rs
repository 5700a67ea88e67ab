//! This module implements prompting.

use std::io::BufRead;
use std::io::IsTerminal;
use std::io::Write;
use std::io;

/// Shows a prompt and returns the next line read from stdin, or `None` on EOF.
///
/// `prompt` is the prompt's text. If `None`, no text is printed before reading. The prompt
/// text is suppressed when stdin is not a TTY, but the read always happens, so piped input
/// still drives the same y/n and size protocol non-interactively.
pub fn prompt(prompt: Option<&str>) -> Option<String> {
	let stdin = io::stdin();
	if let Some(prompt) = prompt {
		if stdin.is_terminal() {
			print!("{}", prompt);
			let _ = io::stdout().flush();
		}
	}

	stdin.lock().lines().next()?.ok()
}
