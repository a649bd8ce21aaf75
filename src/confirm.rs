//! Operator confirmation before any mutation.
//!
//! The sync engine calls [`ConfirmationPort::confirm`] synchronously with the
//! plan summary. The CLI answers through [`TerminalPrompt`]; `--yes` and tests
//! use [`FixedAnswer`].

use std::io::{self, BufRead, Write};

use crate::plan::PlanSummary;

#[cfg_attr(test, mockall::automock)]
pub trait ConfirmationPort {
    /// Return `true` to proceed with the planned actions
    fn confirm(&self, summary: &PlanSummary) -> bool;
}

/// Always answers the same way
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub bool);

impl ConfirmationPort for FixedAnswer {
    fn confirm(&self, _summary: &PlanSummary) -> bool {
        self.0
    }
}

/// Interactive y/n prompt on stdin/stdout
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompt;

impl ConfirmationPort for TerminalPrompt {
    fn confirm(&self, summary: &PlanSummary) -> bool {
        let stdin = io::stdin();
        let mut stdout = io::stdout();
        prompt(&mut stdin.lock(), &mut stdout, summary).unwrap_or(false)
    }
}

/// Human readable plan, one line per fact
pub fn render_summary(summary: &PlanSummary) -> String {
    let mut lines = vec!["🔄 Planned actions:".to_string()];

    if summary.follow_enabled {
        lines.push(format!(
            "   👥 Users to follow: {} (this run: {})",
            summary.to_follow, summary.follow_batch
        ));
    }
    if summary.unfollow_enabled {
        lines.push(format!(
            "   👥 Users to unfollow: {} (this run: {})",
            summary.to_unfollow, summary.unfollow_batch
        ));
    }
    lines.push(format!(
        "   🔄 API requests left: {} | Max allowed actions: {}",
        summary.remaining, summary.max_actions
    ));

    lines.join("\n")
}

/// Ask until the answer is `y` or `n`. End of input declines.
pub fn prompt<R: BufRead, W: Write>(
    reader: &mut R,
    writer: &mut W,
    summary: &PlanSummary,
) -> io::Result<bool> {
    writeln!(writer, "{}", render_summary(summary))?;

    loop {
        write!(writer, "\n⚡ Do you want to continue? (y/n) ")?;
        writer.flush()?;

        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            writeln!(writer)?;
            return Ok(false);
        }

        match line.trim().to_lowercase().as_str() {
            "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            _ => writeln!(writer, "⚠️  Invalid input. Type 'y' to continue or 'n' to cancel.")?,
        }
    }
}
