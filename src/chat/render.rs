//! Output rendering for the interactive shell.
//!
//! The shell never prints directly; everything goes through a [`Renderer`], so the same control
//! flow drives the terminal and the recording renderers used in tests.

use std::io::{self, Stdout, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

const ANSI_HEADER: &str = "\x1b[95m";
const ANSI_BLUE: &str = "\x1b[94m";
const ANSI_CYAN: &str = "\x1b[96m";
const ANSI_GREEN: &str = "\x1b[92m";
const ANSI_YELLOW: &str = "\x1b[93m";
const ANSI_RED: &str = "\x1b[91m";
const ANSI_BOLD: &str = "\x1b[1m";
const ANSI_RESET: &str = "\x1b[0m";

/// Width of the `=` rule around banners.
pub const BANNER_WIDTH: usize = 60;
/// Width of the `-` rule around short lists.
pub const RULE_WIDTH: usize = 40;

/// The visual role of a line of output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Style {
    Plain,
    /// Bold, used for menu numbers and prompts.
    Bold,
    /// Screen titles and banners.
    Header,
    /// Conversation titles.
    Title,
    /// Hints and notes.
    Info,
    /// Confirmations.
    Success,
    /// Warnings and failures.
    Error,
    /// Lines spoken by the user.
    User,
    /// Lines spoken by the model.
    Assistant,
    /// Highlighted values such as history titles.
    Accent,
    /// Red like `Error`, for menu entries that leave something.
    Alert,
}

impl Style {
    fn ansi(self) -> &'static [&'static str] {
        match self {
            Style::Plain => &[],
            Style::Bold => &[ANSI_BOLD],
            Style::Header => &[ANSI_BOLD, ANSI_HEADER],
            Style::Title => &[ANSI_BOLD, ANSI_BLUE],
            Style::Info => &[ANSI_YELLOW],
            Style::Success => &[ANSI_GREEN],
            Style::Error => &[ANSI_RED],
            Style::User => &[ANSI_GREEN],
            Style::Assistant => &[ANSI_CYAN],
            Style::Accent => &[ANSI_CYAN],
            Style::Alert => &[ANSI_RED],
        }
    }
}

/// Trait for rendering shell output.
pub trait Renderer: Send {
    /// Print one line of text in the given style.
    fn print_line(&mut self, style: Style, text: &str);

    /// Called when a streamed reply starts, with the speaker label.
    fn start_response(&mut self, label: &str);

    /// Print a chunk of streamed reply text.
    ///
    /// This is called incrementally as tokens arrive, so it must not buffer.
    fn print_text(&mut self, text: &str);

    /// Called when a streamed reply is complete.
    fn finish_response(&mut self);

    /// Called when a streamed reply is cut short by the user.
    fn print_interrupted(&mut self) {
        self.finish_response();
        self.print_line(Style::Info, "[interrupted]");
    }

    /// Print an error message.
    fn print_error(&mut self, error: &str) {
        self.print_line(Style::Error, error);
    }

    /// Print an informational message.
    fn print_info(&mut self, info: &str) {
        self.print_line(Style::Info, info);
    }

    /// Print a confirmation.
    fn print_success(&mut self, text: &str) {
        self.print_line(Style::Success, text);
    }

    fn print_blank(&mut self) {
        self.print_line(Style::Plain, "");
    }

    /// Print a title framed by `=` rules.
    fn print_banner(&mut self, title: &str) {
        let rule = "=".repeat(BANNER_WIDTH);
        self.print_blank();
        self.print_line(Style::Header, &rule);
        self.print_line(Style::Header, &format!("{:^width$}", title, width = BANNER_WIDTH));
        self.print_line(Style::Header, &rule);
        self.print_blank();
    }

    /// Print a `-` rule.
    fn print_rule(&mut self) {
        self.print_line(Style::Plain, &"-".repeat(RULE_WIDTH));
    }

    /// Print a numbered menu entry.
    fn print_menu_item(&mut self, index: usize, style: Style, label: &str) {
        self.print_line(style, &format!("{index}. {label}"));
    }

    /// Returns true if streaming should be interrupted.
    fn should_interrupt(&self) -> bool {
        false
    }

    /// Forget an interrupt request left over from an earlier reply.
    fn clear_interrupt(&mut self) {}
}

/// Plain text renderer with optional ANSI styling.
pub struct PlainTextRenderer {
    stdout: Stdout,
    use_color: bool,
    in_response: bool,
    interrupted: Option<Arc<AtomicBool>>,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self {
            stdout: io::stdout(),
            use_color,
            in_response: false,
            interrupted: None,
        }
    }

    /// Attaches an interrupt flag to the renderer.
    pub fn with_interrupt(mut self, interrupted: Arc<AtomicBool>) -> Self {
        self.interrupted = Some(interrupted);
        self
    }

    /// Flushes stdout to ensure immediate display of streamed content.
    fn flush(&mut self) {
        let _ = self.stdout.flush();
    }

    fn styled(&self, style: Style, text: &str) -> String {
        let ansi = style.ansi();
        if self.use_color && !ansi.is_empty() && !text.is_empty() {
            format!("{}{text}{ANSI_RESET}", ansi.concat())
        } else {
            text.to_string()
        }
    }

    fn reset_response(&mut self) {
        if self.in_response {
            if self.use_color {
                print!("{ANSI_RESET}");
            }
            self.in_response = false;
        }
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for PlainTextRenderer {
    fn print_line(&mut self, style: Style, text: &str) {
        self.reset_response();
        println!("{}", self.styled(style, text));
        self.flush();
    }

    fn start_response(&mut self, label: &str) {
        self.reset_response();
        if self.use_color {
            print!("\n{ANSI_BOLD}{ANSI_CYAN}{label}:{ANSI_RESET} {ANSI_CYAN}");
        } else {
            print!("\n{label}: ");
        }
        self.in_response = true;
        self.flush();
    }

    fn print_text(&mut self, text: &str) {
        print!("{text}");
        self.flush();
    }

    fn finish_response(&mut self) {
        self.reset_response();
        println!("\n");
        self.flush();
    }

    fn print_error(&mut self, error: &str) {
        self.reset_response();
        self.flush();
        eprintln!("{}", self.styled(Style::Error, error));
    }

    fn should_interrupt(&self) -> bool {
        self.interrupted
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    fn clear_interrupt(&mut self) {
        if let Some(flag) = &self.interrupted {
            flag.store(false, Ordering::Relaxed);
        }
    }
}
