//! Terminal output: ANSI styling, notes, tables and the step display.

use ponder_config::ProviderMetadata;
use ponder_core::{Command, CostBreakdown, SessionOptions, SolutionType, Step, UsageRecord};

// ---------------------------------------------------------------------------
// ANSI Color/Style helpers
// ---------------------------------------------------------------------------

pub const RESET: &str = "\x1b[0m";
pub const BOLD: &str = "\x1b[1m";
pub const DIM: &str = "\x1b[2m";
pub const UNDERLINE: &str = "\x1b[4m";

pub const RED: &str = "\x1b[31m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";
pub const BLUE: &str = "\x1b[34m";
pub const MAGENTA: &str = "\x1b[35m";
pub const CYAN: &str = "\x1b[36m";

const BAR_WIDTH: usize = 20;

/// Check if the terminal supports color output.
pub fn supports_color() -> bool {
    std::env::var("NO_COLOR").is_err()
        && (std::env::var("COLORTERM").is_ok()
            || std::env::var("TERM")
                .map(|t| t != "dumb")
                .unwrap_or(false))
}

/// Wrap `text` in the given styles when color is supported.
pub fn paint(style: &str, text: &str) -> String {
    if supports_color() {
        format!("{style}{text}{RESET}")
    } else {
        text.to_string()
    }
}

/// Strip ANSI escape codes from a string.
pub fn strip_ansi(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\x1b' {
            // Skip until 'm'
            for next in chars.by_ref() {
                if next == 'm' {
                    break;
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}

fn visible_width(s: &str) -> usize {
    strip_ansi(s).chars().count()
}

// ---------------------------------------------------------------------------
// Formatted notes
// ---------------------------------------------------------------------------

pub fn note_info(msg: &str) {
    if supports_color() {
        println!("{CYAN}{BOLD}ℹ{RESET} {msg}");
    } else {
        println!("INFO: {msg}");
    }
}

pub fn note_warn(msg: &str) {
    if supports_color() {
        println!("{YELLOW}{BOLD}⚠{RESET} {msg}");
    } else {
        println!("WARN: {msg}");
    }
}

pub fn note_error(msg: &str) {
    if supports_color() {
        eprintln!("{RED}{BOLD}✗{RESET} {msg}");
    } else {
        eprintln!("ERROR: {msg}");
    }
}

pub fn note_success(msg: &str) {
    if supports_color() {
        println!("{GREEN}{BOLD}✓{RESET} {msg}");
    } else {
        println!("OK: {msg}");
    }
}

// ---------------------------------------------------------------------------
// Table rendering
// ---------------------------------------------------------------------------

/// Column alignment.
pub enum Align {
    Left,
    Right,
}

/// A table column definition.
pub struct Column {
    pub header: String,
    pub align: Align,
    pub max_width: Option<usize>,
}

impl Column {
    pub fn left(header: impl Into<String>) -> Self {
        Self { header: header.into(), align: Align::Left, max_width: None }
    }

    pub fn right(header: impl Into<String>) -> Self {
        Self { header: header.into(), align: Align::Right, max_width: None }
    }

    pub fn max_width(mut self, width: usize) -> Self {
        self.max_width = Some(width);
        self
    }
}

/// Render a table with given columns and rows.
pub fn render_table(columns: &[Column], rows: &[Vec<String>]) -> String {
    let num_cols = columns.len();
    let mut widths: Vec<usize> = columns.iter().map(|c| visible_width(&c.header)).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(num_cols) {
            let w = visible_width(cell);
            let w = columns[i].max_width.map_or(w, |max| w.min(max));
            widths[i] = widths[i].max(w);
        }
    }

    let mut out = String::new();

    let header_cells: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(i, col)| pad_cell(&col.header, widths[i], &col.align))
        .collect();
    out.push_str(&format!("  {}  \n", paint(BOLD, &header_cells.join("  "))));

    let sep: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&format!("  {}  \n", sep.join("  ")));

    for row in rows {
        let cells: Vec<String> = (0..num_cols)
            .map(|i| {
                let cell = row.get(i).map(String::as_str).unwrap_or("");
                pad_cell(cell, widths[i], &columns[i].align)
            })
            .collect();
        out.push_str(&format!("  {}  \n", cells.join("  ")));
    }

    out
}

fn pad_cell(s: &str, width: usize, align: &Align) -> String {
    let pad = width.saturating_sub(visible_width(s));
    match align {
        Align::Left => format!("{s}{}", " ".repeat(pad)),
        Align::Right => format!("{}{s}", " ".repeat(pad)),
    }
}

// ---------------------------------------------------------------------------
// Session display
// ---------------------------------------------------------------------------

/// `█████░░░░░ 3/5`. Values outside `0..=total` are clamped for the bar only.
pub fn progress_bar(value: i64, total: i64) -> String {
    let filled = if total > 0 {
        let ratio = value.clamp(0, total) as f64 / total as f64;
        (ratio * BAR_WIDTH as f64) as usize
    } else {
        0
    };
    format!(
        "{}{} {value}/{total}",
        "█".repeat(filled),
        "░".repeat(BAR_WIDTH - filled)
    )
}

/// Throughput, switching to `k tok/s` above 1000.
pub fn format_speed(tokens: u64, secs: f64) -> String {
    let speed = if secs > 0.0 { tokens as f64 / secs } else { 0.0 };
    if speed >= 1000.0 {
        format!("{:.1}k tok/s", speed / 1000.0)
    } else {
        format!("{speed:.1} tok/s")
    }
}

pub fn format_session_start(options: &SessionOptions, provider: &ProviderMetadata) -> String {
    let rule = "─".repeat(52);
    let mut out = String::new();
    out.push_str(&paint(CYAN, &format!("╭{rule}╮")));
    out.push('\n');
    out.push_str(&paint(BOLD, &format!("  {:^50}", "Reasoning Session")));
    out.push('\n');
    out.push_str(&paint(CYAN, &format!("╰{rule}╯")));
    out.push_str("\n\n");

    out.push_str(&format!("{} {}\n", paint(BLUE, "Provider:"), provider.name));
    if !provider.description.is_empty() {
        out.push_str(&format!("  {}\n", paint(DIM, &provider.description)));
    }
    out.push_str(&format!("  Model: {}\n", provider.model));
    out.push_str(&format!("  Temperature: {}\n", provider.temperature));
    out.push_str(&format!("  Max Tokens: {}\n\n", provider.max_tokens));

    out.push_str(&format!("{} {}\n", paint(GREEN, "Task:"), options.task));
    out.push_str(&format!("{} {}\n", paint(GREEN, "Mode:"), options.mode));
    out.push_str(&format!("{} {}\n", paint(GREEN, "Language:"), options.reasoning_language));
    out.push_str(&format!("{} {}\n", paint(GREEN, "Max Steps:"), options.max_steps));
    out
}

pub fn display_session_start(options: &SessionOptions, provider: &ProviderMetadata) {
    println!("\n{}", format_session_start(options, provider));
}

pub fn format_token_stats(usage: &UsageRecord, costs: &CostBreakdown) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{}  Prompt: {} ({})  Completion: {} ({})  Total: {}\n",
        paint(BOLD, "Token Usage:"),
        usage.prompt_tokens,
        format_speed(usage.prompt_tokens, usage.prompt_time),
        usage.completion_tokens,
        format_speed(usage.completion_tokens, usage.completion_time),
        usage.total_tokens,
    ));
    out.push_str(&format!(
        "{}  Cached: {} ({:.1}%)  Effective: {}\n",
        paint(BOLD, "Cache Info:"),
        usage.cached_tokens,
        usage.cache_ratio(),
        usage.effective_prompt_tokens(),
    ));
    out.push_str(&paint(
        MAGENTA,
        &format!(
            "Cost: Input ${:.4} | Cached ${:.4} | Output ${:.4} | Step ${:.4}",
            costs.input_cost, costs.cached_cost, costs.output_cost, costs.total_cost
        ),
    ));
    out.push('\n');
    out
}

pub fn format_step(
    step: &Step,
    current_step: u32,
    max_steps: u32,
    usage: &UsageRecord,
    costs: &CostBreakdown,
) -> String {
    let counter = format!("Step {current_step}/{max_steps}");
    let counter = if current_step > max_steps {
        paint(&format!("{BOLD}{RED}{UNDERLINE}"), &counter)
    } else {
        paint(CYAN, &counter)
    };

    let mut out = format!(
        "{counter}  {}  {} {}  {}\n",
        progress_bar(i64::from(current_step), i64::from(max_steps)),
        paint(YELLOW, "Confidence:"),
        progress_bar(step.confidence_level, 5),
        paint(GREEN, &format!("Language: {}", step.reasoning_language)),
    );
    out.push_str(&format_token_stats(usage, costs));

    let marker = if step.solution_type() == SolutionType::None { "…" } else { "✦" };
    out.push_str(&format!("\n{} {marker}\n\n", paint(&format!("{BOLD}{BLUE}"), &step.step_title)));
    out.push_str(&step.step_text);
    out.push('\n');

    if let Some(solution) = step.solution.as_ref().filter(|s| s.kind != SolutionType::None) {
        out.push_str(&format!(
            "\n{}\n{}\n{} {}\n",
            paint(&format!("{BOLD}{GREEN}"), &format!("Solution ({})", solution.kind.as_str())),
            solution.content,
            paint(GREEN, "Completeness:"),
            progress_bar(solution.completeness, 100),
        ));
    }
    out
}

pub fn display_step(
    step: &Step,
    current_step: u32,
    max_steps: u32,
    usage: &UsageRecord,
    costs: &CostBreakdown,
) {
    println!("{}", format_step(step, current_step, max_steps, usage, costs));
}

pub fn format_cost_summary(total: &CostBreakdown) -> String {
    paint(
        MAGENTA,
        &format!(
            "Cost Summary: Input: ${:.4} | Cached: ${:.4} | Output: ${:.4} | Total: ${:.4}",
            total.input_cost, total.cached_cost, total.output_cost, total.total_cost
        ),
    )
}

pub fn display_cost_summary(total: &CostBreakdown) {
    println!("\n{}\n", format_cost_summary(total));
}

pub fn display_auto_command(command: &Command) {
    println!("\n{} {command}", paint(CYAN, "Auto-selecting command:"));
}

/// Menu entries in display order; the number is the 1-based position.
pub const MENU: [&str; 6] = [
    "CONTINUE",
    "EXPLORE_OPTIMAL",
    "GO_SLIGHTLY_WRONG",
    "GO_VERY_WRONG",
    "REASONING_LANGUAGE",
    "EXIT",
];

pub fn format_command_menu() -> String {
    let mut out = paint(&format!("{BOLD}{YELLOW}"), "Available Commands");
    out.push('\n');
    for (i, entry) in MENU.iter().enumerate() {
        out.push_str(&format!("  {} • {entry}\n", paint(CYAN, &(i + 1).to_string())));
    }
    out
}
