use colored::*;
use terminal_size::{Width, Height, terminal_size};

const TASK_PREVIEW_CHARS: usize = 100;
const INPUT_PREVIEW_CHARS: usize = 100;
const RESULT_PREVIEW_CHARS: usize = 150;

fn rule() -> String {
    let (width, _) = terminal_size().unwrap_or((Width(80), Height(24)));
    "─".repeat(width.0 as usize)
}

/// Cut to `max` characters, marking the cut with `...`
pub fn preview(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

pub fn print_header(model: &str, task: &str, project: &str) {
    let line = rule();
    println!("{}", line.black().bold());

    let name = "UI/UX Research Agent".yellow().bold();
    let version = format!("v{}", env!("CARGO_PKG_VERSION")).black().bold();
    println!("  {} {}", name, version);

    println!("  {}", format!("Provider: {}", model).cyan());
    println!("  Task: {}", preview(task.trim(), TASK_PREVIEW_CHARS));
    println!("  Project: {}", project.black().bold());

    println!("{}", line.black().bold());
}

pub fn print_iteration(iteration: usize) {
    println!("  {} [Iteration {}] Thinking...", "∴".magenta(), iteration);
}

pub fn print_tool_call(name: &str, input: &str) {
    println!("  {} Tool: {}", ">".green(), name.bold());
    println!("    Input: {}", preview(input, INPUT_PREVIEW_CHARS).black().bold());
}

pub fn print_tool_result(result: &str) {
    println!("    Result: {}\n", preview(result, RESULT_PREVIEW_CHARS));
}

pub fn print_complete() {
    let line = rule();
    println!("{}", line.black().bold());
    println!("  {} {}", "✓".green().bold(), "Agent complete".green());
    println!("{}", line.black().bold());
}

pub fn print_warning(msg: &str) {
    println!("  {} {}", "⚠️ ".yellow().bold(), msg.yellow());
}

pub fn print_error(msg: &str) {
    println!("  {} {}", "❌".red().bold(), msg.red());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview() {
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("abcdef", 3), "abc...");
        assert_eq!(preview("ééé", 2), "éé...");
    }
}
