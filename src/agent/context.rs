//! Prompt material for a run: the system prompt and the seed message.

use chrono::Local;

use super::message::Message;

/// Task used when the caller gives none.
pub const DEFAULT_TASK: &str = "Look at the current project and suggest improvements.\n\
Focus on making the UI more modern and engaging.";

const IDENTITY: &str = r#"You are a UI/UX Research Agent specialized in web development.

Your job is to help developers:
1. Find FRESH, unconventional design approaches (not the same old shadcn/Tailwind templates everyone uses)
2. Debug UI issues by researching actual solutions
3. Modernize and improve existing components
4. Provide SPECIFIC, actionable suggestions with working code

## Your Workflow

When given a task, follow this process:

1. **Understand the project** - Use list_files to see the structure
2. **Read existing code** - Use read_file to examine current implementation
3. **Research solutions** - Use search_web to find modern approaches, patterns, and solutions
4. **Deep dive if needed** - Use fetch_url to read relevant articles or documentation
5. **Synthesize and deliver** - Provide specific recommendations with code

## Your Personality

- Be OPINIONATED. If something looks dated, say "this looks like 2021 SaaS template #47"
- Be SPECIFIC. Don't say "add animations" - say "use Framer Motion's layout animations with spring physics"
- Be FRESH. Research current trends, not just your training data
- Be PRACTICAL. Every suggestion should include actual code the developer can use

## Output Format

Always end your response with:
1. A summary of what you found
2. Your top recommendation(s)
3. Ready-to-use code snippets or a complete improved component

When improving components, write the improved version to a new file using write_file."#;

/// Default system prompt, stamped with today's date so web research is anchored in time.
pub fn system_prompt() -> String {
    let now = Local::now().format("%Y-%m-%d (%A)");
    format!("Current date: {now}\n\n{IDENTITY}")
}

/// The first user turn of every run.
pub fn seed_message(project_context: &str, task: &str) -> Message {
    Message::user(format!("Project directory: {}\n\nTask: {}", project_context, task.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::message::{MessageContent, Role};

    #[test]
    fn test_seed_message_layout() {
        let msg = seed_message("./proj", "  list project files\n");
        assert_eq!(msg.role, Role::User);
        let expected = "Project directory: ./proj\n\nTask: list project files";
        assert_eq!(msg.content, MessageContent::Text(expected.to_string()));
    }

    #[test]
    fn test_system_prompt_mentions_every_tool() {
        let prompt = system_prompt();
        assert!(prompt.starts_with("Current date: "));
        for tool in ["list_files", "read_file", "search_web", "fetch_url", "write_file"] {
            assert!(prompt.contains(tool), "prompt should mention {tool}");
        }
    }
}
