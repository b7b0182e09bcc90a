//! Agent loop - think, act, observe, repeat
//!
//! The loop is an explicit state machine:
//!
//! ```text
//! Seeded -> AwaitingModel -> ExecutingTools -> AwaitingModel -> ... -> Done
//!                         \-> Exhausted | Aborted | Cancelled
//! ```
//!
//! The conversation is only touched between states, once a model turn or a
//! full batch of tool results is in hand, so it never holds a partial turn.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::future::join_all;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::tools::ToolRunner;
use crate::ui;
use crate::Result;

use super::context::{seed_message, system_prompt};
use super::llm::LlmClient;
use super::message::{
    ChatResult, Conversation, Message, StopReason, ToolResultBlock, ToolUseBlock,
};

/// Default iteration ceiling
pub const DEFAULT_MAX_ITERATIONS: usize = 15;

enum State {
    Seeded,
    AwaitingModel,
    ExecutingTools(Vec<ToolUseBlock>),
    Done(String),
    Exhausted,
    Aborted(String),
    Cancelled,
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The model finished; carries the concatenated final text
    Completed(String),
    /// The iteration ceiling was reached without a final answer
    Exhausted,
    /// The model stopped for a reason the loop does not handle
    Aborted { stop_reason: String },
    /// The run was cancelled between iterations
    Cancelled,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Completed(text) => f.write_str(text),
            Outcome::Exhausted => {
                f.write_str("Agent reached maximum iterations without completing.")
            }
            Outcome::Aborted { stop_reason } => {
                write!(f, "Agent stopped unexpectedly: {}", stop_reason)
            }
            Outcome::Cancelled => f.write_str("Agent run cancelled."),
        }
    }
}

/// Everything a finished run leaves behind
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcome: Outcome,
    /// Number of model calls made
    pub iterations: usize,
    pub conversation: Conversation,
}

impl RunReport {
    /// The final answer, or the diagnostic text for a run that did not complete
    pub fn into_output(self) -> String {
        match self.outcome {
            Outcome::Completed(text) => text,
            other => other.to_string(),
        }
    }
}

/// The agent loop drives a model through tool calls until it answers
pub struct AgentLoop<C: LlmClient> {
    client: C,
    tools: ToolRunner,
    system_prompt: String,
    max_iterations: usize,
    verbose: bool,
    cancel: Option<Arc<AtomicBool>>,
}

impl<C: LlmClient> AgentLoop<C> {
    /// Create a new agent loop with the default prompt and iteration ceiling
    pub fn new(client: C, tools: ToolRunner) -> Self {
        Self {
            client,
            tools,
            system_prompt: system_prompt(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            verbose: false,
            cancel: None,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Print progress to the terminal
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Stop at the next iteration boundary once `flag` is set
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    /// Run one task to completion.
    ///
    /// Adapter failures and tool timeouts propagate as errors; tool-level
    /// failures are fed back to the model as result text.
    pub async fn run(&self, task: &str, project_context: &str) -> Result<RunReport> {
        let definitions = self.tools.definitions();
        let mut conversation = Conversation::new();
        let mut iterations = 0;
        let mut state = State::Seeded;

        let report = |outcome, iterations, conversation| RunReport {
            outcome,
            iterations,
            conversation,
        };

        info!(
            "Starting agent loop with {} (max {} iterations)",
            self.client.model_name(),
            self.max_iterations
        );

        loop {
            state = match state {
                State::Seeded => {
                    conversation.push(seed_message(project_context, task));
                    State::AwaitingModel
                }

                State::AwaitingModel => {
                    if self.is_cancelled() {
                        State::Cancelled
                    } else if iterations >= self.max_iterations {
                        State::Exhausted
                    } else {
                        iterations += 1;
                        debug!("Iteration {}/{}", iterations, self.max_iterations);
                        if self.verbose {
                            ui::print_iteration(iterations);
                        }

                        let result = self
                            .client
                            .chat(conversation.messages(), &self.system_prompt, &definitions)
                            .await?;
                        self.observe(result, &mut conversation)
                    }
                }

                State::ExecutingTools(calls) => {
                    let results = self.execute_tools(&calls).await?;
                    conversation.push(Message::tool_results(results));
                    State::AwaitingModel
                }

                State::Done(text) => {
                    info!(
                        "Agent completed after {} iterations: {} chars",
                        iterations,
                        text.len()
                    );
                    if self.verbose {
                        ui::print_complete();
                    }
                    return Ok(report(Outcome::Completed(text), iterations, conversation));
                }

                State::Exhausted => {
                    warn!("Agent reached the {} iteration ceiling", self.max_iterations);
                    return Ok(report(Outcome::Exhausted, iterations, conversation));
                }

                State::Aborted(stop_reason) => {
                    warn!("Agent stopped unexpectedly: {}", stop_reason);
                    let outcome = Outcome::Aborted { stop_reason };
                    return Ok(report(outcome, iterations, conversation));
                }

                State::Cancelled => {
                    info!("Agent run cancelled after {} iterations", iterations);
                    return Ok(report(Outcome::Cancelled, iterations, conversation));
                }
            };
        }
    }

    /// Classify a model turn and record it
    fn observe(&self, result: ChatResult, conversation: &mut Conversation) -> State {
        match result.stop_reason {
            StopReason::EndTurn => {
                let text = result.joined_text();
                conversation.push(Message::assistant(result.content));
                State::Done(text)
            }
            StopReason::ToolUse => {
                let calls: Vec<ToolUseBlock> = result.tool_uses().into_iter().cloned().collect();
                if calls.is_empty() {
                    return State::Aborted("tool_use without any tool request".to_string());
                }
                conversation.push(Message::assistant(result.content));
                State::ExecutingTools(calls)
            }
            StopReason::Other(reason) => State::Aborted(reason),
        }
    }

    /// Run every requested tool; results come back in request order
    async fn execute_tools(&self, calls: &[ToolUseBlock]) -> Result<Vec<ToolResultBlock>> {
        let outputs = join_all(calls.iter().map(|call| self.execute_tool(call))).await;

        calls
            .iter()
            .zip(outputs)
            .map(|(call, output)| {
                let content = output?;
                // Each call is printed directly above its own result
                if self.verbose {
                    let input = Value::Object(call.input.clone()).to_string();
                    ui::print_tool_call(&call.name, &input);
                    ui::print_tool_result(&content);
                }
                Ok(ToolResultBlock {
                    tool_use_id: call.id.clone(),
                    tool_name: call.name.clone(),
                    content,
                })
            })
            .collect()
    }

    async fn execute_tool(&self, call: &ToolUseBlock) -> Result<String> {
        debug!("Executing tool: {} with {} args", call.name, call.input.len());

        match self.tools.execute(&call.name, Value::Object(call.input.clone())).await {
            Ok(result) => {
                debug!("Tool {} succeeded: {} chars", call.name, result.len());
                Ok(result)
            }
            Err(e) if e.is_recoverable() => {
                let message = recovered_text(e);
                debug!("Tool {} failed: {}", call.name, message);
                Ok(message)
            }
            Err(e) => {
                warn!("Tool {} aborted the run: {}", call.name, e);
                Err(e)
            }
        }
    }
}

/// Text handed back to the model for a tool failure it can react to
fn recovered_text(err: Error) -> String {
    match err {
        Error::Tool(message) => format!("Error: {}", message),
        other => other.to_string(),
    }
}

/// Run one task with the default prompt and return the final text.
///
/// Runs that do not complete yield their diagnostic text instead.
pub async fn run_agent<C: LlmClient>(
    task: &str,
    project_context: &str,
    client: C,
    tools: ToolRunner,
    max_iterations: usize,
) -> Result<String> {
    let report = AgentLoop::new(client, tools)
        .with_max_iterations(max_iterations)
        .run(task, project_context)
        .await?;
    Ok(report.into_output())
}
