//! Interactive CLI loop.
//!
//! A plain `stdin`/`stdout` loop with no argument-parsing dependency,
//! driving [`crate::session::create_thread`] once per turn rather than
//! holding a single long-lived [`crate::llm::LLMService`] session. The
//! external thread id is fixed for the process's lifetime so every turn
//! lands in the same conversation.

use crate::deps::EngineDeps;
use crate::error::Result;
use crate::session::{create_thread, CreateThreadRequest};
use std::io::{self, Write};

/// Runs an interactive read-eval-print loop against `deps` until stdin
/// closes (EOF) or the user types `exit`/`quit`.
///
/// All turns share one thread, identified by `session_external_id` —
/// callers that want a fresh conversation per process invocation should
/// pass a freshly generated id (e.g. a UUID).
pub async fn run_cli(deps: &EngineDeps, session_external_id: &str) -> Result<()> {
    println!("conversant interactive session ({session_external_id}). Type 'exit' to quit.");

    let mut thread_id: Option<String> = None;

    loop {
        print!("you> ");
        io::stdout().flush().ok();

        let mut line = String::new();
        if io::stdin().read_line(&mut line).unwrap_or(0) == 0 {
            break; // EOF
        }
        let content = line.trim();
        if content.is_empty() {
            continue;
        }
        if content.eq_ignore_ascii_case("exit") || content.eq_ignore_ascii_case("quit") {
            break;
        }

        let response = create_thread(
            deps,
            CreateThreadRequest {
                thread_id: thread_id.clone(),
                thread_external_id: Some(session_external_id.to_string()),
                content: content.to_string(),
                ..Default::default()
            },
        )
        .await?;
        thread_id = Some(response.thread_id.clone());

        let history = deps
            .store
            .get_message_history(&response.thread_id, "user", 1)
            .await?;
        if let Some(last) = history.last() {
            println!("{}> {}", last.sender_id, last.content);
        }
    }

    Ok(())
}
