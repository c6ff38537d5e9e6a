use std::future::Future;

use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::runtime::Runtime;
use tracing::info;
use tripwise_agent::TravelAgent;
use tripwise_core::config::LoadOptions;

use super::{load_config, CommandResult, EXIT_RUNTIME};
use crate::logging;

const GREETING: &str = "🌍 Tripwise travel assistant\n\
Ask about flights, hotels or things to do. Type quit, exit or q to leave.";
const PROMPT: &str = "\n👤 You: ";
const FAREWELL: &str = "👋 Safe travels!";

pub fn run(options: LoadOptions) -> CommandResult {
    let config = match load_config("chat", options) {
        Ok(config) => config,
        Err(result) => return result,
    };
    logging::init(&config.logging);

    let mut agent = match TravelAgent::from_config(&config) {
        Ok(agent) => agent,
        Err(error) => {
            return CommandResult::failure("chat", "agent_setup", error.to_string(), EXIT_RUNTIME)
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "chat",
                "runtime",
                format!("failed to initialize async runtime: {error}"),
                EXIT_RUNTIME,
            )
        }
    };

    let outcome = block_on_detached(runtime, async {
        let input = BufReader::new(io::stdin());
        let mut output = io::stdout();
        tokio::select! {
            result = run_session(&mut agent, input, &mut output) => result.map(Some),
            _ = tokio::signal::ctrl_c() => Ok(None),
        }
    });

    match outcome {
        Ok(turns) => {
            info!(
                event_name = "cli.chat.finished",
                session_id = %agent.session_id(),
                turns = turns.unwrap_or(agent.memory().len()),
                interrupted = turns.is_none(),
                "chat session finished"
            );
            CommandResult::text(FAREWELL)
        }
        Err(error) => CommandResult::failure(
            "chat",
            "io",
            format!("terminal i/o failed: {error}"),
            EXIT_RUNTIME,
        ),
    }
}

/// Reads utterances line by line until an exit word or end of input and returns how
/// many turns were answered. Blank lines are ignored.
pub async fn run_session<R, W>(
    agent: &mut TravelAgent,
    mut input: R,
    output: &mut W,
) -> std::io::Result<usize>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    output.write_all(GREETING.as_bytes()).await?;
    output.write_all(b"\n").await?;

    let mut turns = 0;
    let mut line = String::new();
    loop {
        output.write_all(PROMPT.as_bytes()).await?;
        output.flush().await?;

        line.clear();
        if input.read_line(&mut line).await? == 0 {
            break;
        }

        let utterance = line.trim();
        if utterance.is_empty() {
            continue;
        }
        if is_exit_word(utterance) {
            break;
        }

        let response = agent.process_query(utterance).await;
        output.write_all(format!("\n🤖 Agent: {response}\n").as_bytes()).await?;
        turns += 1;
    }

    output.flush().await?;
    Ok(turns)
}

/// Drives `future` to completion, then abandons work still parked on the blocking
/// pool. A stdin read interrupted by Ctrl-C never returns on its own.
fn block_on_detached<F: Future>(runtime: Runtime, future: F) -> F::Output {
    let output = runtime.block_on(future);
    runtime.shutdown_background();
    output
}

pub fn is_exit_word(utterance: &str) -> bool {
    matches!(utterance.trim().to_lowercase().as_str(), "quit" | "exit" | "q")
}
