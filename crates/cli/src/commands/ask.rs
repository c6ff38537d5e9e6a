use tripwise_agent::TravelAgent;
use tripwise_core::config::LoadOptions;

use super::{load_config, CommandResult, EXIT_RUNTIME};
use crate::logging;

pub fn run(options: LoadOptions, utterance: &str) -> CommandResult {
    let config = match load_config("ask", options) {
        Ok(config) => config,
        Err(result) => return result,
    };
    logging::init(&config.logging);

    let mut agent = match TravelAgent::from_config(&config) {
        Ok(agent) => agent,
        Err(error) => {
            return CommandResult::failure("ask", "agent_setup", error.to_string(), EXIT_RUNTIME)
        }
    };

    match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime.block_on(answer(&mut agent, utterance)),
        Err(error) => CommandResult::failure(
            "ask",
            "runtime",
            format!("failed to initialize async runtime: {error}"),
            EXIT_RUNTIME,
        ),
    }
}

/// One turn against `agent`. The answer is printed as-is, errors included.
pub async fn answer(agent: &mut TravelAgent, utterance: &str) -> CommandResult {
    let utterance = utterance.trim();
    if utterance.is_empty() {
        return CommandResult::failure("ask", "usage", "nothing to ask", EXIT_RUNTIME);
    }
    CommandResult::text(agent.process_query(utterance).await)
}
