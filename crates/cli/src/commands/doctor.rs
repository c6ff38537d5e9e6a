use serde::Serialize;
use tripwise_agent::prompts::{PromptKind, Prompts};
use tripwise_agent::TravelAgent;
use tripwise_core::config::{AppConfig, ConfigError, LoadOptions};

use super::CommandResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

/// Exit code 1 when any check fails.
pub fn run(options: LoadOptions, json_output: bool) -> CommandResult {
    let report = build_report(options);
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report(options: LoadOptions) -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(options) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(DoctorCheck {
                name: "credentials",
                status: CheckStatus::Pass,
                details: "CLAUDE_API_KEY and RAPIDAPI_KEY are set".to_string(),
            });
            checks.push(check_prompt_templates());
            checks.push(check_agent_wiring(&config));
        }
        Err(error) => {
            let credentials = match &error {
                ConfigError::MissingCredentials(missing) => DoctorCheck {
                    name: "credentials",
                    status: CheckStatus::Fail,
                    details: format!("not set: {}", missing.join(", ")),
                },
                _ => skipped("credentials"),
            };
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.push(credentials);
            checks.push(check_prompt_templates());
            checks.push(skipped("agent_wiring"));
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn skipped(name: &'static str) -> DoctorCheck {
    DoctorCheck {
        name,
        status: CheckStatus::Skipped,
        details: "skipped because configuration did not load".to_string(),
    }
}

fn check_prompt_templates() -> DoctorCheck {
    match Prompts::new() {
        Ok(_) => DoctorCheck {
            name: "prompt_templates",
            status: CheckStatus::Pass,
            details: format!("{} templates compiled", PromptKind::ALL.len()),
        },
        Err(error) => DoctorCheck {
            name: "prompt_templates",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
}

/// Builds the real clients without sending anything over the network.
fn check_agent_wiring(config: &AppConfig) -> DoctorCheck {
    match TravelAgent::from_config(config) {
        Ok(_) => DoctorCheck {
            name: "agent_wiring",
            status: CheckStatus::Pass,
            details: format!(
                "model `{}`, booking host `{}`",
                config.llm.model, config.booking.api_host
            ),
        },
        Err(error) => DoctorCheck {
            name: "agent_wiring",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
