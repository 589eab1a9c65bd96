//! Plain-text console rendering of deployment progress.

use crate::core::triggers::TriggerBinding;
use crate::domain::{ChangeGroup, Parameter, StackEvent, StackOutput};

use super::DeployReporter;

/// Prints changes, events and results to stdout
#[derive(Debug, Default)]
pub struct ConsoleReporter;

impl ConsoleReporter {
    pub fn new() -> Self {
        Self
    }
}

/// Shorten a cell to `width` characters, marking the cut with `…`
fn fit(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        return value.to_string();
    }
    let mut cut: String = value.chars().take(width.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

impl DeployReporter for ConsoleReporter {
    fn changes(&self, groups: &[ChangeGroup]) {
        if groups.is_empty() {
            return;
        }

        println!("\nChange set changes:\n");
        println!(
            "{:<30} {:<30} {:<8} {}",
            "LOGICAL ID", "RESOURCE TYPE", "ACTION", "PROPERTY"
        );
        println!("{}", "-".repeat(90));

        for group in groups {
            let first = group.properties.first().map(String::as_str).unwrap_or("");
            println!(
                "{:<30} {:<30} {:<8} {}",
                fit(&group.key.logical_resource_id, 30),
                fit(&group.key.resource_type, 30),
                group.key.action,
                first
            );
            for property in group.properties.iter().skip(1) {
                println!("{:<30} {:<30} {:<8} {}", "", "", "", property);
            }
        }
        println!();
    }

    fn parameters(&self, parameters: &[Parameter]) {
        if parameters.is_empty() {
            return;
        }

        println!("Stack parameters:\n");
        println!("{:<30} {}", "KEY", "VALUE");
        println!("{}", "-".repeat(60));
        for p in parameters {
            println!("{:<30} {}", fit(&p.key, 30), p.value);
        }
        println!();
    }

    fn events(&self, stack_name: &str, events: &[StackEvent]) {
        for event in events
            .iter()
            .filter(|e| e.logical_resource_id != stack_name)
        {
            println!(
                "{:<30} {:<20}",
                fit(&event.logical_resource_id, 30),
                event.status
            );
        }
    }

    fn triggers(&self, bindings: &[TriggerBinding]) {
        for binding in bindings {
            println!();
            match binding {
                TriggerBinding::Domain {
                    trigger_name,
                    methods,
                    url,
                } => {
                    println!("triggerName: {}", trigger_name);
                    println!("methods: {}", methods.join(","));
                    println!("url: {}", url);
                }
                TriggerBinding::Trigger {
                    service_name,
                    function_name,
                    trigger_name,
                    trigger_type,
                    config,
                } => {
                    println!("serviceName: {}", service_name);
                    println!("functionName: {}", function_name);
                    println!("triggerName: {}", trigger_name);
                    println!("triggerType: {}", trigger_type);
                    if !config.is_null() {
                        println!("config: {}", config);
                    }
                }
            }
        }
    }

    fn outputs(&self, outputs: &[StackOutput]) {
        if outputs.is_empty() {
            return;
        }

        println!("\nStack outputs:\n");
        println!("{:<30} {:<40} {}", "KEY", "VALUE", "DESCRIPTION");
        println!("{}", "-".repeat(90));
        for o in outputs {
            let value = match &o.value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            println!(
                "{:<30} {:<40} {}",
                fit(&o.key, 30),
                value,
                o.description.as_deref().unwrap_or("")
            );
        }
        println!();
    }

    fn success(&self, console_url: &str) {
        println!(
            "\nDeploy success, you can also visit {} to see more deploy logs.\n",
            console_url
        );
    }
}
