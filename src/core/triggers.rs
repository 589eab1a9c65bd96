//! HTTP trigger and custom domain detection in a deployed template.

use serde_json::{Map, Value};

use crate::domain::template::{
    resource_type, CUSTOM_DOMAIN_RESOURCE_TYPE, FUNCTION_RESOURCE_TYPE, TRIGGER_RESOURCE_TYPE,
};

/// How a deployed trigger can be reached
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerBinding {
    /// Routed through a custom domain
    Domain {
        trigger_name: String,
        methods: Vec<String>,
        url: String,
    },
    /// No custom domain route; reported as declared
    Trigger {
        service_name: String,
        function_name: String,
        trigger_name: String,
        trigger_type: String,
        config: Value,
    },
}

/// A custom domain route resolved to the function it serves
#[derive(Debug, Clone, PartialEq, Eq)]
struct RouteConfig {
    service_name: String,
    function_name: String,
    path: String,
    domain_name: String,
}

fn str_prop<'v>(properties: &'v Value, key: &str) -> &'v str {
    properties.get(key).and_then(Value::as_str).unwrap_or("")
}

/// Domain + path, without trailing slashes
pub fn route_url(domain_name: &str, path: &str) -> String {
    format!("{}{}", domain_name, path)
        .trim_end_matches('/')
        .to_string()
}

/// Service and function names of the function resource `logical_id`
fn resolve_function(resources: &Map<String, Value>, logical_id: &str) -> Option<(String, String)> {
    let resource = resources.get(logical_id)?;
    if resource_type(resource) != Some(FUNCTION_RESOURCE_TYPE) {
        return None;
    }
    let properties = resource.get("Properties")?;
    Some((
        str_prop(properties, "ServiceName").to_string(),
        str_prop(properties, "FunctionName").to_string(),
    ))
}

/// Collect routes whose function is referenced with `Fn::GetAtt`
fn route_configs(resources: &Map<String, Value>) -> Vec<RouteConfig> {
    let mut configs = Vec::new();

    for resource in resources.values() {
        if resource_type(resource) != Some(CUSTOM_DOMAIN_RESOURCE_TYPE) {
            continue;
        }

        let properties = resource.get("Properties").cloned().unwrap_or(Value::Null);
        let domain_name = str_prop(&properties, "DomainName");
        let Some(routes) = properties
            .pointer("/RouteConfig/Routes")
            .and_then(Value::as_array)
        else {
            continue;
        };

        for route in routes {
            let Some(logical_id) = route
                .pointer("/FunctionName/Fn::GetAtt/0")
                .and_then(Value::as_str)
            else {
                continue;
            };
            let Some((service_name, function_name)) = resolve_function(resources, logical_id)
            else {
                continue;
            };

            configs.push(RouteConfig {
                service_name,
                function_name,
                path: str_prop(route, "Path").to_string(),
                domain_name: domain_name.to_string(),
            });
        }
    }

    configs
}

fn methods(trigger_config: &Value) -> Vec<String> {
    trigger_config
        .get("Methods")
        .or_else(|| trigger_config.get("methods"))
        .map(|m| match m {
            Value::Array(items) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            Value::String(s) => vec![s.clone()],
            _ => Vec::new(),
        })
        .unwrap_or_default()
}

/// Describe every trigger in `resources`, preferring custom domain routes
pub fn detect_triggers(resources: &Map<String, Value>) -> Vec<TriggerBinding> {
    let routes = route_configs(resources);

    resources
        .values()
        .filter(|r| resource_type(r) == Some(TRIGGER_RESOURCE_TYPE))
        .map(|trigger| {
            let properties = trigger.get("Properties").cloned().unwrap_or(Value::Null);
            let config = properties.get("TriggerConfig").cloned().unwrap_or(Value::Null);
            let service_name = str_prop(&properties, "ServiceName");
            let function_name = str_prop(&properties, "FunctionName");
            let trigger_name = str_prop(&properties, "TriggerName").to_string();

            match routes
                .iter()
                .find(|r| r.service_name == service_name && r.function_name == function_name)
            {
                Some(route) => TriggerBinding::Domain {
                    trigger_name,
                    methods: methods(&config),
                    url: route_url(&route.domain_name, &route.path),
                },
                None => TriggerBinding::Trigger {
                    service_name: service_name.to_string(),
                    function_name: function_name.to_string(),
                    trigger_name,
                    trigger_type: str_prop(&properties, "TriggerType").to_string(),
                    config,
                },
            }
        })
        .collect()
}
