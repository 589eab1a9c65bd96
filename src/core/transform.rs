//! Template rewrites applied before submission.
//!
//! Two independent passes run over the in-memory template:
//! - async invocation destinations written as `acs:fc:::...` get the current
//!   region and account filled in
//! - functions declaring a local `CodeUri` are packaged and switched to a
//!   remote `Code` reference

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde_json::{json, Value};
use tracing::{debug, info, instrument};

use super::error::DeployError;
use crate::adapters::{CodePackager, PackageRequest};
use crate::config::Profile;
use crate::domain::template::{resource_type, FUNCTION_RESOURCE_TYPE};
use crate::domain::Template;

/// Placeholder for the empty region and account segments of a
/// partially-qualified resource name
const DESTINATION_PLACEHOLDER: &str = ":::";

const CONTAINER_RUNTIME: &str = "custom-container";

/// Fill region and account into a destination identifier.
///
/// Only the first placeholder is replaced.
pub fn qualify_destination(destination: &str, region: &str, account_id: &str) -> String {
    destination.replacen(
        DESTINATION_PLACEHOLDER,
        &format!(":{}:{}:", region, account_id),
        1,
    )
}

/// Qualify every function's `AsyncConfiguration.Destination` targets.
///
/// Returns how many destinations were rewritten. A destination with a
/// placeholder fails when the profile has no region or account id.
pub fn interpolate_async_destinations(
    template: &mut Template,
    profile: &Profile,
) -> Result<usize, DeployError> {
    let Some(resources) = template.resources_mut() else {
        return Ok(0);
    };

    let mut rewritten = 0;
    for resource in resources.values_mut() {
        if resource_type(resource) != Some(FUNCTION_RESOURCE_TYPE) {
            continue;
        }

        let Some(destination) = resource
            .pointer_mut("/Properties/AsyncConfiguration/Destination")
            .and_then(Value::as_object_mut)
        else {
            continue;
        };

        for target in ["OnSuccess", "OnFailure"] {
            if let Some(Value::String(arn)) = destination.get_mut(target) {
                if arn.contains(DESTINATION_PLACEHOLDER) {
                    require_profile_field("region", &profile.region, arn)?;
                    require_profile_field("account_id", &profile.account_id, arn)?;
                }
                let qualified = qualify_destination(arn, &profile.region, &profile.account_id);
                if qualified != *arn {
                    *arn = qualified;
                    rewritten += 1;
                }
            }
        }
    }

    Ok(rewritten)
}

fn require_profile_field(
    field: &'static str,
    value: &str,
    destination: &str,
) -> Result<(), DeployError> {
    if value.trim().is_empty() {
        return Err(DeployError::IncompleteProfile {
            field,
            destination: destination.to_string(),
        });
    }
    Ok(())
}

/// A function resource that still points at local source
#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingPackage {
    logical_id: String,
    code_uri: String,
    runtime: Option<String>,
}

/// Find functions that need packaging.
///
/// Container functions and functions that already carry `Code` are skipped;
/// a function with neither `Code` nor a non-empty `CodeUri` is an error.
fn pending_packages(template: &Template) -> Result<Vec<PendingPackage>, DeployError> {
    let Some(resources) = template.resources() else {
        return Ok(Vec::new());
    };

    let mut pending = Vec::new();
    for (logical_id, resource) in resources {
        if resource_type(resource) != Some(FUNCTION_RESOURCE_TYPE) {
            continue;
        }

        let properties = resource.get("Properties");
        let runtime = properties
            .and_then(|p| p.get("Runtime"))
            .and_then(Value::as_str);
        let has_code = properties
            .and_then(|p| p.get("Code"))
            .map_or(false, |c| !c.is_null());

        if runtime == Some(CONTAINER_RUNTIME) || has_code {
            continue;
        }

        let code_uri = properties
            .and_then(|p| p.get("CodeUri"))
            .and_then(Value::as_str)
            .filter(|uri| !uri.is_empty())
            .ok_or_else(|| DeployError::Packaging {
                message: format!("{} '{}' Code is empty", FUNCTION_RESOURCE_TYPE, logical_id),
            })?;

        pending.push(PendingPackage {
            logical_id: logical_id.clone(),
            code_uri: code_uri.to_string(),
            runtime: runtime.map(str::to_string),
        });
    }

    Ok(pending)
}

/// Rewrites templates before they are submitted
pub struct ResourceTransformer<'a> {
    packager: &'a dyn CodePackager,
    /// Where the packaged copy of the template is written
    packaged_template_path: PathBuf,
}

impl<'a> ResourceTransformer<'a> {
    pub fn new(packager: &'a dyn CodePackager, packaged_template_path: impl Into<PathBuf>) -> Self {
        Self {
            packager,
            packaged_template_path: packaged_template_path.into(),
        }
    }

    /// Apply both rewrites.
    ///
    /// Packaging is skipped for templates with a `Transform`, which the
    /// service expands itself.
    #[instrument(skip_all)]
    pub async fn transform(
        &self,
        template: &mut Template,
        profile: &Profile,
        base_dir: &Path,
        template_path: Option<&Path>,
    ) -> Result<(), DeployError> {
        let rewritten = interpolate_async_destinations(template, profile)?;
        debug!(rewritten, "Qualified async destinations");

        if template.has_transform() {
            debug!("Template has a Transform, skipping code packaging");
            return Ok(());
        }

        self.package_functions(template, base_dir, template_path)
            .await?;
        Ok(())
    }

    /// Package every function with local source and persist the packaged
    /// template. Returns how many functions were packaged.
    pub async fn package_functions(
        &self,
        template: &mut Template,
        base_dir: &Path,
        template_path: Option<&Path>,
    ) -> Result<usize, DeployError> {
        let pending = pending_packages(template)?;

        for item in &pending {
            info!(function = %item.logical_id, code_uri = %item.code_uri, "Packaging function code");

            let request = PackageRequest {
                base_dir: base_dir.to_path_buf(),
                template_path: template_path.map(Path::to_path_buf),
                code_uri: item.code_uri.clone(),
                runtime: item.runtime.clone(),
            };

            let packaged = self
                .packager
                .package(&request)
                .await
                .map_err(|e| DeployError::Packaging {
                    message: format!("CodeUri {}: {:#}", item.code_uri, e),
                })?;

            let object_name = packaged.object_name.ok_or_else(|| DeployError::Packaging {
                message: format!("CodeUri {} upload produced no object", item.code_uri),
            })?;

            let properties = template
                .resources_mut()
                .and_then(|r| r.get_mut(&item.logical_id))
                .and_then(|r| r.get_mut("Properties"))
                .and_then(Value::as_object_mut)
                .ok_or_else(|| DeployError::Packaging {
                    message: format!("Function '{}' lost its properties", item.logical_id),
                })?;

            properties.insert(
                "Code".to_string(),
                json!({
                    "OssBucketName": packaged.bucket,
                    "OssObjectName": object_name,
                }),
            );
            properties.remove("CodeUri");
        }

        self.write_packaged(template)?;
        Ok(pending.len())
    }

    fn write_packaged(&self, template: &Template) -> Result<(), DeployError> {
        let yaml = template.to_yaml()?;

        if let Some(parent) = self.packaged_template_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create directory: {}", parent.display())
            })?;
        }
        std::fs::write(&self.packaged_template_path, yaml).with_context(|| {
            format!(
                "Failed to write packaged template: {}",
                self.packaged_template_path.display()
            )
        })?;

        info!(path = %self.packaged_template_path.display(), "Wrote packaged template");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> Profile {
        Profile {
            region: "cn-hangzhou".to_string(),
            account_id: "123456".to_string(),
        }
    }

    #[test]
    fn test_qualify_destination() {
        assert_eq!(
            qualify_destination("acs:fc:::services/s/functions/f", "cn-hangzhou", "123"),
            "acs:fc:cn-hangzhou:123:services/s/functions/f"
        );
        assert_eq!(
            qualify_destination("acs:mns:cn-beijing:1:/queues/q", "cn-hangzhou", "123"),
            "acs:mns:cn-beijing:1:/queues/q"
        );
    }

    #[test]
    fn test_interpolate_only_touches_functions() {
        let mut template = Template::from_yaml(
            r#"
Resources:
  fn:
    Type: ALIYUN::FC::Function
    Properties:
      AsyncConfiguration:
        Destination:
          OnSuccess: "acs:fc:::services/s/functions/ok"
          OnFailure: "acs:mns:::/queues/failed/messages"
  other:
    Type: ALIYUN::FC::Service
    Properties:
      AsyncConfiguration:
        Destination:
          OnSuccess: "acs:fc:::services/s/functions/ok"
"#,
        )
        .unwrap();

        assert_eq!(interpolate_async_destinations(&mut template, &profile()).unwrap(), 2);

        let value = template.as_value();
        assert_eq!(
            value["Resources"]["fn"]["Properties"]["AsyncConfiguration"]["Destination"]["OnFailure"],
            "acs:mns:cn-hangzhou:123456:/queues/failed/messages"
        );
        assert_eq!(
            value["Resources"]["other"]["Properties"]["AsyncConfiguration"]["Destination"]["OnSuccess"],
            "acs:fc:::services/s/functions/ok"
        );
    }

    #[test]
    fn test_placeholder_needs_account_and_region() {
        let yaml = r#"
Resources:
  fn:
    Type: ALIYUN::FC::Function
    Properties:
      AsyncConfiguration:
        Destination:
          OnSuccess: "acs:fc:::services/s/functions/ok"
"#;
        let mut template = Template::from_yaml(yaml).unwrap();
        let no_account = Profile {
            region: "cn-hangzhou".to_string(),
            account_id: String::new(),
        };
        let err = interpolate_async_destinations(&mut template, &no_account).unwrap_err();
        assert!(matches!(err, DeployError::IncompleteProfile { field: "account_id", .. }));
        assert_eq!(
            template.as_value()["Resources"]["fn"]["Properties"]["AsyncConfiguration"]["Destination"]["OnSuccess"],
            "acs:fc:::services/s/functions/ok"
        );

        let no_region = Profile {
            region: " ".to_string(),
            account_id: "123".to_string(),
        };
        let err = interpolate_async_destinations(&mut template, &no_region).unwrap_err();
        assert!(matches!(err, DeployError::IncompleteProfile { field: "region", .. }));
    }

    #[test]
    fn test_qualified_destinations_need_no_profile() {
        let mut template = Template::from_yaml(
            r#"
Resources:
  fn:
    Type: ALIYUN::FC::Function
    Properties:
      AsyncConfiguration:
        Destination:
          OnSuccess: "acs:mns:cn-beijing:1:/queues/q"
"#,
        )
        .unwrap();
        let empty = Profile {
            region: String::new(),
            account_id: String::new(),
        };

        assert_eq!(interpolate_async_destinations(&mut template, &empty).unwrap(), 0);
    }

    #[test]
    fn test_pending_packages_skips_prebuilt_and_containers() {
        let template = Template::from_yaml(
            r#"
Resources:
  local:
    Type: ALIYUN::FC::Function
    Properties:
      Runtime: python3
      CodeUri: ./src
  prebuilt:
    Type: ALIYUN::FC::Function
    Properties:
      Code:
        OssBucketName: b
        OssObjectName: o
  container:
    Type: ALIYUN::FC::Function
    Properties:
      Runtime: custom-container
"#,
        )
        .unwrap();

        let pending = pending_packages(&template).unwrap();
        assert_eq!(
            pending,
            vec![PendingPackage {
                logical_id: "local".to_string(),
                code_uri: "./src".to_string(),
                runtime: Some("python3".to_string()),
            }]
        );
    }

    #[test]
    fn test_missing_code_uri_is_packaging_error() {
        let template = Template::from_yaml(
            r#"
Resources:
  broken:
    Type: ALIYUN::FC::Function
    Properties:
      Runtime: nodejs14
      CodeUri: ""
"#,
        )
        .unwrap();

        assert!(matches!(
            pending_packages(&template),
            Err(DeployError::Packaging { .. })
        ));
    }
}
