//! Declared deployment topology and its access invariants.
//!
//! A typed description of what gets provisioned around the two functions:
//! asset bucket, CDN distribution, secret, grants and the workflow. It is not a
//! template for any provisioning engine; it exists so the configuration can be
//! inspected and its invariants checked in tests and by `describe`.

use crate::models::SECRET_PLACEHOLDER;
use crate::workflow::{StateMachineDefinition, NOTIFICATION_STATE, PLOT_STATE};
use crate::{Error, Result};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

pub const GET_OBJECT: &str = "s3:GetObject";
pub const PLOT_TIMEOUT_SECONDS: u32 = 180;
pub const LAMBDA_MAX_TIMEOUT_SECONDS: u32 = 900;

/// Logical identifiers of the declared resources.
#[derive(Debug, Clone, Serialize)]
pub struct TopologyNames {
    pub bucket: String,
    pub origin_identity: String,
    pub distribution: String,
    pub secret: String,
    pub plot_function: String,
    pub notification_function: String,
    pub state_machine: String,
}

impl Default for TopologyNames {
    fn default() -> Self {
        Self {
            bucket: "AssetBucket".to_string(),
            origin_identity: "cloudfront-OAI".to_string(),
            distribution: "AssetDistribution".to_string(),
            secret: "Secret".to_string(),
            plot_function: "PlotLambda".to_string(),
            notification_function: "NotificationLambda".to_string(),
            state_machine: "StateMachine".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Principal {
    CdnIdentity(String),
    Function(String),
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalPolicy {
    Destroy,
    Retain,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyStatement {
    pub principal: Principal,
    pub actions: Vec<String>,
    pub resource: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Bucket {
    pub id: String,
    pub removal_policy: RemovalPolicy,
    pub auto_delete_objects: bool,
    pub policy: Vec<PolicyStatement>,
}

impl Bucket {
    pub fn objects_resource(&self) -> String {
        format!("{}/*", self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewerProtocolPolicy {
    RedirectToHttps,
    HttpsOnly,
    AllowAll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SecurityPolicy {
    #[serde(rename = "TLSv1")]
    TlsV1,
    #[serde(rename = "TLSv1_2016")]
    TlsV1_2016,
    #[serde(rename = "TLSv1.1_2016")]
    TlsV1_1_2016,
    #[serde(rename = "TLSv1.2_2019")]
    TlsV1_2_2019,
    #[serde(rename = "TLSv1.2_2021")]
    TlsV1_2_2021,
}

impl SecurityPolicy {
    /// Minimum (major, minor) TLS version the policy accepts.
    pub fn minimum_tls(&self) -> (u8, u8) {
        match self {
            SecurityPolicy::TlsV1 | SecurityPolicy::TlsV1_2016 => (1, 0),
            SecurityPolicy::TlsV1_1_2016 => (1, 1),
            SecurityPolicy::TlsV1_2_2019 | SecurityPolicy::TlsV1_2_2021 => (1, 2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Head,
    Options,
    Put,
    Post,
    Patch,
    Delete,
}

#[derive(Debug, Clone, Serialize)]
pub struct Distribution {
    pub id: String,
    pub origin_bucket: String,
    pub origin_identity: String,
    pub viewer_protocol_policy: ViewerProtocolPolicy,
    pub minimum_protocol_version: SecurityPolicy,
    pub allowed_methods: Vec<HttpMethod>,
    pub compress: bool,
    /// Paths invalidated on every deployment.
    pub invalidation_paths: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SecretDeclaration {
    pub id: String,
    pub removal_policy: RemovalPolicy,
    /// Field name to deploy-time value. Placeholders are replaced by hand.
    pub fields: BTreeMap<String, String>,
}

/// Environment values are references resolved at provisioning time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "ref", content = "target", rename_all = "snake_case")]
pub enum EnvValue {
    Literal(String),
    BucketName(String),
    SecretName(String),
    DistributionUrl(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct Function {
    pub id: String,
    pub image_asset: String,
    pub environment: BTreeMap<String, EnvValue>,
    pub timeout_seconds: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "grant", rename_all = "snake_case")]
pub enum Grant {
    BucketPut { function: String, bucket: String },
    SecretRead { function: String, secret: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct Topology {
    pub names: TopologyNames,
    pub bucket: Bucket,
    pub distribution: Distribution,
    pub secret: SecretDeclaration,
    pub functions: Vec<Function>,
    pub grants: Vec<Grant>,
    pub workflow: StateMachineDefinition,
}

impl Topology {
    pub fn declare(names: TopologyNames) -> Self {
        let bucket_id = names.bucket.clone();
        let bucket = Bucket {
            id: bucket_id.clone(),
            removal_policy: RemovalPolicy::Destroy,
            auto_delete_objects: true,
            policy: vec![PolicyStatement {
                principal: Principal::CdnIdentity(names.origin_identity.clone()),
                actions: vec![GET_OBJECT.to_string()],
                resource: format!("{}/*", bucket_id),
            }],
        };

        let distribution = Distribution {
            id: names.distribution.clone(),
            origin_bucket: bucket_id.clone(),
            origin_identity: names.origin_identity.clone(),
            viewer_protocol_policy: ViewerProtocolPolicy::RedirectToHttps,
            minimum_protocol_version: SecurityPolicy::TlsV1_2_2021,
            allowed_methods: vec![HttpMethod::Get, HttpMethod::Head, HttpMethod::Options],
            compress: true,
            invalidation_paths: vec!["/*".to_string()],
        };

        let secret = SecretDeclaration {
            id: names.secret.clone(),
            removal_policy: RemovalPolicy::Destroy,
            fields: BTreeMap::from([
                ("SLACK_BOT_TOKEN".to_string(), SECRET_PLACEHOLDER.to_string()),
                (
                    "SLACK_CHANNEL_TO_NOTIFY".to_string(),
                    SECRET_PLACEHOLDER.to_string(),
                ),
            ]),
        };

        let functions = vec![
            Function {
                id: names.plot_function.clone(),
                image_asset: "plot-lambda".to_string(),
                environment: BTreeMap::from([(
                    "S3_BUCKET_NAME".to_string(),
                    EnvValue::BucketName(bucket_id.clone()),
                )]),
                timeout_seconds: Some(PLOT_TIMEOUT_SECONDS),
            },
            Function {
                id: names.notification_function.clone(),
                image_asset: "notification-lambda".to_string(),
                environment: BTreeMap::from([
                    (
                        "SLACK_CREDENTIALS_SECRET_ID".to_string(),
                        EnvValue::SecretName(names.secret.clone()),
                    ),
                    (
                        "CLOUD_FRONT_DISTRIBUTION_URL".to_string(),
                        EnvValue::DistributionUrl(names.distribution.clone()),
                    ),
                ]),
                timeout_seconds: None,
            },
        ];

        let grants = vec![
            Grant::BucketPut {
                function: names.plot_function.clone(),
                bucket: bucket_id,
            },
            Grant::SecretRead {
                function: names.notification_function.clone(),
                secret: names.secret.clone(),
            },
        ];

        let workflow = StateMachineDefinition::plot_then_notify(
            &names.plot_function,
            &names.notification_function,
        );

        Self {
            names,
            bucket,
            distribution,
            secret,
            functions,
            grants,
            workflow,
        }
    }

    pub fn function(&self, id: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.id == id)
    }

    /// Principals allowed to read objects from the asset bucket.
    pub fn bucket_readers(&self) -> Vec<&Principal> {
        self.bucket
            .policy
            .iter()
            .filter(|s| s.actions.iter().any(|a| a == GET_OBJECT || a == "s3:*"))
            .map(|s| &s.principal)
            .collect()
    }

    /// Functions allowed to read the secret.
    pub fn secret_readers(&self) -> Vec<&str> {
        self.grants
            .iter()
            .filter_map(|g| match g {
                Grant::SecretRead { function, secret } if *secret == self.secret.id => {
                    Some(function.as_str())
                }
                _ => None,
            })
            .collect()
    }

    /// Secret fields that still hold the deploy-time placeholder.
    pub fn placeholder_fields(&self) -> Vec<&str> {
        self.secret
            .fields
            .iter()
            .filter(|(_, v)| v.as_str() == SECRET_PLACEHOLDER)
            .map(|(k, _)| k.as_str())
            .collect()
    }

    /// Every violated invariant, in a stable order.
    pub fn violations(&self) -> Vec<String> {
        let mut violations = Vec::new();
        self.check_bucket(&mut violations);
        self.check_distribution(&mut violations);
        self.check_secret(&mut violations);
        self.check_functions(&mut violations);
        self.check_workflow(&mut violations);
        violations
    }

    pub fn validate(&self) -> Result<()> {
        let violations = self.violations();
        if violations.is_empty() {
            Ok(())
        } else {
            Err(Error::Topology(violations.join("; ")))
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn check_bucket(&self, out: &mut Vec<String>) {
        let cdn = Principal::CdnIdentity(self.distribution.origin_identity.clone());

        if self.bucket.policy.is_empty() {
            out.push("bucket policy grants the CDN identity nothing".to_string());
        }
        for statement in &self.bucket.policy {
            if statement.principal != cdn {
                out.push(format!(
                    "bucket policy grants {:?} access; only the CDN identity may read",
                    statement.principal
                ));
            }
            if statement.actions.iter().any(|a| a != GET_OBJECT) {
                out.push(format!(
                    "bucket policy allows {:?}; only {} is permitted",
                    statement.actions, GET_OBJECT
                ));
            }
            if statement.resource != self.bucket.objects_resource() {
                out.push(format!(
                    "bucket policy resource {} is not the bucket's objects",
                    statement.resource
                ));
            }
        }

        if !self.bucket.auto_delete_objects {
            out.push("bucket objects are not deleted on teardown".to_string());
        } else if self.bucket.removal_policy != RemovalPolicy::Destroy {
            out.push(
                "auto-deleting bucket objects requires the destroy removal policy".to_string(),
            );
        }

        let mut plot_can_write = false;
        for grant in &self.grants {
            if let Grant::BucketPut { function, bucket } = grant {
                if *bucket != self.bucket.id {
                    out.push(format!(
                        "{} holds a put grant on unknown bucket {}",
                        function, bucket
                    ));
                } else if *function != self.names.plot_function {
                    out.push(format!("{} may write to the asset bucket", function));
                } else {
                    plot_can_write = true;
                }
            }
        }
        if !plot_can_write {
            out.push(format!(
                "{} cannot write to the asset bucket",
                self.names.plot_function
            ));
        }
    }

    fn check_distribution(&self, out: &mut Vec<String>) {
        let d = &self.distribution;
        if d.origin_bucket != self.bucket.id {
            out.push(format!("distribution origin {} is not the asset bucket", d.origin_bucket));
        }
        if d.viewer_protocol_policy != ViewerProtocolPolicy::RedirectToHttps {
            out.push("distribution does not redirect HTTP to HTTPS".to_string());
        }
        if d.minimum_protocol_version.minimum_tls() < (1, 2) {
            out.push("distribution accepts TLS below 1.2".to_string());
        }
        let methods: BTreeSet<HttpMethod> = d.allowed_methods.iter().copied().collect();
        let read_only = BTreeSet::from([HttpMethod::Get, HttpMethod::Head, HttpMethod::Options]);
        if methods != read_only {
            out.push(format!(
                "distribution allows {:?}; expected GET, HEAD, OPTIONS",
                d.allowed_methods
            ));
        }
        if !d.compress {
            out.push("distribution does not compress responses".to_string());
        }
        if !d.invalidation_paths.iter().any(|p| p == "/*") {
            out.push("deployment does not invalidate /*".to_string());
        }
    }

    fn check_secret(&self, out: &mut Vec<String>) {
        for field in ["SLACK_BOT_TOKEN", "SLACK_CHANNEL_TO_NOTIFY"] {
            if !self.secret.fields.contains_key(field) {
                out.push(format!("secret is missing field {}", field));
            }
        }

        let readers: BTreeSet<&str> = self.secret_readers().into_iter().collect();
        if readers != BTreeSet::from([self.names.notification_function.as_str()]) {
            out.push(format!(
                "secret readers are {:?}; only {} may read",
                readers, self.names.notification_function
            ));
        }
    }

    fn check_functions(&self, out: &mut Vec<String>) {
        let expectations = [
            (
                &self.names.plot_function,
                vec![(
                    "S3_BUCKET_NAME",
                    EnvValue::BucketName(self.bucket.id.clone()),
                )],
            ),
            (
                &self.names.notification_function,
                vec![
                    (
                        "SLACK_CREDENTIALS_SECRET_ID",
                        EnvValue::SecretName(self.secret.id.clone()),
                    ),
                    (
                        "CLOUD_FRONT_DISTRIBUTION_URL",
                        EnvValue::DistributionUrl(self.distribution.id.clone()),
                    ),
                ],
            ),
        ];

        for (id, env) in expectations {
            let Some(function) = self.function(id) else {
                out.push(format!("function {} is not declared", id));
                continue;
            };
            for (key, expected) in env {
                if function.environment.get(key) != Some(&expected) {
                    out.push(format!("{} must set {} to {:?}", id, key, expected));
                }
            }
        }

        match self
            .function(&self.names.plot_function)
            .and_then(|f| f.timeout_seconds)
        {
            Some(t) if t > 0 && t <= LAMBDA_MAX_TIMEOUT_SECONDS => {}
            Some(t) => out.push(format!("plot function timeout {}s is out of range", t)),
            None => out.push("plot function has no explicit timeout".to_string()),
        }
    }

    fn check_workflow(&self, out: &mut Vec<String>) {
        let order = match self.workflow.execution_order() {
            Ok(order) => order,
            Err(e) => {
                out.push(e.to_string());
                return;
            }
        };

        if order != [PLOT_STATE, NOTIFICATION_STATE] {
            out.push(format!(
                "workflow runs {:?}; expected {} then {}",
                order, PLOT_STATE, NOTIFICATION_STATE
            ));
            return;
        }

        for (state, function) in [
            (PLOT_STATE, &self.names.plot_function),
            (NOTIFICATION_STATE, &self.names.notification_function),
        ] {
            let bound = self
                .workflow
                .task(state)
                .map(|t| t.parameters.function_name.as_str());
            if bound != Some(function.as_str()) {
                out.push(format!("{} does not invoke {}", state, function));
            }
        }
    }
}
