/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use serde::Serialize;
use serde_json::{json, Value};

/// Policy language version written into every document
pub const POLICY_VERSION: &str = "2012-10-17";

/// Principal key used for tenant (account canonical ID) principals
pub const DEFAULT_TENANT_PRINCIPAL_KEY: &str = "MGC";

/// Statement effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Effect {
    /// Grant the actions
    Allow,
    /// Deny the actions
    Deny,
}

/// Who a statement applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    /// Everyone, rendered as `"*"`
    Anyone,
    /// The given account canonical IDs, rendered as `{"<key>": [ids...]}`
    Tenants {
        /// Provider key, e.g. `MGC` or `AWS`
        key: String,
        /// Canonical IDs
        ids: Vec<String>,
    },
}

impl Principal {
    /// Tenant principal under the default provider key.
    pub fn tenant(id: impl Into<String>) -> Self {
        Principal::Tenants {
            key: DEFAULT_TENANT_PRINCIPAL_KEY.to_owned(),
            ids: vec![id.into()],
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Principal::Anyone => json!("*"),
            Principal::Tenants { key, ids } => {
                let mut principal = serde_json::Map::new();
                principal.insert(key.clone(), json!(ids));
                Value::Object(principal)
            }
        }
    }
}

/// A single policy statement. The resource defaults to every object of the bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    effect: Effect,
    principal: Principal,
    actions: Vec<String>,
    resources: Option<Vec<String>>,
}

impl Statement {
    /// A statement for the given effect, principal and actions (e.g. `s3:GetObject`).
    pub fn new<I, A>(effect: Effect, principal: Principal, actions: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        Statement {
            effect,
            principal,
            actions: actions.into_iter().map(Into::into).collect(),
            resources: None,
        }
    }

    /// Explicit resource ARNs or paths instead of `<bucket>/*`.
    pub fn resources<I, R>(mut self, resources: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<String>,
    {
        self.resources = Some(resources.into_iter().map(Into::into).collect());
        self
    }

    fn to_json(&self, bucket: &str) -> Value {
        let resource = match &self.resources {
            Some(resources) => json!(resources),
            None => json!(format!("{bucket}/*")),
        };
        json!({
            "Effect": self.effect,
            "Principal": self.principal.to_json(),
            "Action": self.actions,
            "Resource": resource,
        })
    }
}

/// Build a fresh policy document for `bucket` out of `statements`.
///
/// Every call returns a new document; nothing is shared between callers.
pub fn policy_document(bucket: &str, statements: &[Statement]) -> Value {
    json!({
        "Version": POLICY_VERSION,
        "Statement": statements.iter().map(|s| s.to_json(bucket)).collect::<Vec<_>>(),
    })
}

/// A policy allowing every action to everyone. Used to unlock a bucket before deleting its
/// policy.
pub fn allow_all(bucket: &str) -> Value {
    policy_document(
        bucket,
        &[Statement::new(Effect::Allow, Principal::Anyone, ["s3:*"])
            .resources([bucket.to_owned(), format!("{bucket}/*")])],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tenant_deny_document() {
        let doc = policy_document(
            "my-bucket",
            &[Statement::new(
                Effect::Deny,
                Principal::tenant("tenant-id"),
                ["s3:GetObject"],
            )],
        );

        assert_eq!(
            json!({
                "Version": "2012-10-17",
                "Statement": [{
                    "Effect": "Deny",
                    "Principal": { "MGC": ["tenant-id"] },
                    "Action": ["s3:GetObject"],
                    "Resource": "my-bucket/*",
                }]
            }),
            doc
        );
    }

    #[test]
    fn test_documents_are_independent() {
        let mut first = allow_all("a");
        let second = allow_all("a");
        first["Statement"][0]["Effect"] = json!("Deny");
        assert_eq!("Allow", second["Statement"][0]["Effect"]);
        assert_eq!(json!("*"), second["Statement"][0]["Principal"]);
    }
}
