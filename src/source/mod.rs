//! Registry snapshot supplied by the data source.
//!
//! Records are parsed and validated here, once. Everything downstream trusts
//! the snapshot and never re-validates.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

/// Actor that verified a verified attribute.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verifier {
    pub id: String,
    pub verification_date: DateTime<Utc>,
    #[serde(default)]
    pub expiration_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub extension_date: Option<DateTime<Utc>>,
}

/// Actor that revoked a verified attribute.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Revoker {
    pub id: String,
    pub verification_date: DateTime<Utc>,
    pub revocation_date: DateTime<Utc>,
    #[serde(default)]
    pub expiration_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub extension_date: Option<DateTime<Utc>>,
}

/// Attribute held by a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type")]
pub enum TenantAttribute {
    #[serde(rename = "PersistentCertifiedAttribute", rename_all = "camelCase")]
    Certified {
        id: String,
        assignment_timestamp: DateTime<Utc>,
        #[serde(default)]
        revocation_timestamp: Option<DateTime<Utc>>,
    },
    #[serde(rename = "PersistentDeclaredAttribute", rename_all = "camelCase")]
    Declared {
        id: String,
        assignment_timestamp: DateTime<Utc>,
        #[serde(default)]
        revocation_timestamp: Option<DateTime<Utc>>,
    },
    #[serde(rename = "PersistentVerifiedAttribute", rename_all = "camelCase")]
    Verified {
        id: String,
        assignment_timestamp: DateTime<Utc>,
        #[serde(default)]
        verified_by: Vec<Verifier>,
        #[serde(default)]
        revoked_by: Vec<Revoker>,
    },
}

impl TenantAttribute {
    pub fn id(&self) -> &str {
        match self {
            Self::Certified { id, .. } | Self::Declared { id, .. } | Self::Verified { id, .. } => {
                id
            }
        }
    }

    pub fn assigned_at(&self) -> DateTime<Utc> {
        match self {
            Self::Certified {
                assignment_timestamp,
                ..
            }
            | Self::Declared {
                assignment_timestamp,
                ..
            }
            | Self::Verified {
                assignment_timestamp,
                ..
            } => *assignment_timestamp,
        }
    }

    /// Latest revocation, if any.
    pub fn revoked_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Certified {
                revocation_timestamp,
                ..
            }
            | Self::Declared {
                revocation_timestamp,
                ..
            } => *revocation_timestamp,
            Self::Verified { revoked_by, .. } => revoked_by.iter().map(|r| r.revocation_date).max(),
        }
    }

    fn validate(&self) -> Result<()> {
        if let Some(revoked_at) = self.revoked_at() {
            if revoked_at < self.assigned_at() {
                bail!("attribute {} revoked before it was assigned", self.id());
            }
        }

        if let Self::Verified {
            verified_by,
            revoked_by,
            ..
        } = self
        {
            let ordered = verified_by
                .windows(2)
                .all(|pair| pair[0].verification_date <= pair[1].verification_date);
            if !ordered {
                bail!("attribute {} has verifier history out of order", self.id());
            }

            let ordered = revoked_by
                .windows(2)
                .all(|pair| pair[0].revocation_date <= pair[1].revocation_date);
            if !ordered {
                bail!("attribute {} has revoker history out of order", self.id());
            }
        }

        Ok(())
    }
}

/// Organizational tenant of the registry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    pub id: String,
    pub name: String,
    /// IPA category code, absent for organizations outside the IPA index.
    #[serde(default)]
    pub category_code: Option<String>,
    #[serde(default)]
    pub attributes: Vec<TenantAttribute>,
    #[serde(default)]
    pub onboarded_at: Option<DateTime<Utc>>,
}

/// E-service offered by a producer tenant.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EService {
    pub id: String,
    pub name: String,
    pub producer_id: String,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

/// Active subscription of a consumer to an e-service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agreement {
    pub id: String,
    pub eservice_id: String,
    pub consumer_id: String,
    pub producer_id: String,
    pub activated_at: DateTime<Utc>,
}

/// In-memory registry records a report is computed from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrySnapshot {
    #[serde(default)]
    pub tenants: Vec<Tenant>,
    #[serde(default)]
    pub eservices: Vec<EService>,
    #[serde(default)]
    pub agreements: Vec<Agreement>,
}

impl RegistrySnapshot {
    /// Check cross-record consistency.
    pub fn validate(&self) -> Result<()> {
        let mut tenant_ids = HashSet::with_capacity(self.tenants.len());
        for tenant in &self.tenants {
            if !tenant_ids.insert(tenant.id.as_str()) {
                bail!("duplicate tenant id {}", tenant.id);
            }
            for attribute in &tenant.attributes {
                attribute
                    .validate()
                    .with_context(|| format!("tenant {}", tenant.id))?;
            }
        }

        let mut eservice_ids = HashSet::with_capacity(self.eservices.len());
        for eservice in &self.eservices {
            if !eservice_ids.insert(eservice.id.as_str()) {
                bail!("duplicate eservice id {}", eservice.id);
            }
        }

        for agreement in &self.agreements {
            if !eservice_ids.contains(agreement.eservice_id.as_str()) {
                bail!(
                    "agreement {} references unknown eservice {}",
                    agreement.id,
                    agreement.eservice_id
                );
            }
        }

        Ok(())
    }
}

/// Parse and validate a JSON snapshot.
pub fn parse_snapshot(data: &str) -> Result<RegistrySnapshot> {
    let snapshot: RegistrySnapshot =
        serde_json::from_str(data).context("decoding registry snapshot")?;
    snapshot.validate().context("validating registry snapshot")?;
    Ok(snapshot)
}

/// Load a JSON snapshot from disk.
pub fn load_snapshot(path: &Path) -> Result<RegistrySnapshot> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("reading snapshot file {}", path.display()))?;

    let snapshot =
        parse_snapshot(&data).with_context(|| format!("loading snapshot {}", path.display()))?;

    info!(
        tenants = snapshot.tenants.len(),
        eservices = snapshot.eservices.len(),
        agreements = snapshot.agreements.len(),
        "registry snapshot loaded",
    );

    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const SNAPSHOT: &str = r#"{
        "tenants": [
            {
                "id": "t1",
                "name": "Comune di Roma",
                "categoryCode": "L6",
                "onboardedAt": "2024-01-10T08:00:00Z",
                "attributes": [
                    {
                        "type": "PersistentCertifiedAttribute",
                        "id": "a1",
                        "assignmentTimestamp": "2023-05-01T00:00:00Z"
                    },
                    {
                        "type": "PersistentVerifiedAttribute",
                        "id": "a2",
                        "assignmentTimestamp": "2023-05-01T00:00:00Z",
                        "verifiedBy": [
                            {"id": "v1", "verificationDate": "2023-05-02T00:00:00Z"}
                        ],
                        "revokedBy": [
                            {
                                "id": "v1",
                                "verificationDate": "2023-05-02T00:00:00Z",
                                "revocationDate": "2023-09-01T00:00:00Z"
                            }
                        ]
                    }
                ]
            },
            {"id": "t2", "name": "Fornitore Privato"}
        ],
        "eservices": [
            {"id": "e1", "name": "Anagrafe", "producerId": "t1", "publishedAt": "2024-02-01T00:00:00Z"}
        ],
        "agreements": [
            {"id": "ag1", "eserviceId": "e1", "consumerId": "t2", "producerId": "t1", "activatedAt": "2024-03-01T00:00:00Z"}
        ]
    }"#;

    #[test]
    fn test_parse_snapshot() {
        let snapshot = parse_snapshot(SNAPSHOT).expect("valid snapshot");
        assert_eq!(snapshot.tenants.len(), 2);
        assert!(snapshot.tenants[0].onboarded_at.is_some());
        assert!(snapshot.tenants[1].onboarded_at.is_none());
        assert_eq!(snapshot.tenants[1].category_code, None);

        let attributes = &snapshot.tenants[0].attributes;
        assert!(matches!(attributes[0], TenantAttribute::Certified { .. }));
        assert_eq!(attributes[0].revoked_at(), None);
        assert!(matches!(attributes[1], TenantAttribute::Verified { .. }));
        assert_eq!(
            attributes[1].revoked_at().map(|at| at.to_rfc3339()),
            Some("2023-09-01T00:00:00+00:00".to_string())
        );
    }

    #[test]
    fn test_rejects_unknown_attribute_type() {
        let data = r#"{"tenants": [{"id": "t", "name": "n", "attributes": [
            {"type": "PersistentMagicAttribute", "id": "a", "assignmentTimestamp": "2023-05-01T00:00:00Z"}
        ]}]}"#;
        let err = parse_snapshot(data).unwrap_err();
        assert!(format!("{err:#}").contains("decoding registry snapshot"));
    }

    #[test]
    fn test_rejects_revocation_before_assignment() {
        let data = r#"{"tenants": [{"id": "t9", "name": "n", "attributes": [
            {
                "type": "PersistentDeclaredAttribute",
                "id": "a",
                "assignmentTimestamp": "2023-05-01T00:00:00Z",
                "revocationTimestamp": "2023-04-01T00:00:00Z"
            }
        ]}]}"#;
        let err = parse_snapshot(data).unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("tenant t9"), "{msg}");
        assert!(msg.contains("revoked before it was assigned"), "{msg}");
    }

    #[test]
    fn test_rejects_unordered_verifier_history() {
        let data = r#"{"tenants": [{"id": "t", "name": "n", "attributes": [
            {
                "type": "PersistentVerifiedAttribute",
                "id": "a",
                "assignmentTimestamp": "2023-05-01T00:00:00Z",
                "verifiedBy": [
                    {"id": "v1", "verificationDate": "2023-07-01T00:00:00Z"},
                    {"id": "v2", "verificationDate": "2023-06-01T00:00:00Z"}
                ]
            }
        ]}]}"#;
        let err = parse_snapshot(data).unwrap_err();
        assert!(format!("{err:#}").contains("verifier history out of order"));
    }

    #[test]
    fn test_rejects_dangling_agreement() {
        let data = r#"{
            "eservices": [],
            "agreements": [
                {"id": "ag", "eserviceId": "missing", "consumerId": "c", "producerId": "p", "activatedAt": "2024-03-01T00:00:00Z"}
            ]
        }"#;
        let err = parse_snapshot(data).unwrap_err();
        assert!(format!("{err:#}").contains("unknown eservice missing"));
    }

    #[test]
    fn test_rejects_duplicate_tenant() {
        let data = r#"{"tenants": [{"id": "t", "name": "a"}, {"id": "t", "name": "b"}]}"#;
        let err = parse_snapshot(data).unwrap_err();
        assert!(format!("{err:#}").contains("duplicate tenant id t"));
    }

    #[test]
    fn test_load_snapshot_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        file.write_all(SNAPSHOT.as_bytes()).expect("write");

        let snapshot = load_snapshot(file.path()).expect("load");
        assert_eq!(snapshot.eservices[0].name, "Anagrafe");
        assert_eq!(snapshot.agreements[0].consumer_id, "t2");
    }

    #[test]
    fn test_load_snapshot_missing_file() {
        let err = load_snapshot(Path::new("/nonexistent/snapshot.json")).unwrap_err();
        assert!(err.to_string().contains("reading snapshot file"));
    }
}
