use serde::{Deserialize, Serialize};

use procureflow_auth::Role;
use procureflow_core::{DomainError, DomainResult};

/// Kind of document routed through the matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    QuoteApproval,
    PurchaseRequisition,
}

/// One row of the matrix: an amount band for a document type (optionally a
/// single department) and the ordered approver roles for that band.
///
/// The band is `[min_amount_minor, max_amount_minor)`; a missing max is
/// unbounded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixRule {
    pub document_type: DocumentType,
    #[serde(default)]
    pub department: Option<String>,
    pub min_amount_minor: u64,
    #[serde(default)]
    pub max_amount_minor: Option<u64>,
    pub levels: Vec<Role>,
}

impl MatrixRule {
    fn contains(&self, amount_minor: u64) -> bool {
        amount_minor >= self.min_amount_minor
            && self.max_amount_minor.is_none_or(|max| amount_minor < max)
    }

    fn department_matches(&self, department: Option<&str>) -> bool {
        match (&self.department, department) {
            (Some(rule), Some(dept)) => rule.trim().eq_ignore_ascii_case(dept.trim()),
            _ => false,
        }
    }

    fn overlaps(&self, other: &MatrixRule) -> bool {
        let self_max = self.max_amount_minor.unwrap_or(u64::MAX);
        let other_max = other.max_amount_minor.unwrap_or(u64::MAX);
        self.min_amount_minor < other_max && other.min_amount_minor < self_max
    }

    fn same_scope(&self, other: &MatrixRule) -> bool {
        let dept = |r: &MatrixRule| r.department.as_ref().map(|d| d.trim().to_ascii_lowercase());
        self.document_type == other.document_type && dept(self) == dept(other)
    }
}

/// Authorization matrix: ordered list of rules, resolved by linear lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationMatrix {
    pub rules: Vec<MatrixRule>,
}

impl Default for AuthorizationMatrix {
    fn default() -> Self {
        use DocumentType::*;

        let rule = |document_type, min, max, levels: &[Role]| MatrixRule {
            document_type,
            department: None,
            min_amount_minor: min,
            max_amount_minor: max,
            levels: levels.to_vec(),
        };

        Self {
            rules: vec![
                rule(PurchaseRequisition, 0, Some(1_000_000), &[Role::PROCUREMENT_MANAGER]),
                rule(
                    PurchaseRequisition,
                    1_000_000,
                    Some(10_000_000),
                    &[Role::PROCUREMENT_MANAGER, Role::FINANCE_MANAGER],
                ),
                rule(
                    PurchaseRequisition,
                    10_000_000,
                    None,
                    &[Role::PROCUREMENT_MANAGER, Role::FINANCE_MANAGER, Role::DIRECTOR],
                ),
                rule(QuoteApproval, 0, Some(5_000_000), &[Role::PROCUREMENT_MANAGER]),
                rule(QuoteApproval, 5_000_000, None, &[Role::PROCUREMENT_MANAGER, Role::DIRECTOR]),
            ],
        }
    }
}

impl AuthorizationMatrix {
    pub fn new(rules: Vec<MatrixRule>) -> DomainResult<Self> {
        let matrix = Self { rules };
        matrix.validate()?;
        Ok(matrix)
    }

    /// Check structural rules: non-empty levels, sane bands, no overlapping
    /// bands within the same (document type, department) scope.
    pub fn validate(&self) -> DomainResult<()> {
        for (idx, rule) in self.rules.iter().enumerate() {
            if rule.levels.is_empty() {
                return Err(DomainError::validation(format!(
                    "matrix rule {idx} has no approval levels"
                )));
            }
            if let Some(max) = rule.max_amount_minor {
                if max <= rule.min_amount_minor {
                    return Err(DomainError::validation(format!(
                        "matrix rule {idx} has an empty amount band"
                    )));
                }
            }
            if rule.department.as_deref().is_some_and(|d| d.trim().is_empty()) {
                return Err(DomainError::validation(format!(
                    "matrix rule {idx} has a blank department"
                )));
            }
            for (other_idx, other) in self.rules.iter().enumerate().skip(idx + 1) {
                if rule.same_scope(other) && rule.overlaps(other) {
                    return Err(DomainError::validation(format!(
                        "matrix rules {idx} and {other_idx} have overlapping amount bands"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Resolve the approver roles for a document.
    ///
    /// Department-specific rules are consulted first, then department-less
    /// rules; within each pass the first rule whose band contains the amount
    /// wins.
    pub fn resolve(
        &self,
        document_type: DocumentType,
        department: Option<&str>,
        amount_minor: u64,
    ) -> DomainResult<Vec<Role>> {
        let candidates = || {
            self.rules
                .iter()
                .filter(move |r| r.document_type == document_type && r.contains(amount_minor))
        };

        candidates()
            .find(|r| r.department_matches(department))
            .or_else(|| candidates().find(|r| r.department.is_none()))
            .map(|r| r.levels.clone())
            .ok_or_else(|| {
                DomainError::validation(format!(
                    "no approval route for {document_type:?} of {amount_minor} (department: {})",
                    department.unwrap_or("-")
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn default_matrix_is_valid() {
        AuthorizationMatrix::default().validate().unwrap();
    }

    #[test]
    fn band_edges_are_half_open() {
        let m = AuthorizationMatrix::default();
        let pr = DocumentType::PurchaseRequisition;
        assert_eq!(m.resolve(pr, None, 999_999).unwrap().len(), 1);
        assert_eq!(m.resolve(pr, None, 1_000_000).unwrap().len(), 2);
        assert_eq!(m.resolve(pr, None, 10_000_000).unwrap().len(), 3);
    }

    #[test]
    fn department_specific_rule_wins() {
        let mut m = AuthorizationMatrix::default();
        m.rules.push(MatrixRule {
            document_type: DocumentType::PurchaseRequisition,
            department: Some("Maintenance".to_string()),
            min_amount_minor: 0,
            max_amount_minor: None,
            levels: vec![Role::DIRECTOR],
        });
        m.validate().unwrap();

        let levels = m
            .resolve(DocumentType::PurchaseRequisition, Some("maintenance"), 10)
            .unwrap();
        assert_eq!(levels, vec![Role::DIRECTOR]);

        let levels = m
            .resolve(DocumentType::PurchaseRequisition, Some("IT"), 10)
            .unwrap();
        assert_eq!(levels, vec![Role::PROCUREMENT_MANAGER]);
    }

    #[test]
    fn missing_route_is_a_validation_error() {
        let m = AuthorizationMatrix::new(vec![MatrixRule {
            document_type: DocumentType::QuoteApproval,
            department: None,
            min_amount_minor: 100,
            max_amount_minor: None,
            levels: vec![Role::DIRECTOR],
        }])
        .unwrap();

        let err = m.resolve(DocumentType::QuoteApproval, None, 50).unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("no approval route")));
        assert!(m.resolve(DocumentType::PurchaseRequisition, None, 500).is_err());
    }

    #[test]
    fn overlapping_bands_are_rejected() {
        let overlapping = vec![
            MatrixRule {
                document_type: DocumentType::QuoteApproval,
                department: None,
                min_amount_minor: 0,
                max_amount_minor: Some(100),
                levels: vec![Role::BUYER],
            },
            MatrixRule {
                document_type: DocumentType::QuoteApproval,
                department: None,
                min_amount_minor: 50,
                max_amount_minor: None,
                levels: vec![Role::DIRECTOR],
            },
        ];
        assert!(AuthorizationMatrix::new(overlapping).is_err());
    }

    #[test]
    fn empty_levels_and_empty_bands_are_rejected() {
        let no_levels = MatrixRule {
            document_type: DocumentType::QuoteApproval,
            department: None,
            min_amount_minor: 0,
            max_amount_minor: None,
            levels: vec![],
        };
        assert!(AuthorizationMatrix::new(vec![no_levels]).is_err());

        let empty_band = MatrixRule {
            document_type: DocumentType::QuoteApproval,
            department: None,
            min_amount_minor: 10,
            max_amount_minor: Some(10),
            levels: vec![Role::BUYER],
        };
        assert!(AuthorizationMatrix::new(vec![empty_band]).is_err());
    }

    #[test]
    fn matrix_round_trips_through_json_config() {
        let json = r#"{
            "rules": [
                { "document_type": "purchase_requisition", "min_amount_minor": 0,
                  "levels": ["procurement_manager"] }
            ]
        }"#;
        let m: AuthorizationMatrix = serde_json::from_str(json).unwrap();
        m.validate().unwrap();
        assert_eq!(m.rules[0].max_amount_minor, None);
        assert_eq!(m.rules[0].department, None);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256, .. ProptestConfig::default()
        })]

        #[test]
        fn default_matrix_routes_every_amount(amount in any::<u64>()) {
            let m = AuthorizationMatrix::default();
            for doc in [DocumentType::PurchaseRequisition, DocumentType::QuoteApproval] {
                let levels = m.resolve(doc, None, amount).unwrap();
                prop_assert!(!levels.is_empty());
                prop_assert_eq!(&levels[0], &Role::PROCUREMENT_MANAGER);
            }
        }

        #[test]
        fn larger_amounts_never_need_fewer_levels(a in any::<u64>(), b in any::<u64>()) {
            let m = AuthorizationMatrix::default();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let doc = DocumentType::PurchaseRequisition;
            prop_assert!(m.resolve(doc, None, lo).unwrap().len() <= m.resolve(doc, None, hi).unwrap().len());
        }
    }
}
