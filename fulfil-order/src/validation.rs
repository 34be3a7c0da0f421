//! Payment evidence validation.
//!
//! Declared amounts are reconciled against the order total within a
//! tolerance; every failure is a typed [`PaymentRejection`] carrying the
//! computed delta so the caller can show exactly what is missing.

use fulfil_core::{CreditProfileLookup, CreditStatus};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::methods::PaymentMethod;
use crate::models::{Money, Order};
use crate::records::{present_evidence, EvidenceRef};

/// Allowed rounding deviation: `min(max(floor, total * bp / 10_000), cap)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToleranceRule {
    pub floor: Money,
    pub basis_points: Money,
    pub cap: Money,
}

impl ToleranceRule {
    pub fn tolerance(&self, total: Money) -> Money {
        let proportional = total.abs().saturating_mul(self.basis_points) / 10_000;
        proportional.max(self.floor).min(self.cap)
    }

    /// Ok when `received` is within tolerance of `expected`.
    pub fn reconcile(&self, expected: Money, received: Money) -> Result<Money, PaymentRejection> {
        let tolerance = self.tolerance(expected);
        let difference = received - expected;

        if difference.abs() <= tolerance {
            return Ok(difference);
        }

        let delta = difference.abs();
        if difference < 0 {
            Err(PaymentRejection::InsufficientPayment {
                expected,
                received,
                delta,
                tolerance,
            })
        } else {
            Err(PaymentRejection::ExcessPayment {
                expected,
                received,
                delta,
                tolerance,
            })
        }
    }
}

impl Default for ToleranceRule {
    fn default() -> Self {
        Self {
            floor: 200,
            basis_points: 50,
            cap: 5_000,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentLeg {
    Transfer,
    Cash,
}

impl fmt::Display for PaymentLeg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentLeg::Transfer => f.write_str("transfer"),
            PaymentLeg::Cash => f.write_str("cash"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaymentRejection {
    #[error("Insufficient payment: expected {expected}, received {received} (short by {delta}, tolerance {tolerance})")]
    InsufficientPayment {
        expected: Money,
        received: Money,
        delta: Money,
        tolerance: Money,
    },

    #[error("Excess payment: expected {expected}, received {received} (over by {delta}, tolerance {tolerance})")]
    ExcessPayment {
        expected: Money,
        received: Money,
        delta: Money,
        tolerance: Money,
    },

    #[error("Missing evidence for the {leg} leg")]
    MissingEvidence { leg: PaymentLeg },

    #[error("Missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("{field} must be positive, got {amount}")]
    NonPositiveAmount { field: &'static str, amount: Money },

    #[error("Payment method {method} cannot be validated as a {payment_type} payment")]
    UnsupportedMethod {
        method: String,
        payment_type: &'static str,
    },
}

impl PaymentRejection {
    pub fn code(&self) -> &'static str {
        match self {
            PaymentRejection::InsufficientPayment { .. } => "insufficient_payment",
            PaymentRejection::ExcessPayment { .. } => "excess_payment",
            PaymentRejection::MissingEvidence { .. } => "missing_evidence",
            PaymentRejection::MissingField { .. } => "missing_field",
            PaymentRejection::NonPositiveAmount { .. } => "non_positive_amount",
            PaymentRejection::UnsupportedMethod { .. } => "unsupported_method",
        }
    }
}

/// What a wallet reviewer submits as proof of payment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "payment_type", rename_all = "snake_case")]
pub enum PaymentSubmission {
    /// One transfer or electronic payment.
    Single {
        #[serde(default)]
        method: Option<PaymentMethod>,
        #[serde(default)]
        declared_amount: Option<Money>,
        #[serde(default)]
        evidence: Vec<EvidenceRef>,
    },
    /// Part transfer, part cash.
    Mixed {
        #[serde(default)]
        transferred_amount: Option<Money>,
        #[serde(default)]
        cash_amount: Option<Money>,
        #[serde(default)]
        cash_collected_by_messenger: bool,
        #[serde(default)]
        transfer_evidence: Vec<EvidenceRef>,
        #[serde(default)]
        cash_evidence: Vec<EvidenceRef>,
    },
    Cash {
        #[serde(default)]
        declared_amount: Option<Money>,
        #[serde(default)]
        evidence: Vec<EvidenceRef>,
    },
    Credit,
}

impl PaymentSubmission {
    pub fn payment_type(&self) -> &'static str {
        match self {
            PaymentSubmission::Single { .. } => "single",
            PaymentSubmission::Mixed { .. } => "mixed",
            PaymentSubmission::Cash { .. } => "cash",
            PaymentSubmission::Credit => "credit",
        }
    }
}

/// Non-blocking findings left to the reviewer's judgement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationWarning {
    NoCustomer,
    CreditProfileMissing { customer_id: String },
    CreditProfileInactive { customer_id: String, status: CreditStatus },
    InsufficientCredit { available: Money, required: Money },
    CreditLookupFailed { cause: String },
    ManualCashOverridden { manual: Money, derived: Money },
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationWarning::NoCustomer => write!(f, "order has no customer; credit not checked"),
            ValidationWarning::CreditProfileMissing { customer_id } => {
                write!(f, "no credit profile for customer {}", customer_id)
            }
            ValidationWarning::CreditProfileInactive { customer_id, status } => {
                write!(f, "credit profile for {} is {:?}", customer_id, status)
            }
            ValidationWarning::InsufficientCredit { available, required } => {
                write!(f, "available credit {} below order total {}", available, required)
            }
            ValidationWarning::CreditLookupFailed { cause } => write!(f, "credit lookup failed: {}", cause),
            ValidationWarning::ManualCashOverridden { manual, derived } => {
                write!(f, "manual cash {} replaced by derived {}", manual, derived)
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationReport {
    pub payment_type: String,
    pub expected: Money,
    pub accepted_amount: Money,
    /// received - expected; zero for credit
    pub difference: Money,
    pub tolerance: Money,
    pub cash_amount: Option<Money>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationReport {
    fn new(submission: &PaymentSubmission, expected: Money, tolerance: Money) -> Self {
        Self {
            payment_type: submission.payment_type().to_string(),
            expected,
            accepted_amount: expected,
            difference: 0,
            tolerance,
            cash_amount: None,
            warnings: Vec::new(),
        }
    }
}

pub struct PaymentValidationEngine {
    tolerance: ToleranceRule,
    credit: Arc<dyn CreditProfileLookup>,
}

impl PaymentValidationEngine {
    pub fn new(tolerance: ToleranceRule, credit: Arc<dyn CreditProfileLookup>) -> Self {
        Self { tolerance, credit }
    }

    pub fn tolerance_rule(&self) -> ToleranceRule {
        self.tolerance
    }

    /// Validate a submission for an order. Credit findings are returned as
    /// warnings, never as rejections.
    pub async fn validate(
        &self,
        order: &Order,
        submission: &PaymentSubmission,
    ) -> Result<ValidationReport, PaymentRejection> {
        let fallback = order.payment_method.as_ref();
        let mut report = self.check_amounts(order.total_amount, submission, fallback)?;

        if matches!(submission, PaymentSubmission::Credit) {
            report.warnings.extend(self.credit_warnings(order).await);
        }

        if !report.warnings.is_empty() {
            tracing::warn!(
                "Payment for order {} validated with {} warning(s)",
                order.order_number,
                report.warnings.len()
            );
        }
        Ok(report)
    }

    /// Amount and evidence rules only; no collaborator calls.
    pub fn check_amounts(
        &self,
        total: Money,
        submission: &PaymentSubmission,
        order_method: Option<&PaymentMethod>,
    ) -> Result<ValidationReport, PaymentRejection> {
        let tolerance = self.tolerance.tolerance(total);
        let mut report = ValidationReport::new(submission, total, tolerance);

        match submission {
            PaymentSubmission::Single {
                method,
                declared_amount,
                evidence,
            } => {
                let method = method.as_ref().or(order_method);
                if let Some(m) = method {
                    if m.is_credit() || m.is_no_charge() {
                        return Err(PaymentRejection::UnsupportedMethod {
                            method: m.to_string(),
                            payment_type: "single",
                        });
                    }
                }

                let declared = declared_amount.ok_or(PaymentRejection::MissingField {
                    field: "declared_amount",
                })?;
                ensure_positive("declared_amount", declared)?;

                let leg = if method.is_some_and(PaymentMethod::is_cash_like) {
                    PaymentLeg::Cash
                } else {
                    PaymentLeg::Transfer
                };
                ensure_evidence(leg, evidence)?;

                report.difference = self.tolerance.reconcile(total, declared)?;
                report.accepted_amount = declared;
                if leg == PaymentLeg::Cash {
                    report.cash_amount = Some(declared);
                }
            }

            PaymentSubmission::Mixed {
                transferred_amount,
                cash_amount,
                cash_collected_by_messenger,
                transfer_evidence,
                cash_evidence: _,
            } => {
                let transferred = transferred_amount.ok_or(PaymentRejection::MissingField {
                    field: "transferred_amount",
                })?;
                ensure_positive("transferred_amount", transferred)?;

                let cash = if *cash_collected_by_messenger {
                    let derived = total - transferred;
                    if let Some(manual) = cash_amount.filter(|manual| *manual != derived) {
                        report
                            .warnings
                            .push(ValidationWarning::ManualCashOverridden { manual, derived });
                    }
                    derived
                } else {
                    cash_amount.ok_or(PaymentRejection::MissingField { field: "cash_amount" })?
                };
                ensure_positive("cash_amount", cash)?;
                ensure_evidence(PaymentLeg::Transfer, transfer_evidence)?;

                // both legs come from the request; an overflowing sum is never a valid payment
                let received = transferred.checked_add(cash).ok_or(PaymentRejection::ExcessPayment {
                    expected: total,
                    received: Money::MAX,
                    delta: Money::MAX - total,
                    tolerance,
                })?;
                report.difference = self.tolerance.reconcile(total, received)?;
                report.accepted_amount = received;
                report.cash_amount = Some(cash);
            }

            PaymentSubmission::Cash {
                declared_amount,
                evidence,
            } => {
                ensure_evidence(PaymentLeg::Cash, evidence)?;
                if let Some(declared) = *declared_amount {
                    ensure_positive("declared_amount", declared)?;
                    report.difference = self.tolerance.reconcile(total, declared)?;
                    report.accepted_amount = declared;
                }
                report.cash_amount = Some(report.accepted_amount);
            }

            PaymentSubmission::Credit => {
                if !order_method.is_some_and(PaymentMethod::is_credit) {
                    return Err(PaymentRejection::UnsupportedMethod {
                        method: order_method.map_or_else(|| "unclassified".to_string(), ToString::to_string),
                        payment_type: "credit",
                    });
                }
            }
        }

        Ok(report)
    }

    async fn credit_warnings(&self, order: &Order) -> Vec<ValidationWarning> {
        let Some(customer_id) = order.customer_id.as_deref() else {
            return vec![ValidationWarning::NoCustomer];
        };

        match self.credit.find(customer_id).await {
            Ok(None) => vec![ValidationWarning::CreditProfileMissing {
                customer_id: customer_id.to_string(),
            }],
            Ok(Some(profile)) => {
                let mut warnings = Vec::new();
                if !profile.is_active() {
                    warnings.push(ValidationWarning::CreditProfileInactive {
                        customer_id: customer_id.to_string(),
                        status: profile.status,
                    });
                }
                if !profile.covers(order.total_amount) {
                    warnings.push(ValidationWarning::InsufficientCredit {
                        available: profile.available_credit,
                        required: order.total_amount,
                    });
                }
                warnings
            }
            Err(e) => {
                tracing::error!("Credit lookup failed for customer {}: {}", customer_id, e);
                vec![ValidationWarning::CreditLookupFailed { cause: e.to_string() }]
            }
        }
    }
}

fn ensure_positive(field: &'static str, amount: Money) -> Result<(), PaymentRejection> {
    if amount > 0 {
        Ok(())
    } else {
        Err(PaymentRejection::NonPositiveAmount { field, amount })
    }
}

fn ensure_evidence(leg: PaymentLeg, evidence: &[EvidenceRef]) -> Result<(), PaymentRejection> {
    if present_evidence(evidence) > 0 {
        Ok(())
    } else {
        Err(PaymentRejection::MissingEvidence { leg })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewOrder;
    use fulfil_core::credit::StaticCreditLookup;
    use fulfil_core::CreditProfile;

    fn engine() -> PaymentValidationEngine {
        PaymentValidationEngine::new(ToleranceRule::default(), Arc::new(StaticCreditLookup::new()))
    }

    fn proof() -> Vec<EvidenceRef> {
        vec![EvidenceRef::new("uploads/comprobante.jpg")]
    }

    fn single(amount: Money) -> PaymentSubmission {
        PaymentSubmission::Single {
            method: Some(PaymentMethod::Transferencia),
            declared_amount: Some(amount),
            evidence: proof(),
        }
    }

    #[test]
    fn test_tolerance_floor_proportional_and_cap() {
        let rule = ToleranceRule::default();
        assert_eq!(rule.tolerance(10_000), 200);
        assert_eq!(rule.tolerance(100_000), 500);
        assert_eq!(rule.tolerance(2_000_000), 5_000);
        assert_eq!(rule.tolerance(0), 200);
    }

    #[test]
    fn test_single_transfer_requires_evidence() {
        let submission = PaymentSubmission::Single {
            method: Some(PaymentMethod::Transferencia),
            declared_amount: Some(100_000),
            evidence: vec![EvidenceRef::new(" ")],
        };
        let err = engine().check_amounts(100_000, &submission, None).unwrap_err();
        assert_eq!(err, PaymentRejection::MissingEvidence { leg: PaymentLeg::Transfer });
    }

    #[test]
    fn test_single_missing_amount() {
        let submission = PaymentSubmission::Single {
            method: None,
            declared_amount: None,
            evidence: proof(),
        };
        let err = engine().check_amounts(50_000, &submission, None).unwrap_err();
        assert_eq!(err.code(), "missing_field");
    }

    #[test]
    fn test_single_excess_payment_is_signed() {
        let err = engine().check_amounts(100_000, &single(100_501), None).unwrap_err();
        assert_eq!(
            err,
            PaymentRejection::ExcessPayment {
                expected: 100_000,
                received: 100_501,
                delta: 501,
                tolerance: 500,
            }
        );
    }

    #[test]
    fn test_single_rejects_credit_method() {
        let submission = PaymentSubmission::Single {
            method: None,
            declared_amount: Some(1_000),
            evidence: proof(),
        };
        let err = engine()
            .check_amounts(1_000, &submission, Some(&PaymentMethod::Credito))
            .unwrap_err();
        assert_eq!(err.code(), "unsupported_method");
    }

    #[test]
    fn test_mixed_auto_derived_cash_wins() {
        let submission = PaymentSubmission::Mixed {
            transferred_amount: Some(70_000),
            cash_amount: Some(10_000),
            cash_collected_by_messenger: true,
            transfer_evidence: proof(),
            cash_evidence: vec![],
        };
        let report = engine().check_amounts(100_000, &submission, None).unwrap();
        assert_eq!(report.cash_amount, Some(30_000));
        assert_eq!(report.accepted_amount, 100_000);
        assert_eq!(
            report.warnings,
            vec![ValidationWarning::ManualCashOverridden {
                manual: 10_000,
                derived: 30_000
            }]
        );
    }

    #[test]
    fn test_mixed_legs_must_be_positive() {
        let submission = PaymentSubmission::Mixed {
            transferred_amount: Some(100_000),
            cash_amount: None,
            cash_collected_by_messenger: true,
            transfer_evidence: proof(),
            cash_evidence: vec![],
        };
        let err = engine().check_amounts(100_000, &submission, None).unwrap_err();
        assert_eq!(
            err,
            PaymentRejection::NonPositiveAmount {
                field: "cash_amount",
                amount: 0
            }
        );
    }

    #[test]
    fn test_mixed_cash_evidence_optional() {
        let submission = PaymentSubmission::Mixed {
            transferred_amount: Some(60_000),
            cash_amount: Some(40_000),
            cash_collected_by_messenger: false,
            transfer_evidence: proof(),
            cash_evidence: vec![],
        };
        assert!(engine().check_amounts(100_000, &submission, None).is_ok());
    }

    #[test]
    fn test_mixed_overflowing_legs_are_excess() {
        let submission = PaymentSubmission::Mixed {
            transferred_amount: Some(Money::MAX),
            cash_amount: Some(Money::MAX),
            cash_collected_by_messenger: false,
            transfer_evidence: proof(),
            cash_evidence: vec![],
        };
        let err = engine().check_amounts(100_000, &submission, None).unwrap_err();
        assert_eq!(
            err,
            PaymentRejection::ExcessPayment {
                expected: 100_000,
                received: Money::MAX,
                delta: Money::MAX - 100_000,
                tolerance: 500,
            }
        );
    }

    #[test]
    fn test_credit_submission_needs_credit_order() {
        let err = engine()
            .check_amounts(100_000, &PaymentSubmission::Credit, Some(&PaymentMethod::Transferencia))
            .unwrap_err();
        assert_eq!(
            err,
            PaymentRejection::UnsupportedMethod {
                method: "transferencia".to_string(),
                payment_type: "credit",
            }
        );

        let err = engine().check_amounts(100_000, &PaymentSubmission::Credit, None).unwrap_err();
        assert_eq!(err.code(), "unsupported_method");

        assert!(engine()
            .check_amounts(100_000, &PaymentSubmission::Credit, Some(&PaymentMethod::Credito))
            .is_ok());
    }

    #[test]
    fn test_cash_requires_one_artifact() {
        let submission = PaymentSubmission::Cash {
            declared_amount: None,
            evidence: vec![],
        };
        let err = engine().check_amounts(20_000, &submission, None).unwrap_err();
        assert_eq!(err, PaymentRejection::MissingEvidence { leg: PaymentLeg::Cash });
    }

    #[tokio::test]
    async fn test_credit_warnings_never_block() {
        let lookup = StaticCreditLookup::new().with_profile(CreditProfile {
            customer_id: "C-9".to_string(),
            status: CreditStatus::Blocked,
            credit_limit: 100_000,
            available_credit: 10_000,
        });
        let engine = PaymentValidationEngine::new(ToleranceRule::default(), Arc::new(lookup));

        let mut order = Order::new(NewOrder::new("FV-20", 50_000).customer("C-9"));
        order.payment_method = Some(PaymentMethod::Credito);
        let report = engine.validate(&order, &PaymentSubmission::Credit).await.unwrap();
        assert_eq!(report.warnings.len(), 2);
        assert!(report.warnings.contains(&ValidationWarning::InsufficientCredit {
            available: 10_000,
            required: 50_000
        }));

        let mut unknown = Order::new(NewOrder::new("FV-21", 50_000).customer("C-404"));
        unknown.payment_method = Some(PaymentMethod::Credito);
        let report = engine.validate(&unknown, &PaymentSubmission::Credit).await.unwrap();
        assert!(matches!(
            report.warnings.as_slice(),
            [ValidationWarning::CreditProfileMissing { .. }]
        ));
    }

    #[test]
    fn test_submission_wire_format() {
        let json = r#"{"payment_type":"mixed","transferred_amount":60000,"cash_amount":39000,"transfer_evidence":["a.jpg"]}"#;
        let submission: PaymentSubmission = serde_json::from_str(json).unwrap();
        assert_eq!(submission.payment_type(), "mixed");

        let credit: PaymentSubmission = serde_json::from_str(r#"{"payment_type":"credit"}"#).unwrap();
        assert_eq!(credit, PaymentSubmission::Credit);
    }
}
