//! Checkout
//!
//! Turns one restaurant's cart lines and a recipient selection into an
//! [`OrderRequest`]. Everything here is local: no request is built unless
//! every precondition holds, and all violated rules are reported together.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use thiserror::Error;

use crate::{
    cart::LineItem,
    delivery::{
        DeliveryProfile, DeliveryTarget, ExternalRecipient, RecipientOverrides, RecipientRecord,
        effective,
    },
    money::Amount,
    pricing,
};

/// Suggested authorized fee shown by storefronts. Not enforced anywhere.
pub const DEFAULT_AUTHORIZED_FEE: Amount = Amount::new(600);

/// A single broken checkout rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    /// No lines for the restaurant.
    #[error("the cart for this restaurant is empty")]
    EmptyCart,

    /// Only add-on lines; add-ons cannot be ordered alone.
    #[error("add-ons cannot be ordered without at least one meal")]
    AddOnOnly,

    /// A line belongs to another restaurant.
    #[error("meal {0} belongs to another restaurant")]
    ForeignItem(String),

    /// Prices overflowed while totalling.
    #[error("order total is too large")]
    TotalOverflow,

    /// Registered recipient has no effective location.
    #[error("recipient location is required")]
    RecipientLocation,

    /// Registered recipient has no effective phone.
    #[error("recipient phone is required")]
    RecipientPhone,

    /// External recipient name missing.
    #[error("recipient name is required")]
    ExternalName,

    /// External recipient phone missing.
    #[error("recipient phone is required")]
    ExternalPhone,

    /// External recipient location missing.
    #[error("recipient location is required")]
    ExternalLocation,
}

/// Every rule a checkout attempt broke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    violations: SmallVec<[Violation; 4]>,
}

impl ValidationError {
    /// The violated rules, in the order they were checked.
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Whether a specific rule was violated.
    pub fn contains(&self, violation: &Violation) -> bool {
        self.violations.contains(violation)
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("checkout is invalid: ")?;

        for (idx, violation) in self.violations.iter().enumerate() {
            if idx > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{violation}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Profile fields a self-delivery needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileField {
    /// Delivery location
    Location,
    /// Landmark
    Landmark,
}

/// Why a checkout attempt produced no order request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckoutError {
    /// One or more rules were broken.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The caller's profile lacks delivery details; complete the profile first.
    #[error("complete your delivery profile first (missing: {missing:?})")]
    ProfileIncomplete {
        /// Fields that are blank
        missing: SmallVec<[ProfileField; 2]>,
    },

    /// No account with the given username.
    #[error("no recipient named {username}")]
    RecipientUnresolved {
        /// The username that was looked up
        username: String,
    },
}

/// Who the order is for, with whatever had to be fetched to decide it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipientSelection {
    /// The caller, with their freshly loaded profile.
    Myself(DeliveryProfile),

    /// A registered account; `record` is `None` when the lookup found nothing.
    Registered {
        /// Username that was looked up
        username: String,
        /// Lookup result
        record: Option<RecipientRecord>,
        /// Values typed in by the orderer
        overrides: RecipientOverrides,
    },

    /// Someone without an account.
    External(ExternalRecipient),
}

/// The cart side of a checkout attempt.
#[derive(Debug, Clone, Copy)]
pub struct CheckoutDraft<'a> {
    /// Restaurant being checked out
    pub restaurant_id: &'a str,
    /// That restaurant's cart lines
    pub items: &'a [LineItem],
    /// Customer-chosen ceiling for delivery, packaging and other costs
    pub authorized_fee: Amount,
    /// Free-form note for the restaurant
    pub note: &'a str,
}

/// A validated order, ready for submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Restaurant identifier
    pub restaurant_id: String,
    /// Lines being ordered
    pub line_items: Vec<LineItem>,
    /// Note for the restaurant
    pub note: String,
    /// Fee ceiling the customer agreed to
    pub authorized_fee: Amount,
    /// Delivery target
    pub delivery: DeliveryTarget,
    /// Food amount plus authorized fee
    pub total_price: Amount,
}

/// Validates a checkout attempt and builds the order request.
///
/// Cart rules and recipient rules are reported together in one
/// [`CheckoutError::Validation`]. An incomplete profile or an unknown
/// username is only reported when the cart itself is valid.
///
/// # Errors
///
/// - [`CheckoutError::Validation`]: listing every broken rule.
/// - [`CheckoutError::ProfileIncomplete`]: self-delivery without location or landmark.
/// - [`CheckoutError::RecipientUnresolved`]: the registered recipient was not found.
pub fn build_order_request(
    draft: CheckoutDraft<'_>,
    selection: RecipientSelection,
) -> Result<OrderRequest, CheckoutError> {
    let (total_price, mut violations) = check_draft(&draft);

    let delivery = match resolve_target(selection, &mut violations) {
        Ok(delivery) => delivery,
        Err(error) if violations.is_empty() => return Err(error),
        Err(_) => return Err(ValidationError { violations }.into()),
    };

    let total_price = match total_price {
        Some(total_price) if violations.is_empty() => total_price,
        _ => return Err(ValidationError { violations }.into()),
    };

    Ok(OrderRequest {
        restaurant_id: draft.restaurant_id.to_string(),
        line_items: draft.items.to_vec(),
        note: draft.note.trim().to_string(),
        authorized_fee: draft.authorized_fee,
        delivery,
        total_price,
    })
}

/// Checks the cart side of a checkout attempt on its own and returns the
/// total the order would be placed at. Needs nothing but the draft, so it
/// can run before any profile or recipient is fetched.
///
/// # Errors
///
/// Returns a [`ValidationError`] listing every broken cart rule.
pub fn validate_draft(draft: CheckoutDraft<'_>) -> Result<Amount, ValidationError> {
    match check_draft(&draft) {
        (Some(total_price), violations) if violations.is_empty() => Ok(total_price),
        (_, violations) => Err(ValidationError { violations }),
    }
}

fn check_draft(draft: &CheckoutDraft<'_>) -> (Option<Amount>, SmallVec<[Violation; 4]>) {
    let mut violations: SmallVec<[Violation; 4]> = SmallVec::new();

    check_cart(draft, &mut violations);

    let total_price = pricing::total_price(draft.items, draft.authorized_fee).ok();

    if total_price.is_none() {
        violations.push(Violation::TotalOverflow);
    }

    (total_price, violations)
}

fn check_cart(draft: &CheckoutDraft<'_>, violations: &mut SmallVec<[Violation; 4]>) {
    if draft.items.is_empty() {
        violations.push(Violation::EmptyCart);
        return;
    }

    if draft.items.iter().all(LineItem::is_required_add_on) {
        violations.push(Violation::AddOnOnly);
    }

    for item in draft.items {
        if item.restaurant_id() != draft.restaurant_id {
            violations.push(Violation::ForeignItem(item.meal_id().to_string()));
        }
    }
}

fn resolve_target(
    selection: RecipientSelection,
    violations: &mut SmallVec<[Violation; 4]>,
) -> Result<DeliveryTarget, CheckoutError> {
    match selection {
        RecipientSelection::Myself(profile) => {
            let mut missing: SmallVec<[ProfileField; 2]> = SmallVec::new();

            if profile.location.trim().is_empty() {
                missing.push(ProfileField::Location);
            }

            if profile.landmark.trim().is_empty() {
                missing.push(ProfileField::Landmark);
            }

            if !missing.is_empty() {
                return Err(CheckoutError::ProfileIncomplete { missing });
            }

            Ok(DeliveryTarget::Myself {
                location: profile.location.trim().to_string(),
                phone: profile.phone.trim().to_string(),
                landmark: profile.landmark.trim().to_string(),
            })
        }
        RecipientSelection::Registered {
            username,
            record,
            overrides,
        } => {
            let Some(record) = record else {
                return Err(CheckoutError::RecipientUnresolved { username });
            };

            let location = effective(overrides.location.as_deref(), record.location.as_deref());
            let phone = effective(overrides.phone.as_deref(), record.phone.as_deref());
            let landmark = effective(overrides.landmark.as_deref(), record.landmark.as_deref());

            if location.is_empty() {
                violations.push(Violation::RecipientLocation);
            }

            if phone.is_empty() {
                violations.push(Violation::RecipientPhone);
            }

            Ok(DeliveryTarget::Registered {
                username: record.username,
                location,
                phone,
                landmark,
            })
        }
        RecipientSelection::External(recipient) => {
            if recipient.name.trim().is_empty() {
                violations.push(Violation::ExternalName);
            }

            if recipient.phone.trim().is_empty() {
                violations.push(Violation::ExternalPhone);
            }

            if recipient.location.trim().is_empty() {
                violations.push(Violation::ExternalLocation);
            }

            Ok(DeliveryTarget::External(ExternalRecipient {
                name: recipient.name.trim().to_string(),
                phone: recipient.phone.trim().to_string(),
                email: blank_to_none(recipient.email),
                location: recipient.location.trim().to_string(),
                landmark: blank_to_none(recipient.landmark),
            }))
        }
    }
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use crate::cart::Meal;

    use super::*;

    fn line(id: &str, price: u64, quantity: u32) -> LineItem {
        LineItem::new(Meal::new(id, "r1", Amount::new(price)), quantity)
    }

    fn pack() -> LineItem {
        LineItem::new(Meal::new("pack", "r1", Amount::new(100)).add_on(), 1)
    }

    fn draft(items: &[LineItem]) -> CheckoutDraft<'_> {
        CheckoutDraft {
            restaurant_id: "r1",
            items,
            authorized_fee: Amount::new(1000),
            note: "  no pepper ",
        }
    }

    fn profile(location: &str, landmark: &str) -> DeliveryProfile {
        DeliveryProfile {
            location: location.to_string(),
            phone: "0800".to_string(),
            landmark: landmark.to_string(),
            wallet_balance: Amount::ZERO,
        }
    }

    fn external(name: &str, phone: &str, location: &str) -> ExternalRecipient {
        ExternalRecipient {
            name: name.to_string(),
            phone: phone.to_string(),
            email: Some("  ".to_string()),
            location: location.to_string(),
            landmark: None,
        }
    }

    #[test]
    fn total_is_food_plus_authorized_fee() -> TestResult {
        let items = [line("m1", 500, 2)];

        let request = build_order_request(
            draft(&items),
            RecipientSelection::Myself(profile("Hall 3", "Gate")),
        )?;

        assert_eq!(request.total_price, Amount::new(2000));
        assert_eq!(request.note, "no pepper");
        assert_eq!(request.delivery.mode(), "self");

        Ok(())
    }

    #[test]
    fn add_on_only_cart_is_rejected() {
        let items = [pack()];

        let result = build_order_request(
            draft(&items),
            RecipientSelection::Myself(profile("Hall 3", "Gate")),
        );

        match result {
            Err(CheckoutError::Validation(error)) => {
                assert_eq!(error.violations(), [Violation::AddOnOnly]);
            }
            other => panic!("expected add-on-only validation error, got {other:?}"),
        }
    }

    #[test]
    fn add_on_with_a_meal_is_accepted() -> TestResult {
        let items = [line("m1", 500, 1), pack()];

        let request = build_order_request(
            draft(&items),
            RecipientSelection::Myself(profile("Hall 3", "Gate")),
        )?;

        assert_eq!(request.line_items.len(), 2);
        assert_eq!(request.total_price, Amount::new(1600));

        Ok(())
    }

    #[test]
    fn empty_cart_is_rejected() {
        let result = build_order_request(
            draft(&[]),
            RecipientSelection::Myself(profile("Hall 3", "Gate")),
        );

        assert!(
            matches!(result, Err(CheckoutError::Validation(ref e)) if e.contains(&Violation::EmptyCart)),
            "got {result:?}"
        );
    }

    #[test]
    fn self_with_blank_landmark_is_profile_incomplete() {
        let items = [line("m1", 500, 1)];

        let result = build_order_request(
            draft(&items),
            RecipientSelection::Myself(profile("Hall 3", "   ")),
        );

        match result {
            Err(CheckoutError::ProfileIncomplete { missing }) => {
                assert_eq!(missing.as_slice(), [ProfileField::Landmark]);
            }
            other => panic!("expected ProfileIncomplete, got {other:?}"),
        }
    }

    #[test]
    fn registered_not_found_is_unresolved() {
        let items = [line("m1", 500, 1)];

        let result = build_order_request(
            draft(&items),
            RecipientSelection::Registered {
                username: "bola".to_string(),
                record: None,
                overrides: RecipientOverrides::default(),
            },
        );

        assert!(
            matches!(result, Err(CheckoutError::RecipientUnresolved { ref username }) if username == "bola"),
            "got {result:?}"
        );
    }

    #[test]
    fn registered_overrides_win_over_stored_values() -> TestResult {
        let items = [line("m1", 500, 1)];

        let request = build_order_request(
            draft(&items),
            RecipientSelection::Registered {
                username: "bola".to_string(),
                record: Some(RecipientRecord {
                    username: "bola".to_string(),
                    location: Some("Hall 1".to_string()),
                    phone: Some("0802".to_string()),
                    landmark: None,
                    has_complete_delivery_info: false,
                }),
                overrides: RecipientOverrides {
                    location: Some("Hall 5".to_string()),
                    ..RecipientOverrides::default()
                },
            },
        )?;

        assert_eq!(
            request.delivery,
            DeliveryTarget::Registered {
                username: "bola".to_string(),
                location: "Hall 5".to_string(),
                phone: "0802".to_string(),
                landmark: String::new(),
            }
        );

        Ok(())
    }

    #[test]
    fn registered_without_effective_contact_lists_both_violations() {
        let items = [line("m1", 500, 1)];

        let result = build_order_request(
            draft(&items),
            RecipientSelection::Registered {
                username: "bola".to_string(),
                record: Some(RecipientRecord {
                    username: "bola".to_string(),
                    ..RecipientRecord::default()
                }),
                overrides: RecipientOverrides::default(),
            },
        );

        match result {
            Err(CheckoutError::Validation(error)) => assert_eq!(
                error.violations(),
                [Violation::RecipientLocation, Violation::RecipientPhone]
            ),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn external_requires_name_phone_location() {
        let items = [line("m1", 500, 1)];

        let result = build_order_request(
            draft(&items),
            RecipientSelection::External(external("", " ", "")),
        );

        match result {
            Err(CheckoutError::Validation(error)) => assert_eq!(
                error.violations(),
                [
                    Violation::ExternalName,
                    Violation::ExternalPhone,
                    Violation::ExternalLocation
                ]
            ),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn external_optional_fields_are_normalised() -> TestResult {
        let items = [line("m1", 500, 1)];

        let request = build_order_request(
            draft(&items),
            RecipientSelection::External(external("Ada", "0801", "Library")),
        )?;

        match request.delivery {
            DeliveryTarget::External(recipient) => assert_eq!(recipient.email, None),
            other => panic!("expected external target, got {other:?}"),
        }

        Ok(())
    }

    #[test]
    fn foreign_lines_are_reported() {
        let items = [
            line("m1", 500, 1),
            LineItem::new(Meal::new("x", "r2", Amount::new(10)), 1),
        ];

        let result = build_order_request(
            draft(&items),
            RecipientSelection::Myself(profile("Hall 3", "Gate")),
        );

        assert!(
            matches!(result, Err(CheckoutError::Validation(ref e)) if e.contains(&Violation::ForeignItem("x".to_string()))),
            "got {result:?}"
        );
    }

    #[test]
    fn validation_message_lists_every_rule() {
        let error = ValidationError {
            violations: [Violation::ExternalName, Violation::ExternalPhone]
                .into_iter()
                .collect(),
        };

        assert_eq!(
            error.to_string(),
            "checkout is invalid: recipient name is required; recipient phone is required"
        );
    }

    #[test]
    fn cart_and_recipient_violations_are_reported_together() {
        let items = [pack()];

        let result = build_order_request(
            draft(&items),
            RecipientSelection::External(ExternalRecipient::default()),
        );

        match result {
            Err(CheckoutError::Validation(error)) => assert_eq!(
                error.violations(),
                [
                    Violation::AddOnOnly,
                    Violation::ExternalName,
                    Violation::ExternalPhone,
                    Violation::ExternalLocation
                ]
            ),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn registered_contact_gaps_join_cart_violations() {
        let items = [
            line("m1", 500, 1),
            LineItem::new(Meal::new("x", "r2", Amount::new(10)), 1),
        ];

        let result = build_order_request(
            draft(&items),
            RecipientSelection::Registered {
                username: "bola".to_string(),
                record: Some(RecipientRecord {
                    username: "bola".to_string(),
                    phone: Some("0802".to_string()),
                    ..RecipientRecord::default()
                }),
                overrides: RecipientOverrides::default(),
            },
        );

        match result {
            Err(CheckoutError::Validation(error)) => assert_eq!(
                error.violations(),
                [
                    Violation::ForeignItem("x".to_string()),
                    Violation::RecipientLocation
                ]
            ),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn broken_cart_outranks_incomplete_profile() {
        let items = [pack()];

        let result = build_order_request(
            draft(&items),
            RecipientSelection::Myself(profile("", "")),
        );

        assert!(
            matches!(result, Err(CheckoutError::Validation(ref e)) if e.violations() == [Violation::AddOnOnly]),
            "got {result:?}"
        );
    }

    #[test]
    fn draft_validation_needs_no_recipient() -> TestResult {
        let items = [line("m1", 500, 2)];

        assert_eq!(validate_draft(draft(&items))?, Amount::new(2000));

        let result = validate_draft(draft(&[]));

        assert!(
            matches!(result, Err(ref e) if e.violations() == [Violation::EmptyCart]),
            "got {result:?}"
        );

        Ok(())
    }
}
