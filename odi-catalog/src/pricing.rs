use odi_shared::Laari;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schedule::{PricedTicketType, TaxProfile};

/// Rider's choice of one ticket type and how many passengers travel on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketSelection {
    pub ticket_type_id: Uuid,
    pub quantity: i64,
}

/// One priced row of the booking breakdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub ticket_type_id: Uuid,
    pub name: String,
    pub code: String,
    pub base_price: Laari,
    pub surcharge: Laari,
    pub discount: Laari,
    pub unit_price: Laari,
    pub quantity: i64,
    pub line_total: Laari,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub line_items: Vec<LineItem>,
    pub subtotal: Laari,
    pub tax: Laari,
    pub total: Laari,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PricingError {
    #[error("Invalid selection: {0}")]
    InvalidSelection(String),
}

/// Derives subtotal/tax/total for a set of ticket selections. Pure: no
/// I/O, no clock, no side effects; the caller supplies the schedule's
/// ticket-type catalog and tax profile.
pub struct PricingCalculator;

impl PricingCalculator {
    pub fn quote(
        selections: &[TicketSelection],
        catalog: &[PricedTicketType],
        tax_profile: Option<&TaxProfile>,
        currency: &str,
    ) -> Result<Quote, PricingError> {
        let mut line_items = Vec::with_capacity(selections.len());
        let mut subtotal: Laari = 0;

        for selection in selections {
            if selection.quantity < 0 {
                return Err(PricingError::InvalidSelection(format!(
                    "negative quantity for ticket type {}",
                    selection.ticket_type_id
                )));
            }

            let priced = catalog
                .iter()
                .find(|p| p.active && p.ticket_type.id == selection.ticket_type_id)
                .ok_or_else(|| {
                    PricingError::InvalidSelection(format!(
                        "ticket type {} is not enabled for this schedule",
                        selection.ticket_type_id
                    ))
                })?;

            let unit_price = priced.effective_price();
            let line_total = unit_price * selection.quantity;
            subtotal += line_total;

            line_items.push(LineItem {
                ticket_type_id: priced.ticket_type.id,
                name: priced.ticket_type.name.clone(),
                code: priced.ticket_type.code.clone(),
                base_price: priced.ticket_type.base_price,
                surcharge: priced.surcharge,
                discount: priced.discount,
                unit_price,
                quantity: selection.quantity,
                line_total,
            });
        }

        let tax = tax_profile.map(|p| p.calculate_tax(subtotal)).unwrap_or(0);

        Ok(Quote {
            line_items,
            subtotal,
            tax,
            total: subtotal + tax,
            currency: currency.to_string(),
        })
    }

    /// Total passenger count implied by the selections.
    pub fn total_passengers(selections: &[TicketSelection]) -> i64 {
        selections.iter().map(|s| s.quantity.max(0)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{Rounding, TaxKind, TaxLine, TicketType};

    fn priced(id: Uuid, base: Laari) -> PricedTicketType {
        PricedTicketType {
            ticket_type: TicketType {
                id,
                owner_id: Uuid::new_v4(),
                name: "Economy".to_string(),
                code: "ECO".to_string(),
                base_price: base,
                currency: "MVR".to_string(),
                refundable: true,
            },
            surcharge: 0,
            discount: 0,
            active: true,
        }
    }

    #[test]
    fn test_capacity_mode_two_tickets_no_tax() {
        // One ticket type at 50.00 MVR, quantity 2, no tax rule configured.
        let id = Uuid::new_v4();
        let catalog = vec![priced(id, 5_000)];
        let selections = vec![TicketSelection {
            ticket_type_id: id,
            quantity: 2,
        }];

        let quote = PricingCalculator::quote(&selections, &catalog, None, "MVR").unwrap();
        assert_eq!(quote.subtotal, 10_000);
        assert_eq!(quote.tax, 0);
        assert_eq!(quote.total, 10_000);
        assert_eq!(quote.currency, "MVR");
        assert_eq!(quote.line_items.len(), 1);
        assert_eq!(quote.line_items[0].line_total, 10_000);
    }

    #[test]
    fn test_total_matches_quantity_times_unit_price_plus_tax() {
        let eco = Uuid::new_v4();
        let vip = Uuid::new_v4();
        let mut vip_priced = priced(vip, 12_000);
        vip_priced.surcharge = 1_000;
        let catalog = vec![priced(eco, 5_000), vip_priced];

        let tax = TaxProfile {
            id: Uuid::new_v4(),
            name: "GST".to_string(),
            lines: vec![TaxLine {
                name: "GST".to_string(),
                kind: TaxKind::Percent(8.0),
                active: true,
            }],
            rounding: Rounding::RoundNearest,
        };

        let selections = vec![
            TicketSelection {
                ticket_type_id: eco,
                quantity: 3,
            },
            TicketSelection {
                ticket_type_id: vip,
                quantity: 1,
            },
        ];

        let quote = PricingCalculator::quote(&selections, &catalog, Some(&tax), "MVR").unwrap();
        // 3 * 50.00 + 1 * 130.00 = 280.00, tax 8% = 22.40.
        assert_eq!(quote.subtotal, 28_000);
        assert_eq!(quote.tax, 2_240);
        assert_eq!(quote.total, 30_240);
        assert_eq!(PricingCalculator::total_passengers(&selections), 4);
    }

    #[test]
    fn test_negative_quantity_rejected() {
        let id = Uuid::new_v4();
        let catalog = vec![priced(id, 5_000)];
        let selections = vec![TicketSelection {
            ticket_type_id: id,
            quantity: -1,
        }];

        let err = PricingCalculator::quote(&selections, &catalog, None, "MVR").unwrap_err();
        assert!(matches!(err, PricingError::InvalidSelection(_)));
    }

    #[test]
    fn test_unknown_ticket_type_rejected() {
        let catalog = vec![priced(Uuid::new_v4(), 5_000)];
        let selections = vec![TicketSelection {
            ticket_type_id: Uuid::new_v4(),
            quantity: 1,
        }];

        let err = PricingCalculator::quote(&selections, &catalog, None, "MVR").unwrap_err();
        assert!(matches!(err, PricingError::InvalidSelection(_)));
    }

    #[test]
    fn test_inactive_ticket_type_rejected() {
        let id = Uuid::new_v4();
        let mut entry = priced(id, 5_000);
        entry.active = false;
        let catalog = vec![entry];

        let err = PricingCalculator::quote(
            &[TicketSelection {
                ticket_type_id: id,
                quantity: 1,
            }],
            &catalog,
            None,
            "MVR",
        )
        .unwrap_err();
        assert!(matches!(err, PricingError::InvalidSelection(_)));
    }
}
