//! Presentation derived from flow state
//!
//! `present` is a pure function of a `FlowSnapshot`. The state machine
//! never knows how it is drawn.

use serde::Serialize;

use checkout_core::PaymentMethod;

use crate::machine::{FlowSnapshot, FlowState};

/// Which screen the surface shows
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Screen {
    Loading,
    Form,
    Processing,
    Success,
    Failed,
}

impl Screen {
    /// Stable hook for automated UI checks
    pub fn test_id(&self) -> &'static str {
        match self {
            Screen::Loading => "loading-state",
            Screen::Form => "checkout-form",
            Screen::Processing => "processing-state",
            Screen::Success => "success-state",
            Screen::Failed => "error-state",
        }
    }
}

/// User action offered on the current screen
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Pay,
    Retry,
    Done,
}

/// Layout variant; `embedded=true` only changes this
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    Page,
    Compact,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Presentation {
    pub screen: Screen,
    pub layout: Layout,
    pub title: String,
    pub detail: Option<String>,
    pub amount: Option<String>,
    pub method: Option<PaymentMethod>,
    pub field_errors: Vec<(String, String)>,
    pub actions: Vec<Action>,
}

pub fn present(snapshot: &FlowSnapshot) -> Presentation {
    let layout = if snapshot.embedded {
        Layout::Compact
    } else {
        Layout::Page
    };
    let amount = snapshot.order.as_ref().map(|o| o.formatted_amount());

    let (screen, title, detail, actions) = match snapshot.state {
        FlowState::Input if snapshot.order.is_none() => {
            (Screen::Loading, "Loading...".to_string(), None, vec![])
        }
        FlowState::Input => (
            Screen::Form,
            "Amount to Pay".to_string(),
            None,
            vec![Action::Pay],
        ),
        FlowState::Processing => (
            Screen::Processing,
            "Processing Payment".to_string(),
            Some("Please do not close this window".to_string()),
            vec![],
        ),
        FlowState::Success => {
            let detail = snapshot
                .payment
                .as_ref()
                .map(|p| format!("Transaction ID {}", p.id));
            // Standalone pages route away on success; only the embedded
            // surface needs an explicit way to close.
            let actions = if snapshot.embedded {
                vec![Action::Done]
            } else {
                vec![]
            };
            (Screen::Success, "Payment Successful".to_string(), detail, actions)
        }
        FlowState::Failed => {
            let detail = snapshot
                .failure
                .as_ref()
                .map_or_else(
                    || "Something went wrong. Please try again.".to_string(),
                    |f| f.description.clone(),
                );
            let mut actions = vec![];
            if snapshot.order.is_some() {
                actions.push(Action::Retry);
            }
            if snapshot.embedded {
                actions.push(Action::Done);
            }
            (Screen::Failed, "Payment Failed".to_string(), Some(detail), actions)
        }
    };

    Presentation {
        screen,
        layout,
        title,
        detail,
        amount,
        method: snapshot.method,
        field_errors: snapshot
            .field_errors
            .iter()
            .map(|(field, message)| (field.as_str().to_string(), message.to_string()))
            .collect(),
        actions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkout_core::{FailurePayload, Field, FieldErrors, Order, PaymentRecord};

    fn with_order(state: FlowState) -> FlowSnapshot {
        FlowSnapshot {
            state,
            order: Some(Order::new("o1", 50000, "INR")),
            ..FlowSnapshot::default()
        }
    }

    #[test]
    fn test_screen_follows_state() {
        assert_eq!(present(&FlowSnapshot::default()).screen, Screen::Loading);
        assert_eq!(present(&with_order(FlowState::Input)).screen, Screen::Form);
        assert_eq!(present(&with_order(FlowState::Processing)).screen, Screen::Processing);
        assert_eq!(present(&with_order(FlowState::Success)).screen, Screen::Success);
        assert_eq!(present(&with_order(FlowState::Failed)).screen, Screen::Failed);
    }

    #[test]
    fn test_form_shows_amount_and_errors() {
        let mut errors = FieldErrors::new();
        errors.insert(Field::Vpa, "Invalid VPA format (e.g. user@bank)");
        let snapshot = FlowSnapshot {
            field_errors: errors,
            ..with_order(FlowState::Input)
        };

        let view = present(&snapshot);
        assert_eq!(view.amount.as_deref(), Some("₹500.00"));
        assert_eq!(view.actions, [Action::Pay]);
        assert_eq!(view.field_errors, [("vpa".to_string(), "Invalid VPA format (e.g. user@bank)".to_string())]);
    }

    #[test]
    fn test_embedded_only_changes_layout_and_done() {
        let standalone = FlowSnapshot {
            payment: Some(PaymentRecord::pending("p1")),
            ..with_order(FlowState::Success)
        };
        let embedded = FlowSnapshot {
            embedded: true,
            ..standalone.clone()
        };

        let a = present(&standalone);
        let b = present(&embedded);
        assert_eq!(a.layout, Layout::Page);
        assert_eq!(b.layout, Layout::Compact);
        assert_eq!(a.title, b.title);
        assert_eq!(a.detail.as_deref(), Some("Transaction ID p1"));
        assert!(a.actions.is_empty());
        assert_eq!(b.actions, [Action::Done]);
    }

    #[test]
    fn test_failure_offers_retry() {
        let snapshot = FlowSnapshot {
            failure: Some(FailurePayload {
                code: "TRANSPORT_ERROR".into(),
                description: "Service unreachable".into(),
                payment_id: None,
            }),
            ..with_order(FlowState::Failed)
        };
        let view = present(&snapshot);
        assert_eq!(view.detail.as_deref(), Some("Service unreachable"));
        assert_eq!(view.actions, [Action::Retry]);
        assert_eq!(view.screen.test_id(), "error-state");
    }
}
