//! Per-card registration state with optimistic updates.

use crate::{
    model::{Event, Profile, RegistrationState},
    store::Ledger,
    PortalError,
};

pub fn is_registered(viewer_id: &str, event: &Event) -> bool {
    event.is_registered(viewer_id)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardState {
    Idle {
        state: RegistrationState,
        /// Message from the last failed toggle, if any.
        error: Option<String>,
    },
    Submitting {
        previous: RegistrationState,
    },
}

/// One event card's register/unregister button.
///
/// `Idle -> Submitting -> Idle(new)` on success,
/// `Idle -> Submitting -> Idle(old, error)` on failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationCard {
    state: CardState,
}

impl RegistrationCard {
    pub fn new(observed: RegistrationState) -> Self {
        Self { state: CardState::Idle { state: observed, error: None } }
    }

    pub fn for_viewer(viewer_id: &str, event: &Event) -> Self {
        Self::new(RegistrationState::from_membership(is_registered(viewer_id, event)))
    }

    pub fn state(&self) -> &CardState {
        &self.state
    }

    /// What the card shows. While submitting this is already the target.
    pub fn displayed(&self) -> RegistrationState {
        match &self.state {
            CardState::Idle { state, .. } => *state,
            CardState::Submitting { previous } => previous.flipped(),
        }
    }

    /// The toggle control is disabled while a submission is in flight.
    pub fn is_submitting(&self) -> bool {
        matches!(self.state, CardState::Submitting { .. })
    }

    /// Starts a toggle and returns the target state, or `None` if one is
    /// already in flight.
    pub fn begin(&mut self) -> Option<RegistrationState> {
        let CardState::Idle { state, .. } = self.state else {
            return None;
        };
        self.state = CardState::Submitting { previous: state };
        Some(state.flipped())
    }

    /// Settles the in-flight toggle. Failures roll back to the prior state.
    pub fn complete(
        &mut self,
        result: Result<RegistrationState, PortalError>,
    ) -> Result<RegistrationState, PortalError> {
        let CardState::Submitting { previous } = self.state else {
            return result;
        };
        self.state = match &result {
            Ok(state) => CardState::Idle { state: *state, error: None },
            Err(err) => CardState::Idle { state: previous, error: Some(err.to_string()) },
        };
        result
    }

    /// Runs a whole toggle against the ledger. `None` means the card was
    /// already submitting and nothing was sent.
    pub async fn toggle(
        &mut self,
        ledger: &dyn Ledger,
        actor: &Profile,
        event_id: &str,
    ) -> Option<Result<RegistrationState, PortalError>> {
        let target = self.begin()?;
        let result = ledger.set_registration(actor, event_id, target).await;
        if let Err(err) = &result {
            tracing::warn!(event_id, uid = %actor.uid, error = %err, "registration toggle failed");
        }
        Some(self.complete(result))
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::model::Role;

    struct FixedLedger(Result<(), fn() -> PortalError>);

    #[async_trait]
    impl Ledger for FixedLedger {
        async fn set_registration(
            &self,
            _actor: &Profile,
            _event_id: &str,
            target: RegistrationState,
        ) -> Result<RegistrationState, PortalError> {
            match self.0 {
                Ok(()) => Ok(target),
                Err(make) => Err(make()),
            }
        }
    }

    fn student() -> Profile {
        Profile { uid: "s1".into(), role: Role::Student, name: "Sam".into(), email: None }
    }

    #[test]
    fn begin_moves_to_submitting_and_shows_target() {
        let mut card = RegistrationCard::new(RegistrationState::Unregistered);
        assert_eq!(card.begin(), Some(RegistrationState::Registered));
        assert!(card.is_submitting());
        assert_eq!(card.displayed(), RegistrationState::Registered);
    }

    #[test]
    fn second_begin_while_submitting_is_a_no_op() {
        let mut card = RegistrationCard::new(RegistrationState::Registered);
        card.begin();
        assert_eq!(card.begin(), None);
        assert_eq!(card.state(), &CardState::Submitting { previous: RegistrationState::Registered });
    }

    #[test]
    fn failure_rolls_back_and_keeps_the_error() {
        let mut card = RegistrationCard::new(RegistrationState::Unregistered);
        card.begin();
        let result = card.complete(Err(PortalError::Network("offline".into())));
        assert!(result.is_err());
        match card.state() {
            CardState::Idle { state, error } => {
                assert_eq!(*state, RegistrationState::Unregistered);
                assert!(error.as_deref().unwrap().contains("offline"));
            },
            other => panic!("expected idle, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn toggle_settles_on_the_new_state() {
        let mut card = RegistrationCard::new(RegistrationState::Unregistered);
        let outcome = card.toggle(&FixedLedger(Ok(())), &student(), "e1").await;
        assert_eq!(outcome.unwrap().unwrap(), RegistrationState::Registered);
        assert_eq!(card.state(), &CardState::Idle { state: RegistrationState::Registered, error: None });
    }

    #[tokio::test]
    async fn failed_toggle_leaves_displayed_state_intact() {
        let ledger = FixedLedger(Err(|| PortalError::Permission("denied".into())));
        let mut card = RegistrationCard::new(RegistrationState::Registered);
        let outcome = card.toggle(&ledger, &student(), "e1").await;
        assert!(outcome.unwrap().is_err());
        assert_eq!(card.displayed(), RegistrationState::Registered);
        assert!(!card.is_submitting());
    }
}
