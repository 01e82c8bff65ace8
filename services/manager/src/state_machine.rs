//! Node connection state machine.
//!
//! A pure transition function. Every `(state, event)` pair has an answer:
//! pairs outside the table keep the state and report `accepted = false`.

use serde::{Deserialize, Serialize};

use crate::model::ConnectionStatus;

/// Something that happened to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionEvent {
    /// A setup request is about to be dispatched.
    SetupInitiated,
    /// The node answered the setup request successfully.
    SetupSucceeded,
    /// The node rejected the setup request.
    SetupFailed,
    /// The terminator reported that the SCTP association is gone.
    ConnectionLost,
    /// Phase 1 of a mass shutdown reached the node.
    ShutdownRequested,
    /// Phase 2 of a mass shutdown reached the node.
    ShutdownTimeoutElapsed,
    /// An X2 reset was requested.
    ResetRequested,
}

/// Result of applying an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub next: ConnectionStatus,
    pub accepted: bool,
}

impl Transition {
    fn to(next: ConnectionStatus) -> Self {
        Self {
            next,
            accepted: true,
        }
    }

    fn rejected(state: ConnectionStatus) -> Self {
        Self {
            next: state,
            accepted: false,
        }
    }
}

/// Compute the next state for `event` applied in `state`.
pub fn transition(state: ConnectionStatus, event: ConnectionEvent) -> Transition {
    use ConnectionEvent::*;
    use ConnectionStatus::*;

    match (event, state) {
        (SetupInitiated, ShutDown) => Transition::rejected(state),
        (SetupInitiated, _) => Transition::to(Connecting),

        (SetupSucceeded, Connecting | Connected) => Transition::to(Connected),

        (SetupFailed, Connecting) => Transition::to(ConnectedSetupFailed),

        (ConnectionLost, Connected | Connecting | ConnectedSetupFailed | Disconnected) => {
            Transition::to(Disconnected)
        }
        (ConnectionLost, ShuttingDown | ShutDown) => Transition::to(ShutDown),

        (ShutdownRequested, Connected | Connecting | ConnectedSetupFailed) => {
            Transition::to(ShuttingDown)
        }
        (ShutdownRequested, Disconnected) => Transition::to(ShutDown),

        (ShutdownTimeoutElapsed, ShuttingDown) => Transition::to(ShutDown),

        (ResetRequested, Connected) => Transition::to(Connected),

        _ => Transition::rejected(state),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;
    use ConnectionEvent::*;
    use ConnectionStatus::*;

    const ALL_STATES: [ConnectionStatus; 6] = [
        Disconnected,
        Connecting,
        Connected,
        ConnectedSetupFailed,
        ShuttingDown,
        ShutDown,
    ];

    const ALL_EVENTS: [ConnectionEvent; 7] = [
        SetupInitiated,
        SetupSucceeded,
        SetupFailed,
        ConnectionLost,
        ShutdownRequested,
        ShutdownTimeoutElapsed,
        ResetRequested,
    ];

    #[rstest]
    #[case(Disconnected, SetupInitiated, Connecting)]
    #[case(ConnectedSetupFailed, SetupInitiated, Connecting)]
    #[case(ShuttingDown, SetupInitiated, Connecting)]
    #[case(Connecting, SetupSucceeded, Connected)]
    #[case(Connected, SetupSucceeded, Connected)]
    #[case(Connecting, SetupFailed, ConnectedSetupFailed)]
    #[case(Connected, ConnectionLost, Disconnected)]
    #[case(Connecting, ConnectionLost, Disconnected)]
    #[case(ConnectedSetupFailed, ConnectionLost, Disconnected)]
    #[case(Disconnected, ConnectionLost, Disconnected)]
    #[case(ShuttingDown, ConnectionLost, ShutDown)]
    #[case(ShutDown, ConnectionLost, ShutDown)]
    #[case(Connected, ShutdownRequested, ShuttingDown)]
    #[case(Connecting, ShutdownRequested, ShuttingDown)]
    #[case(ConnectedSetupFailed, ShutdownRequested, ShuttingDown)]
    #[case(Disconnected, ShutdownRequested, ShutDown)]
    #[case(ShuttingDown, ShutdownTimeoutElapsed, ShutDown)]
    #[case(Connected, ResetRequested, Connected)]
    fn test_accepted_transitions(
        #[case] from: ConnectionStatus,
        #[case] event: ConnectionEvent,
        #[case] to: ConnectionStatus,
    ) {
        assert_eq!(transition(from, event), Transition { next: to, accepted: true });
    }

    #[rstest]
    #[case(ShutDown, SetupInitiated)]
    #[case(Disconnected, SetupSucceeded)]
    #[case(ConnectedSetupFailed, SetupSucceeded)]
    #[case(Connected, SetupFailed)]
    #[case(ShuttingDown, ShutdownRequested)]
    #[case(ShutDown, ShutdownRequested)]
    #[case(Connected, ShutdownTimeoutElapsed)]
    #[case(Disconnected, ResetRequested)]
    #[case(Connecting, ResetRequested)]
    #[case(ShuttingDown, ResetRequested)]
    fn test_rejected_transitions_keep_state(
        #[case] from: ConnectionStatus,
        #[case] event: ConnectionEvent,
    ) {
        assert_eq!(transition(from, event), Transition { next: from, accepted: false });
    }

    #[test]
    fn test_shut_down_only_accepts_connection_lost() {
        for event in ALL_EVENTS {
            let t = transition(ShutDown, event);
            assert_eq!(t.next, ShutDown);
            assert_eq!(t.accepted, event == ConnectionLost, "event {event:?}");
        }
    }

    fn any_state() -> impl Strategy<Value = ConnectionStatus> {
        proptest::sample::select(ALL_STATES.to_vec())
    }

    fn any_event() -> impl Strategy<Value = ConnectionEvent> {
        proptest::sample::select(ALL_EVENTS.to_vec())
    }

    proptest! {
        #[test]
        fn test_transition_is_total_and_deterministic(state in any_state(), event in any_event()) {
            let first = transition(state, event);
            let second = transition(state, event);
            prop_assert_eq!(first, second);
            if !first.accepted {
                prop_assert_eq!(first.next, state);
            }
        }

        #[test]
        fn test_lost_connection_never_revives_a_shutdown(
            events in proptest::collection::vec(any_event(), 0..20)
        ) {
            let mut state = ShuttingDown;
            for event in events {
                if event == SetupInitiated {
                    continue;
                }
                state = transition(state, event).next;
            }
            let after = transition(state, ConnectionLost).next;
            prop_assert!(matches!(after, ShutDown | Disconnected));
            if matches!(state, ShuttingDown | ShutDown) {
                prop_assert_eq!(after, ShutDown);
            }
        }
    }
}
