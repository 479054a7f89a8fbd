// ── Connection state machine ──
//
// Pure reducer over (phase, event) -> (phase, effects). The store feeds it
// stream lifecycle events and timer firings, then executes the effects it
// returns. Nothing here touches I/O or timers.

use vpnpack_api::ReadyState;

/// Push-stream connection phase, observable by consumers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, strum::Display)]
pub enum Phase {
    #[default]
    Disconnected,
    /// Stream requested or transport retrying on its own.
    Connecting,
    Connected,
    /// Stream closed for good; one reconnect timer is armed.
    ReconnectPending,
}

/// Inputs to the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineEvent {
    /// `connect()` was called.
    Connect,
    /// The current stream opened.
    Opened,
    /// The current stream reported an error.
    Failed(ReadyState),
    /// The reconnect timer fired.
    ReconnectDue,
    /// `disconnect()` was called.
    Disconnect,
}

/// Side effects the store must carry out, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Close the stream and cancel the highlight, reconnect and keepalive timers.
    TearDown,
    OpenStream,
    /// Start the keepalive ticker, replacing any running one.
    StartKeepalive,
    StopKeepalive,
    MarkConnected,
    MarkDisconnected,
    /// Remove the outstanding connection-lost error, if any.
    DismissConnectionLost,
    /// Log a connection-lost error unless one is outstanding.
    ReportConnectionLost,
    ScheduleReconnect,
}

#[derive(Debug, Default)]
pub struct ConnectionMachine {
    phase: Phase,
}

impl ConnectionMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Advance the machine, returning the effects to execute.
    ///
    /// Events that don't apply to the current phase (a stale timer, an
    /// error after `disconnect()`) yield no effects.
    pub fn handle(&mut self, event: MachineEvent) -> Vec<Effect> {
        use Effect::{
            DismissConnectionLost, MarkConnected, MarkDisconnected, OpenStream,
            ReportConnectionLost, ScheduleReconnect, StartKeepalive, StopKeepalive, TearDown,
        };

        let (next, effects) = match (self.phase, event) {
            (_, MachineEvent::Connect) | (Phase::ReconnectPending, MachineEvent::ReconnectDue) => {
                (Phase::Connecting, vec![TearDown, OpenStream])
            }

            // The keepalive only runs while the stream is up.
            (Phase::Connecting | Phase::Connected, MachineEvent::Opened) => (
                Phase::Connected,
                vec![MarkConnected, DismissConnectionLost, StartKeepalive],
            ),

            (Phase::Connecting | Phase::Connected, MachineEvent::Failed(ReadyState::Connecting)) => (
                Phase::Connecting,
                vec![StopKeepalive, MarkDisconnected, ReportConnectionLost],
            ),

            (Phase::Connecting | Phase::Connected, MachineEvent::Failed(ReadyState::Closed)) => (
                Phase::ReconnectPending,
                vec![
                    StopKeepalive,
                    MarkDisconnected,
                    ReportConnectionLost,
                    ScheduleReconnect,
                ],
            ),

            // A timer is already armed; never arm a second.
            (Phase::ReconnectPending, MachineEvent::Failed(_)) => {
                (Phase::ReconnectPending, vec![MarkDisconnected, ReportConnectionLost])
            }

            (_, MachineEvent::Disconnect) => (Phase::Disconnected, vec![TearDown, MarkDisconnected]),

            (phase, _) => (phase, Vec::new()),
        };

        self.phase = next;
        effects
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn machine_in(phase: Phase) -> ConnectionMachine {
        ConnectionMachine { phase }
    }

    #[test]
    fn connect_always_tears_down_first() {
        for phase in [
            Phase::Disconnected,
            Phase::Connecting,
            Phase::Connected,
            Phase::ReconnectPending,
        ] {
            let mut machine = machine_in(phase);
            let effects = machine.handle(MachineEvent::Connect);
            assert_eq!(effects, vec![Effect::TearDown, Effect::OpenStream]);
            assert_eq!(machine.phase(), Phase::Connecting);
        }
    }

    #[test]
    fn open_marks_connected_and_dismisses() {
        let mut machine = machine_in(Phase::Connecting);
        assert_eq!(
            machine.handle(MachineEvent::Opened),
            vec![
                Effect::MarkConnected,
                Effect::DismissConnectionLost,
                Effect::StartKeepalive
            ]
        );
        assert_eq!(machine.phase(), Phase::Connected);
    }

    #[test]
    fn keepalive_stops_on_any_stream_error() {
        for state in [ReadyState::Connecting, ReadyState::Closed] {
            let mut machine = machine_in(Phase::Connected);
            let effects = machine.handle(MachineEvent::Failed(state));
            assert_eq!(effects.first(), Some(&Effect::StopKeepalive));
            assert!(!effects.contains(&Effect::StartKeepalive));
        }
    }

    #[test]
    fn transient_error_schedules_nothing() {
        let mut machine = machine_in(Phase::Connected);
        let effects = machine.handle(MachineEvent::Failed(ReadyState::Connecting));
        assert!(!effects.contains(&Effect::ScheduleReconnect));
        assert_eq!(machine.phase(), Phase::Connecting);
    }

    #[test]
    fn terminal_error_schedules_exactly_once() {
        let mut machine = machine_in(Phase::Connected);
        let first = machine.handle(MachineEvent::Failed(ReadyState::Closed));
        assert!(first.contains(&Effect::ScheduleReconnect));
        assert_eq!(machine.phase(), Phase::ReconnectPending);

        let second = machine.handle(MachineEvent::Failed(ReadyState::Closed));
        assert!(!second.contains(&Effect::ScheduleReconnect));
        assert_eq!(machine.phase(), Phase::ReconnectPending);
    }

    #[test]
    fn reconnect_due_only_when_pending() {
        let mut machine = machine_in(Phase::ReconnectPending);
        assert!(
            machine
                .handle(MachineEvent::ReconnectDue)
                .contains(&Effect::OpenStream)
        );

        let mut machine = machine_in(Phase::Disconnected);
        assert!(machine.handle(MachineEvent::ReconnectDue).is_empty());
        assert_eq!(machine.phase(), Phase::Disconnected);
    }

    #[test]
    fn events_after_disconnect_are_ignored() {
        let mut machine = machine_in(Phase::Connected);
        machine.handle(MachineEvent::Disconnect);
        assert_eq!(machine.phase(), Phase::Disconnected);
        assert!(machine.handle(MachineEvent::Opened).is_empty());
        assert!(
            machine
                .handle(MachineEvent::Failed(ReadyState::Closed))
                .is_empty()
        );
    }

    #[test]
    fn disconnect_is_idempotent() {
        let mut machine = ConnectionMachine::new();
        for _ in 0..2 {
            assert_eq!(
                machine.handle(MachineEvent::Disconnect),
                vec![Effect::TearDown, Effect::MarkDisconnected]
            );
        }
    }
}
