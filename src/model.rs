//! Core data model.
//!
//! A worker is an independent execution unit with a lifecycle state. The
//! controller talks to it over the control plane (`ControlMessage`) and the
//! data plane (work items in, `ResultItem`s out).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Worker identity
// ---------------------------------------------------------------------------

/// Name of a worker. Tags every result so a shared output queue can be
/// demultiplexed by producer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkerId(String);

impl WorkerId {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(name.as_ref().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for WorkerId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for WorkerId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Lifecycle state of a worker. Owned by the run loop; the controller only
/// observes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    /// Built, run loop not yet entered.
    Created,
    /// Idle. Waits on the control channel, pulls no work.
    Paused,
    /// Pulling work and invoking the data hook.
    Running,
    /// Stop received (or unrecoverable fault). Cleanup pending.
    Stopping,
    /// Cleanup done, context released. Terminal.
    Terminated,
}

impl WorkerState {
    /// Can transition from self to `to`?
    pub fn can_transition_to(self, to: WorkerState) -> bool {
        use WorkerState::*;
        matches!(
            (self, to),
            (Created, Paused)
                | (Paused, Running)
                | (Running, Paused)
                | (Created, Stopping)
                | (Paused, Stopping)
                | (Running, Stopping)
                | (Stopping, Terminated)
        )
    }

    /// Is this a terminal state?
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkerState::Terminated)
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WorkerState::Created => "created",
            WorkerState::Paused => "paused",
            WorkerState::Running => "running",
            WorkerState::Stopping => "stopping",
            WorkerState::Terminated => "terminated",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for WorkerState {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(WorkerState::Created),
            "paused" => Ok(WorkerState::Paused),
            "running" => Ok(WorkerState::Running),
            "stopping" => Ok(WorkerState::Stopping),
            "terminated" => Ok(WorkerState::Terminated),
            other => Err(crate::error::Error::Other(format!(
                "unknown worker state: {other}"
            ))),
        }
    }
}

/// A state transition published on the worker's lifecycle channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    pub worker: WorkerId,
    pub from: WorkerState,
    pub to: WorkerState,
}

// ---------------------------------------------------------------------------
// Control plane
// ---------------------------------------------------------------------------

/// A message on the control channel. `Start`/`Pause`/`Stop` are consumed by
/// the run loop; everything else is handed to the message hook in order.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlMessage<M> {
    Start,
    Pause,
    Stop,
    App(M),
}

// ---------------------------------------------------------------------------
// Data plane (output)
// ---------------------------------------------------------------------------

/// Category label used for fault reports.
pub const FAULT_CATEGORY: &str = "error";

/// A result produced by a worker and delivered to the controller.
#[derive(Debug, Clone, Serialize)]
pub struct ResultItem<R> {
    /// Producing worker.
    pub producer: WorkerId,
    /// Routing label (e.g. "mandelbrot", "samples", "error").
    pub category: String,
    pub payload: Payload<R>,
    pub produced_at: DateTime<Utc>,
}

impl<R> ResultItem<R> {
    pub fn is_fault(&self) -> bool {
        matches!(self.payload, Payload::Fault(_))
    }

    /// The data payload, if this is not a fault report.
    pub fn data(&self) -> Option<&R> {
        match &self.payload {
            Payload::Data(data) => Some(data),
            Payload::Fault(_) => None,
        }
    }

    pub fn into_data(self) -> Option<R> {
        match self.payload {
            Payload::Data(data) => Some(data),
            Payload::Fault(_) => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Payload<R> {
    Data(R),
    Fault(Fault),
}

/// A hook failure surfaced on the output queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fault {
    /// Which hook failed ("process_data", "process_messages", ...).
    pub hook: String,
    pub message: String,
    /// Loop iteration the fault happened in.
    pub iteration: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowed_transitions_match_lifecycle() {
        use WorkerState::*;
        let all = [Created, Paused, Running, Stopping, Terminated];
        let allowed = [
            (Created, Paused),
            (Paused, Running),
            (Running, Paused),
            (Created, Stopping),
            (Paused, Stopping),
            (Running, Stopping),
            (Stopping, Terminated),
        ];
        for from in all {
            for to in all {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn terminated_is_the_only_terminal_state() {
        assert!(WorkerState::Terminated.is_terminal());
        assert!(!WorkerState::Stopping.is_terminal());
        assert!(!WorkerState::Paused.is_terminal());
    }

    #[test]
    fn state_round_trips_through_display() {
        for s in ["created", "paused", "running", "stopping", "terminated"] {
            let state: WorkerState = s.parse().unwrap();
            assert_eq!(state.to_string(), s);
        }
        assert!("dead".parse::<WorkerState>().is_err());
    }

    #[test]
    fn fault_payload_has_no_data() {
        let item: ResultItem<u32> = ResultItem {
            producer: WorkerId::new("w"),
            category: FAULT_CATEGORY.to_string(),
            payload: Payload::Fault(Fault {
                hook: "process_data".into(),
                message: "boom".into(),
                iteration: 3,
            }),
            produced_at: Utc::now(),
        };
        assert!(item.is_fault());
        assert!(item.data().is_none());
        assert_eq!(item.producer, "w");
    }
}
