// Copyright (c) 2023-2025 The Meridian Foundation

//! The synchronization state machine.
//!
//! One state is active at a time. Collaborators feed events through
//! [`SyncService::dispatch`](crate::SyncService::dispatch), which looks
//! the pair up in [`transition`] and runs the entry action of the state
//! it lands in. Pairs with no edge are dropped, never a panic: a late
//! `NoBlocks` arriving after the machine has already moved on is
//! ordinary, not an error.

/// Phases of chain synchronization.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SyncState {
    /// Process start; nothing loaded yet.
    Uninitialized,
    /// Verifying storage and restoring wallet state.
    Initializing,
    /// Even with the network; the recurring poll watches for new blocks.
    Idle,
    /// Deciding whether the chain is behind, halted, or forked.
    Syncing,
    /// Fetching a batch of blocks from a peer.
    Downloading,
    /// Draining downloaded blocks through the block processor.
    ProcessingQueue,
    /// Repairing a corrupt chain by rewinding stored blocks.
    RollingBack,
    /// Rewinding past a fork to rejoin the majority chain.
    Forked,
    /// No peer has produced a block for several passes.
    NetworkHalted,
    /// Synced by decree; network monitoring is disabled.
    TestMode,
    /// Terminal. Manual intervention required.
    Failed,
}

/// Events the state machine reacts to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SyncEvent {
    /// Begin initialization.
    Start,
    /// Initialization finished.
    Started,
    /// Initialization finished in test mode.
    Test,
    /// Unrecoverable error.
    Failure,
    /// Stored chain failed integrity verification.
    Rollback,
    /// A repair or recovery pass finished.
    Success,
    /// The chain is even with the network.
    Synced,
    /// A peer is ahead of us.
    NotSynced,
    /// The download queue is over the high-water mark.
    Paused,
    /// No peer has delivered blocks for too long.
    NetworkHalted,
    /// The network follows a chain that diverges from ours.
    Fork,
    /// A block batch was queued for processing.
    Downloaded,
    /// A download attempt returned nothing.
    NoBlocks,
    /// The download queue was drained.
    Processed,
}

/// The transition table. Returns the state the machine moves to, or
/// `None` when `state` defines no edge for `event`.
pub fn transition(state: SyncState, event: SyncEvent) -> Option<SyncState> {
    use SyncEvent as E;
    use SyncState as S;

    let next = match (state, event) {
        (S::Uninitialized, E::Start) => S::Initializing,

        (S::Initializing, E::Started) => S::Syncing,
        (S::Initializing, E::Test) => S::TestMode,
        (S::Initializing, E::Rollback) => S::RollingBack,
        (S::Initializing, E::Failure) => S::Failed,

        (S::Syncing, E::Synced) => S::Idle,
        (S::Syncing, E::NotSynced) => S::Downloading,
        (S::Syncing, E::Paused) => S::ProcessingQueue,
        (S::Syncing, E::NetworkHalted) => S::NetworkHalted,
        (S::Syncing, E::Fork) => S::Forked,
        (S::Syncing, E::Failure) => S::Failed,

        (S::Downloading, E::Downloaded) => S::ProcessingQueue,
        (S::Downloading, E::NoBlocks) => S::Syncing,
        (S::Downloading, E::Failure) => S::Failed,

        (S::ProcessingQueue, E::Processed) => S::Syncing,
        (S::ProcessingQueue, E::Fork) => S::Forked,
        (S::ProcessingQueue, E::Failure) => S::Failed,

        (S::RollingBack, E::Success) => S::Initializing,
        (S::RollingBack, E::Failure) => S::Failed,

        (S::Forked, E::Success) => S::Syncing,
        (S::Forked, E::Failure) => S::Failed,

        (S::NetworkHalted, E::Success) => S::Syncing,
        (S::NetworkHalted, E::Failure) => S::Failed,

        (S::Idle, E::Downloaded) => S::ProcessingQueue,
        (S::Idle, E::NotSynced) => S::Syncing,
        (S::Idle, E::Fork) => S::Forked,

        _ => return None,
    };
    Some(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use SyncEvent as E;
    use SyncState as S;

    const STATES: [SyncState; 11] = [
        S::Uninitialized,
        S::Initializing,
        S::Idle,
        S::Syncing,
        S::Downloading,
        S::ProcessingQueue,
        S::RollingBack,
        S::Forked,
        S::NetworkHalted,
        S::TestMode,
        S::Failed,
    ];

    const EVENTS: [SyncEvent; 14] = [
        E::Start,
        E::Started,
        E::Test,
        E::Failure,
        E::Rollback,
        E::Success,
        E::Synced,
        E::NotSynced,
        E::Paused,
        E::NetworkHalted,
        E::Fork,
        E::Downloaded,
        E::NoBlocks,
        E::Processed,
    ];

    fn edges() -> Vec<(SyncState, SyncEvent, SyncState)> {
        vec![
            (S::Uninitialized, E::Start, S::Initializing),
            (S::Initializing, E::Started, S::Syncing),
            (S::Initializing, E::Test, S::TestMode),
            (S::Initializing, E::Rollback, S::RollingBack),
            (S::Initializing, E::Failure, S::Failed),
            (S::Syncing, E::Synced, S::Idle),
            (S::Syncing, E::NotSynced, S::Downloading),
            (S::Syncing, E::Paused, S::ProcessingQueue),
            (S::Syncing, E::NetworkHalted, S::NetworkHalted),
            (S::Syncing, E::Fork, S::Forked),
            (S::Syncing, E::Failure, S::Failed),
            (S::Downloading, E::Downloaded, S::ProcessingQueue),
            (S::Downloading, E::NoBlocks, S::Syncing),
            (S::Downloading, E::Failure, S::Failed),
            (S::ProcessingQueue, E::Processed, S::Syncing),
            (S::ProcessingQueue, E::Fork, S::Forked),
            (S::ProcessingQueue, E::Failure, S::Failed),
            (S::RollingBack, E::Success, S::Initializing),
            (S::RollingBack, E::Failure, S::Failed),
            (S::Forked, E::Success, S::Syncing),
            (S::Forked, E::Failure, S::Failed),
            (S::NetworkHalted, E::Success, S::Syncing),
            (S::NetworkHalted, E::Failure, S::Failed),
            (S::Idle, E::Downloaded, S::ProcessingQueue),
            (S::Idle, E::NotSynced, S::Syncing),
            (S::Idle, E::Fork, S::Forked),
        ]
    }

    #[test]
    fn test_every_defined_edge() {
        for (state, event, next) in edges() {
            assert_eq!(
                transition(state, event),
                Some(next),
                "{state:?} + {event:?} should move to {next:?}"
            );
        }
    }

    #[test]
    fn test_undefined_pairs_are_dropped() {
        let edges = edges();
        for state in STATES {
            for event in EVENTS {
                if edges.iter().any(|(s, e, _)| *s == state && *e == event) {
                    continue;
                }
                assert_eq!(
                    transition(state, event),
                    None,
                    "{state:?} must drop {event:?}"
                );
            }
        }
    }

    #[test]
    fn test_failed_is_terminal() {
        for event in EVENTS {
            assert_eq!(transition(S::Failed, event), None);
        }
    }

    #[test]
    fn test_boot_path() {
        let mut state = S::Uninitialized;
        for event in [E::Start, E::Started, E::Synced] {
            state = transition(state, event).unwrap();
        }
        assert_eq!(state, S::Idle);
    }

    #[test]
    fn test_rollback_reinitializes() {
        let state = transition(S::Initializing, E::Rollback).unwrap();
        assert_eq!(state, S::RollingBack);
        assert_eq!(transition(state, E::Success), Some(S::Initializing));
        assert_eq!(transition(state, E::Failure), Some(S::Failed));
    }

    #[test]
    fn test_fork_recovery_resumes_syncing() {
        for from in [S::Syncing, S::ProcessingQueue, S::Idle] {
            let state = transition(from, E::Fork).unwrap();
            assert_eq!(state, S::Forked);
        }
        assert_eq!(transition(S::Forked, E::Success), Some(S::Syncing));
    }
}
