//! Clone destination inspection and the existing-destination policy.

use std::io;
use std::path::Path;

use crate::error::FailureReason;
use crate::plan::ClonePolicy;

/// What is currently at a clone destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationState {
    Missing,
    EmptyDirectory,
    /// Non-empty directory containing `.git`
    WorkingCopy,
    /// Non-empty directory that is not a working copy
    Populated,
    NotDirectory,
}

impl DestinationState {
    pub fn inspect(path: &Path) -> io::Result<Self> {
        let meta = match std::fs::metadata(path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::Missing),
            Err(e) => return Err(e),
        };
        if !meta.is_dir() {
            return Ok(Self::NotDirectory);
        }
        if std::fs::read_dir(path)?.next().is_none() {
            return Ok(Self::EmptyDirectory);
        }
        if path.join(".git").exists() {
            Ok(Self::WorkingCopy)
        } else {
            Ok(Self::Populated)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloneDecision {
    Clone,
    Skip,
}

/// Map the destination state onto clone / skip / failure under `policy`.
///
/// `git clone` itself accepts a missing or empty directory; anything else is
/// decided here so git is never spawned against a populated path.
pub fn decide(state: DestinationState, policy: ClonePolicy) -> Result<CloneDecision, FailureReason> {
    match (state, policy) {
        (DestinationState::Missing | DestinationState::EmptyDirectory, _) => Ok(CloneDecision::Clone),
        (DestinationState::WorkingCopy, ClonePolicy::SkipIfExists) => Ok(CloneDecision::Skip),
        (DestinationState::WorkingCopy | DestinationState::Populated, _) => {
            Err(FailureReason::DestinationNotEmpty)
        }
        (DestinationState::NotDirectory, _) => Err(FailureReason::DestinationNotDirectory),
    }
}
