/// Progress and conflict-resolution protocol between a transfer and its driver

use crate::container::FilePart;

/// Information passed to the driving application during a transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackFacts {
    /// A part of a file is about to be copied
    Progress {
        /// Pathname in the source
        orig_path: String,
        /// Separator used in `orig_path`
        orig_sep: char,
        /// Pathname at the destination
        new_path: String,
        /// Separator used in `new_path`
        new_sep: char,
        /// Percentage of the transfer completed
        percent: u8,
        /// Part being copied
        part: FilePart,
    },
    /// A file with the same name already exists at the destination
    FileNameExists {
        /// Pathname of the existing entry
        path: String,
        /// Separator used in `path`
        sep: char,
    },
    /// A resource fork was dropped because the destination cannot store it
    ResourceForkIgnored {
        /// Pathname in the source
        path: String,
        /// Separator used in `path`
        sep: char,
        /// Part that was dropped
        part: FilePart,
    },
}

/// Response from the driving application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackResult {
    /// Stop the transfer
    Cancel,
    /// Leave the existing file alone and move on
    Skip,
    /// Replace the existing file
    Overwrite,
}

/// Receives callbacks from a transfer.
///
/// Only the answer to [`CallbackFacts::FileNameExists`] changes the course of
/// a transfer; other answers are ignored.
pub trait TransferHandler {
    /// Report an event and obtain a decision
    fn handle(&mut self, facts: &CallbackFacts) -> CallbackResult;
}

impl<F> TransferHandler for F
where
    F: FnMut(&CallbackFacts) -> CallbackResult,
{
    fn handle(&mut self, facts: &CallbackFacts) -> CallbackResult {
        self(facts)
    }
}

/// Handler that answers every name collision the same way
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedResolution(pub CallbackResult);

impl TransferHandler for FixedResolution {
    fn handle(&mut self, facts: &CallbackFacts) -> CallbackResult {
        if let CallbackFacts::Progress {
            new_path, percent, ..
        } = facts
        {
            tracing::trace!("{:3}% {}", percent, new_path);
        }
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_handler() {
        let mut seen = Vec::new();
        let mut handler = |facts: &CallbackFacts| {
            seen.push(facts.clone());
            CallbackResult::Skip
        };
        let facts = CallbackFacts::FileNameExists {
            path: "DataOnly".to_string(),
            sep: '/',
        };
        assert_eq!(handler.handle(&facts), CallbackResult::Skip);
        assert_eq!(seen, vec![facts]);
    }

    #[test]
    fn test_fixed_resolution() {
        let mut handler = FixedResolution(CallbackResult::Overwrite);
        let facts = CallbackFacts::ResourceForkIgnored {
            path: "RsrcOnly".to_string(),
            sep: ':',
            part: FilePart::RsrcFork,
        };
        assert_eq!(handler.handle(&facts), CallbackResult::Overwrite);
    }
}
