//! Remote commands accepted over the node link.

/// Commands the node answers to. Matching is case-insensitive, anything
/// else is declined so another handler may claim it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteCommand {
    /// Unconditional stop, honored in every state.
    Stop,
    /// Power-on request, subject to the interlock.
    PowerOn,
}

impl RemoteCommand {
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.eq_ignore_ascii_case("stop") {
            Some(Self::Stop)
        } else if raw.eq_ignore_ascii_case("poweron") {
            Some(Self::PowerOn)
        } else {
            None
        }
    }
}

/// Whether a command was handled here or left for someone else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmdOutcome {
    Claimed,
    Declined,
}
