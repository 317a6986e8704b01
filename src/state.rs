/// Mutable parse state threaded through the section loop.
#[derive(Debug, Default)]
pub(crate) struct ParseState {
    /// False until the end boundary is consumed, then permanently true.
    /// This is the sole termination condition of the section loop.
    pub(crate) terminal_boundary_seen: bool,
}
