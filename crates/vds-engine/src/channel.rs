use crate::commands::check_reply;
use crate::EngineResult;

/// Transport for single simulator commands.
///
/// `run` sends one command line and blocks until the simulator's result
/// string for that command is available. Implementations do not retry.
pub trait CommandChannel {
    fn run(&mut self, command: &str) -> EngineResult<String>;

    /// Run a command and turn simulator error replies into errors.
    fn run_checked(&mut self, command: &str) -> EngineResult<String> {
        let reply = self.run(command)?;
        check_reply(command, reply)
    }
}
