//! `codeagent-runner` — the turn loop that drives one user message through
//! history reconstruction, streaming model calls, and sequential tool
//! dispatch (spec §4.1/§4.2).

pub mod messages;
pub mod system_prompt;
pub mod turn;

pub use turn::{Runner, RunnerEvent};
