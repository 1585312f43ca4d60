pub mod oracle;
pub mod session;

pub use oracle::{parse_yes_no, Console, Oracle};
pub use session::{record_report, run_session, SessionConfig, SessionError, SessionReport};
