//! Call scripts: a serializable list of filesystem and handle operations,
//! replayed against any [`FileSystem`](crate::sys::FileSystem).
//!
//! A script in JSON looks like:
//!
//! ```json
//! { "calls": [
//!     { "call": "open", "path": "/a", "flags": "WRONLY | CREAT" },
//!     { "call": "write", "fd": 0, "data": "6869" },
//!     { "call": "close", "fd": 0 }
//! ] }
//! ```

mod call;
mod format;
mod run;

pub use call::{Call, Entry, Outcome, StatSummary};
pub use format::{
    load_calls, load_outcomes, save_calls, save_outcomes, OutcomeFile, ScriptFile, ScriptFormat,
};
pub use run::{run, MAX_READ_LEN};
