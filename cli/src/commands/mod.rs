//! Command implementations

pub mod batch;
pub mod clone;
pub mod config;
pub mod create;
pub mod devices;
pub mod exec;
pub mod launch;
pub mod list;
pub mod port;
pub mod remove;
pub mod restart;
pub mod stop;
pub mod sync;
pub mod version;

use std::future::Future;

use anyhow::Result;

use crate::app::AppContext;
use crate::output::progress;

/// Await `fut` behind a spinner when the terminal allows it.
///
/// On success the spinner is cleared so the renderer owns the final line; on
/// failure it is left showing `msg` with a cross.
pub(crate) async fn with_spinner<T>(
    app: &AppContext,
    msg: &str,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    if !app.output.show_progress() {
        return fut.await;
    }
    let pb = progress::spinner(msg);
    let result = fut.await;
    match &result {
        Ok(_) => pb.finish_and_clear(),
        Err(_) => progress::finish_error(&pb, msg),
    }
    result
}
