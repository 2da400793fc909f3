//! SIGTERM/SIGINT handling.
//!
//! The handler body is a single atomic store on the shared run context —
//! the only thing that is safe to do from a signal context. The scheduler
//! observes the flag at iteration boundaries.

use havoc_core::context::RunContext;
use std::sync::{Arc, OnceLock};

static SIGNAL_CONTEXT: OnceLock<Arc<RunContext>> = OnceLock::new();

/// Install termination handlers that request cooperative cancellation on
/// `ctx`. Installing twice keeps the first context.
pub fn install(ctx: Arc<RunContext>) {
    let _ = SIGNAL_CONTEXT.set(ctx);
    install_os_handlers();
}

#[cfg(unix)]
fn install_os_handlers() {
    unsafe extern "C" fn handler(_signal: i32) {
        if let Some(ctx) = SIGNAL_CONTEXT.get() {
            ctx.request_cancel();
        }
    }

    unsafe {
        let handler_ptr = handler as *const () as libc::sighandler_t;
        libc::signal(libc::SIGTERM, handler_ptr);
        libc::signal(libc::SIGINT, handler_ptr);
    }
}

#[cfg(not(unix))]
fn install_os_handlers() {}
