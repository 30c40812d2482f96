use std::rc::Rc;
use thiserror::Error;

/// Where an error escaped from, for routing and diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum ErrorPhase {
    #[error("setup function")]
    Setup,
    #[error("render function")]
    Render,
    #[error("watcher getter")]
    WatchGetter,
    #[error("watcher callback")]
    WatchCallback,
    #[error("watcher cleanup")]
    WatchCleanup,
    #[error("lifecycle hook")]
    LifecycleHook,
    #[error("directive hook")]
    DirectiveHook,
    #[error("scheduler job")]
    Scheduler,
    #[error("native event handler")]
    NativeEventHandler,
}

/// The application-level error sink: receives errors no error-captured
/// hook claimed. Without one, unclaimed errors are logged (and re-raised
/// under debug assertions).
pub type AppErrorHandler = Rc<dyn Fn(ErrorPhase, &str)>;
