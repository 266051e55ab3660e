use std::sync::Mutex;

use slog::{o, Drain, Logger};
use slog_atomic::AtomicSwitch;
use slog_scope::GlobalLoggerGuard;

pub fn setup_global_logger(logger: Logger) -> GlobalLoggerGuard {
    slog_scope::set_global_logger(logger)
}

pub fn setup_logger() -> Logger {
    if cfg!(feature = "release") {
        Logger::root(
            Mutex::new(slog_json::Json::default(std::io::stderr())).map(slog::Fuse),
            o!(),
        )
    } else {
        let decorator = slog_term::TermDecorator::new().build();
        let drain = Mutex::new(slog_term::FullFormat::new(decorator).build()).fuse();
        let drain = slog_async::Async::new(drain).build().fuse();
        let drain = AtomicSwitch::new(drain);
        Logger::root(drain.fuse(), o!())
    }
}

#[derive(Clone)]
pub struct Context {
    pub logger: Option<Logger>,
    pub tracer: bool,
}

impl Context {
    pub fn empty() -> Context {
        Context {
            logger: None,
            tracer: false,
        }
    }

    pub fn try_log<F>(&self, closure: F)
    where
        F: FnOnce(&Logger),
    {
        if let Some(ref logger) = self.logger {
            closure(logger)
        }
    }

    pub fn expect_logger(&self) -> &Logger {
        self.logger.as_ref().unwrap()
    }
}
