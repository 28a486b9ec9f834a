/*!

Logging for the pipeline. Modules log through the `log` facade macros re-exported here;
`enable_logging` installs a `log4rs` console logger the first time it is called and
`set_log_level` swaps the root level afterwards.

```rust,no_run
use transport_health::log::{enable_logging, set_log_level, LevelFilter};

enable_logging().expect("logger");
set_log_level(LevelFilter::Debug).expect("logger");
```

*/

use crate::error::{HealthError, HealthResult};
use log4rs::{
    Handle,
    append::console::ConsoleAppender,
    config::{Appender, Config, Root},
    encode::pattern::PatternEncoder,
};
use std::sync::{Mutex, MutexGuard};

pub use ::log::{debug, error, info, trace, warn, LevelFilter};

const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::Info;
const DEFAULT_LOG_PATTERN: &str = "{d(%Y-%m-%dT%H:%M:%S)} {h({l})} {T} {t} - {m}{n}";

// Holds the handle once the logger is installed; the lock serialises installation.
static LOG_HANDLE: Mutex<Option<Handle>> = Mutex::new(None);

fn build_config(level: LevelFilter) -> HealthResult<Config> {
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(DEFAULT_LOG_PATTERN)))
        .build();

    Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(level))
        .map_err(|e| HealthError::Logging(e.to_string()))
}

fn lock_handle() -> HealthResult<MutexGuard<'static, Option<Handle>>> {
    LOG_HANDLE
        .lock()
        .map_err(|_| HealthError::Logging("log handle poisoned".to_string()))
}

fn install(slot: &mut Option<Handle>) -> HealthResult<&Handle> {
    if slot.is_none() {
        let handle = log4rs::init_config(build_config(DEFAULT_LOG_LEVEL)?)
            .map_err(|e| HealthError::Logging(e.to_string()))?;
        *slot = Some(handle);
    }
    slot.as_ref()
        .ok_or_else(|| HealthError::Logging("logger was not installed".to_string()))
}

/// Installs the console logger at the default level. Calling it again, from any thread, is a
/// no-op.
pub fn enable_logging() -> HealthResult<()> {
    install(&mut *lock_handle()?)?;
    Ok(())
}

/// Sets the root log level, installing the logger first if necessary.
pub fn set_log_level(level: LevelFilter) -> HealthResult<()> {
    let config = build_config(level)?;
    let mut slot = lock_handle()?;
    install(&mut slot)?.set_config(config);
    Ok(())
}

/// Disables all log output without uninstalling the logger.
pub fn disable_logging() -> HealthResult<()> {
    set_log_level(LevelFilter::Off)
}
