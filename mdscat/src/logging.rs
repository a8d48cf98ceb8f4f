use std::path::Path;
use std::sync::Mutex;

use once_cell::sync::Lazy;
use shared::{
    anyhow::anyhow,
    log::LevelFilter,
    Result,
};
use log4rs::{
    append::{
        console::{
            ConsoleAppender,
            Target,
        },
        file::FileAppender,
    },
    config::{
        Appender,
        Config,
        Root,
    },
    encode::pattern::PatternEncoder,
    init_config,
    Handle,
};


const ENCODE_STR: &str = "{d(%Y-%m-%d %H:%M:%S)} [{h({l:>5})}] {m}{n}";

/// Environment variable overriding the log level, e.g. `MDSCAT_LOG=debug`.
pub const LOG_LEVEL_ENV: &str = "MDSCAT_LOG";


/// `None` when another logger was installed first.
static HANDLE: Lazy<Option<Mutex<Handle>>> = Lazy::new(|| {
    let config = gen_logger_config(None).ok()?;
    init_config(config).ok().map(Mutex::new)
});


fn log_level() -> LevelFilter {
    std::env::var(LOG_LEVEL_ENV).ok()
        .and_then(|v| v.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Info)
}


/// Console appender on stderr, plus `<dir>/run.log` once the output directory of the
/// job is known.
fn gen_logger_config(dir: Option<&Path>) -> Result<Config> {
    let stderr = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(ENCODE_STR)))
        .target(Target::Stderr)
        .build();
    let mut builder = Config::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)));
    let mut root = Root::builder().appender("stderr");

    if let Some(dir) = dir {
        let logfile = FileAppender::builder()
            .encoder(Box::new(PatternEncoder::new(ENCODE_STR)))
            .build(dir.join("run.log"))?;
        builder = builder.appender(Appender::builder().build("logfile", Box::new(logfile)));
        root = root.appender("logfile");
    }

    Ok(builder.build(root.build(log_level()))?)
}


pub fn logger_init() {
    Lazy::force(&HANDLE);
}


pub fn logger_redirect(dir: impl AsRef<Path>) -> Result<()> {
    let config = gen_logger_config(Some(dir.as_ref()))?;
    let handle = HANDLE.as_ref()
        .ok_or_else(|| anyhow!("The global logger is not managed by mdscat."))?;
    handle.lock()
        .map_err(|_| anyhow!("The global logger handle is poisoned."))?
        .set_config(config);
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logger_config() {
        let dir = tempfile::tempdir().unwrap();
        assert!(gen_logger_config(None).is_ok());
        assert!(gen_logger_config(Some(dir.path())).is_ok());
        assert!(dir.path().join("run.log").is_file());
    }
}
