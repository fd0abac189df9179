use std::path::Path;

use chrono::Local;
use log::LevelFilter;
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;

/// Initialize logging. Diagnostics always go to stderr; batch runs also keep
/// a per-run file under LOG_DIR, named from the local clock.
pub fn init(log_dir: Option<&Path>) {
    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new("{h({l})} {t} - {m}{n}")))
        .build();

    let mut config = Config::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)));
    let mut root = Root::builder().appender("stderr");

    if let Some(dir) = log_dir {
        let name = format!("{}.log", Local::now().format("%Y-%m-%d_%H%M%S"));
        let file = FileAppender::builder()
            .encoder(Box::new(PatternEncoder::new("{d} {l} {t} - {m}{n}")))
            .build(dir.join(name))
            .expect("Failed to create log file");
        config = config.appender(Appender::builder().build("file", Box::new(file)));
        root = root.appender("file");
    }

    let config = config
        .build(root.build(LevelFilter::Info))
        .expect("Invalid logging configuration");
    log4rs::init_config(config).expect("Failed to initialize logging");
}
