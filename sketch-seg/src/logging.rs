use std::{
    fs::File,
    io::{self, Write},
    path::{Path, PathBuf},
};

use chrono::Local;
use env_logger::{Builder, Logger, Target, WriteStyle};
use log::{Level, LevelFilter, Log, Record};
use termion::color;

/// Console logger for the binaries; `RUST_LOG` overrides the `info` default.
pub fn init_logger() {
    let env = env_logger::Env::default().default_filter_or("info");
    // a second call (tests, embedding) keeps the first logger
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp_secs()
        .try_init();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    Info,
    Success,
    Failure,
}

/// Coloured console message. Never written to the run log.
pub fn notice(kind: Notice, text: impl AsRef<str>) {
    let text = text.as_ref();
    match kind {
        Notice::Info => println!(
            "{}{}{text}{}{}",
            color::Fg(color::Black),
            color::Bg(color::Blue),
            color::Bg(color::Reset),
            color::Fg(color::Reset)
        ),
        Notice::Success => println!("{}{text}{}", color::Fg(color::Green), color::Fg(color::Reset)),
        Notice::Failure => println!("{}{text}{}", color::Fg(color::Red), color::Fg(color::Reset)),
    }
}

/// Target of the records a [`RunLog`] writes.
pub const RUN_TARGET: &str = "run";

/// The persistent per-run log: one timestamped line per record.
///
/// Owns its own `env_logger` logger piped into the file, separate from the
/// console logger of [`init_logger`], so console-only output never lands here.
pub struct RunLog {
    path: PathBuf,
    logger: Logger,
}

impl RunLog {
    /// Creates (or truncates) the file right away.
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        let logger = Builder::new()
            .filter_level(LevelFilter::Info)
            .write_style(WriteStyle::Never)
            .target(Target::Pipe(Box::new(file)))
            .format(|buf, record| {
                writeln!(
                    buf,
                    "{} - {} - {}",
                    Local::now().format("%Y-%m-%d %H:%M:%S,%3f"),
                    record.level(),
                    record.args()
                )
            })
            .build();
        Ok(Self { path, logger })
    }

    /// Writes `text` to the file and mirrors it to the console logger.
    pub fn info(&self, text: &str) {
        log::info!(target: RUN_TARGET, "{text}");
        self.logger.log(
            &Record::builder()
                .args(format_args!("{text}"))
                .level(Level::Info)
                .target(RUN_TARGET)
                .build(),
        );
        self.logger.flush();
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
