//! Logging from the audio thread.
//!
//! `process` runs on the host's audio callback, which may not allocate, lock, or do I/O, and the `log` crate can do
//! all three depending on what logger the host installed.  So the audio thread never calls `log` directly.  Instead
//! the `rt_error!` through `rt_trace!` macros here:
//!
//! - On any other thread, forward straight to the macros from the log crate.
//! - On the audio thread, format into a fixed-size inline buffer and push that onto a preallocated ring.  A background
//!   thread pops records off the ring and hands them to `log`.
//!
//! When converting, records say if they were truncated, if earlier records were dropped because the ring was full,
//! and if they sat in the ring long enough that their timestamps are misleading.  The audio thread only wakes the
//! background thread when it pushes onto an empty ring, so a burst of records costs one wakeup.  The background thread
//! also wakes on its own every [DRAIN_INTERVAL] to pick up anything a wakeup raced past.
//!
//! The ring and thread are started by [ensure_log_ctx], which `Spatializer::new` calls so that the first record from
//! the audio thread never has to spawn anything.
use std::fmt::Arguments as FmtArgs;
use std::thread::{park_timeout, JoinHandle};
use std::time::{Duration, Instant};

use arrayvec::ArrayString;
use thingbuf::{recycling::Recycle, ThingBuf};

// Together these reserve around `MESSAGE_LENGTH_LIMIT * QUEUE_LENGTH` bytes.
const MESSAGE_LENGTH_LIMIT: usize = 256;
const QUEUE_LENGTH: usize = 1024;

/// Records delayed this long get a note saying so.
const WARN_LATENCY: Duration = Duration::from_millis(250);

/// Longest the drain thread sleeps without being woken.
const DRAIN_INTERVAL: Duration = Duration::from_millis(50);

type InlineMessage = ArrayString<MESSAGE_LENGTH_LIMIT>;

/// Either a string known at compile time, or something formatted to an inline buffer.
#[derive(Debug)]
#[allow(clippy::large_enum_variant)] // This is basically Cow.
enum RtMessage {
    Static(&'static str),
    Inline(InlineMessage),
}

struct RtRecord {
    /// How many records this thread failed to enqueue before this one.
    dropped_before: u64,

    level: log::Level,

    /// Output of `module_path!` where the macro was used.
    module: &'static str,

    message: RtMessage,

    truncated: bool,

    enqueued_at: Instant,
}

/// Writes into an [InlineMessage] until it is full, then drops the rest and remembers that it did.
///
/// `ArrayString`'s own `fmt::Write` fails on overflow without saying how much got in, which loses the prefix.
struct TruncatingWriter<'a> {
    message: &'a mut InlineMessage,
    truncated: &'a mut bool,
}

impl<'a> std::fmt::Write for TruncatingWriter<'a> {
    fn write_str(&mut self, s: &str) -> std::fmt::Result {
        if *self.truncated {
            return Ok(());
        }

        // Capacity is in bytes.
        if s.len() <= self.message.remaining_capacity() {
            self.message.push_str(s);
            return Ok(());
        }

        *self.truncated = true;

        // Char by char, so that we stop on a character boundary.
        for c in s.chars() {
            if self.message.try_push(c).is_err() {
                break;
            }
        }

        Ok(())
    }
}

fn build_record(level: log::Level, args: FmtArgs<'_>, module: &'static str) -> RtRecord {
    use std::fmt::Write;

    let mut truncated = false;

    let message = match args.as_str() {
        Some(s) => RtMessage::Static(s),
        None => {
            let mut buf = InlineMessage::new();
            let mut writer = TruncatingWriter {
                message: &mut buf,
                truncated: &mut truncated,
            };
            // The writer never fails; a failing Display impl just leaves a partial message.
            let _ = write!(writer, "{}", args);
            RtMessage::Inline(buf)
        }
    };

    RtRecord {
        dropped_before: 0,
        level,
        module,
        message,
        truncated,
        enqueued_at: Instant::now(),
    }
}

struct RtRecordRecycler;

impl Recycle<RtRecord> for RtRecordRecycler {
    fn new_element(&self) -> RtRecord {
        RtRecord {
            dropped_before: 0,
            level: log::Level::Debug,
            module: module_path!(),
            message: RtMessage::Static("NOT SET"),
            truncated: false,
            enqueued_at: Instant::now(),
        }
    }

    fn recycle(&self, _element: &mut RtRecord) {
        // Overwritten on the next push.
    }
}

struct LogCtx {
    drain_thread: JoinHandle<()>,
    queue: ThingBuf<RtRecord, RtRecordRecycler>,
}

fn setup_ctx() -> LogCtx {
    // The thread touches the lazy_static, but blocks until this initializer finishes, so this isn't recursive.
    let drain_thread = std::thread::Builder::new()
        .name("spatializer-log".into())
        .spawn(drain_mainloop)
        .unwrap_or_else(|e| panic!("Unable to start the logging thread: {}", e));

    LogCtx {
        drain_thread,
        queue: ThingBuf::with_recycle(QUEUE_LENGTH, RtRecordRecycler),
    }
}

lazy_static::lazy_static! {
    static ref LOG_CTX: LogCtx = setup_ctx();
}

/// Entrypoint for the macros on the audio thread.
pub(crate) fn dispatch_message(level: log::Level, args: FmtArgs<'_>, module: &'static str) {
    use std::cell::Cell;

    thread_local! {
        static DROPPED: Cell<u64> = const { Cell::new(0) };
    }

    if level > log::max_level() {
        return;
    }

    let mut record = build_record(level, args, module);
    record.dropped_before = DROPPED.get();

    let was_empty = LOG_CTX.queue.is_empty();
    match LOG_CTX.queue.push(record) {
        Ok(()) => {
            DROPPED.set(0);
            if was_empty {
                LOG_CTX.drain_thread.thread().unpark();
            }
        }
        Err(_) => {
            DROPPED.set(DROPPED.get() + 1);
        }
    }
}

fn forward(record: RtRecord) {
    let text = match &record.message {
        RtMessage::Static(s) => s,
        RtMessage::Inline(i) => i.as_str(),
    };

    if record.dropped_before != 0 {
        log::warn!(
            "The spatializer's logging thread fell behind, and {} messages from the audio thread were dropped",
            record.dropped_before
        );
    }

    let latency = record.enqueued_at.elapsed();
    let mut latency_part: smallvec::SmallVec<[u8; 64]> = smallvec::SmallVec::new();
    if latency > WARN_LATENCY {
        use std::io::Write;
        // Writing to a SmallVec can't fail.
        let _ = write!(latency_part, ", delayed by {:.3}s", latency.as_secs_f64());
    }
    let latency_part = std::str::from_utf8(&latency_part).unwrap_or_default();

    let truncated_part = if record.truncated { ", truncated" } else { "" };

    log::log!(target: record.module, record.level, "{} (from audio thread{latency_part}{truncated_part})", text);
}

/// Drain. Park. Repeat forever.
fn drain_mainloop() {
    loop {
        while let Some(record) = LOG_CTX.queue.pop() {
            forward(record);
        }
        // A push onto the ring this just emptied leaves the unpark token set, so this returns immediately.  The
        // timeout bounds the wait for a push which saw the ring non-empty just before it was drained.
        park_timeout(DRAIN_INTERVAL);
    }
}

/// Same as `log::log!`, but realtime-safe.  The target is always the current module.
#[allow(clippy::crate_in_macro_def)] // This is private.
macro_rules! rt_log {
    ($level: expr, $fmt: expr $(, $args: expr)* $(,)?) => {{
        let macro_level = $level;
        if crate::is_audio_thread::is_audio_thread() && macro_level <= log::max_level() {
            crate::logging::dispatch_message(macro_level, format_args!($fmt, $($args),*), module_path!());
        } else {
            log::log!(macro_level, $fmt, $($args),*);
        }
    }}
}

macro_rules! rt_error {
    ($($args: tt)+) => {
        rt_log!(log::Level::Error, $($args)*);
    }
}

#[allow(unused_macros)]
macro_rules! rt_warn {
    ($($args: tt)+) => {
        rt_log!(log::Level::Warn, $($args)*);
    }
}

macro_rules! rt_info {
    ($($args: tt)+) => {
        rt_log!(log::Level::Info, $($args)*);
    }
}

macro_rules! rt_debug {
    ($($args: tt)+) => {
        rt_log!(log::Level::Debug, $($args)*);
    }
}

macro_rules! rt_trace {
    ($($args: tt)+) => {
        rt_log!(log::Level::Trace, $($args)*);
    }
}

/// Start the drain thread now, from a thread which is allowed to spawn one.
pub(crate) fn ensure_log_ctx() {
    std::hint::black_box(LOG_CTX.queue.capacity());
}
