thread_local! {
    static IS_AUDIO_THREAD: std::cell::Cell<bool> = const { std::cell::Cell::new(false) };
}

pub(crate) fn is_audio_thread() -> bool {
    IS_AUDIO_THREAD.with(|x| x.get())
}

/// Mark this thread as the host's audio thread, so that logging from it goes through the realtime-safe queue instead
/// of straight to the logger.
///
/// There is no unmarking: hosts don't move their audio callbacks between threads, and a stray thread going through
/// the queue is only slower, not wrong.
#[inline(always)]
pub(crate) fn mark_audio_thread() {
    IS_AUDIO_THREAD.with(|x| x.replace(true));
}
