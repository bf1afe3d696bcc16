//! Thin wrapper over `rtt_target::rprintln!` so call sites read like
//! ordinary leveled logging instead of raw RTT prints.

macro_rules! warn_log {
    ($($arg:tt)*) => {{
        rtt_target::rprintln!("[warn] {}", format_args!($($arg)*));
    }};
}

macro_rules! debug {
    ($($arg:tt)*) => {{
        rtt_target::rprintln!("[debug] {}", format_args!($($arg)*));
    }};
}

pub(crate) use debug;
pub(crate) use warn_log as warn;
