use std::sync::OnceLock;
use std::thread;
use std::time::Instant;

fn run_start() -> Instant {
    static START: OnceLock<Instant> = OnceLock::new();
    *START.get_or_init(Instant::now)
}

pub fn dev_log(message: &str) {
    if !cfg!(debug_assertions) {
        return;
    }

    let elapsed = run_start().elapsed().as_millis();
    let current = thread::current();
    let thread_name = current.name().unwrap_or("unnamed");
    println!("[{elapsed}ms][{thread_name}] {message}");
}

#[macro_export]
macro_rules! log_dev {
    ($($arg:tt)*) => {
        if cfg!(debug_assertions) {
            $crate::logging::dev_log(&format!($($arg)*));
        }
    };
}
