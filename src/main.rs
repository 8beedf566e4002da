//! # RROS Example Firmware
//!
//! Three counting threads sharing the core.
//!
//! | Thread | Behavior |
//! |--------|----------|
//! | `thread1` | Increments `COUNT1` forever |
//! | `thread2` | Increments `COUNT2` forever |
//! | `thread3` | Increments `COUNT3` forever |
//!
//! With the default round-robin build each thread gets `ROUND_ROBIN_QUANTUM`
//! ticks in turn, so the three counters stay within one slice of each
//! other. Built with `--features cooperative`, the threads call
//! `kernel::suspend()` after every batch of work instead.

#![no_std]
#![no_main]

use core::sync::atomic::{AtomicU32, Ordering};

use cortex_m_rt::entry;
use panic_halt as _;

use rros::kernel;

static COUNT1: AtomicU32 = AtomicU32::new(0);
static COUNT2: AtomicU32 = AtomicU32::new(0);
static COUNT3: AtomicU32 = AtomicU32::new(0);

/// Iterations between yields in the cooperative build.
const BATCH: u32 = 1_000;

#[inline(always)]
fn count(counter: &AtomicU32) -> ! {
    loop {
        let n = counter.fetch_add(1, Ordering::Relaxed);
        if cfg!(feature = "cooperative") && n % BATCH == BATCH - 1 {
            kernel::suspend();
        }
    }
}

extern "C" fn thread1() -> ! {
    count(&COUNT1)
}

extern "C" fn thread2() -> ! {
    count(&COUNT2)
}

extern "C" fn thread3() -> ! {
    count(&COUNT3)
}

#[entry]
fn main() -> ! {
    let cp = cortex_m::Peripherals::take().unwrap();

    rros::logger::init(log::LevelFilter::Info).ok();
    kernel::init();

    let mut created = 0;
    for entry in [thread1, thread2, thread3] {
        match kernel::register_thread(entry, 128) {
            Ok(_) => created += 1,
            Err(err) => log::error!("thread not created: {}", err),
        }
    }
    log::info!("{} threads created", created);

    kernel::launch(cp)
}
