//! # RROS: Round-Robin Operating System
//!
//! A small real-time kernel for single-core ARM Cortex-M4 microcontrollers
//! that multiplexes a fixed set of statically registered threads onto the
//! core, either cooperatively or with timer-driven round robin.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                  Application Threads                    │
//! ├────────────────────────────────────────────────────────┤
//! │                 Kernel API (kernel.rs)                  │
//! │     init() · register_thread() · launch() · suspend()  │
//! ├──────────────┬────────────────────┬───────────────────┤
//! │  Scheduler   │   Thread Pool      │  Sync Primitives  │
//! │  scheduler.rs│   pool.rs          │  sync.rs          │
//! │  ─ tick()    │   ready_list.rs    │  ─ CriticalSection│
//! │  ─ select()  │   thread.rs        │  ─ RestoreToken   │
//! ├──────────────┴────────────────────┴───────────────────┤
//! │          Execution Context (context.rs)                 │
//! │     SavedContext · InitialFrame · frame synthesis       │
//! ├────────────────────────────────────────────────────────┤
//! │     Arch Port (arch/cortex_m4.rs, arch/sim.rs)          │
//! │    PendSV · SysTick · first dispatch · masking          │
//! ├────────────────────────────────────────────────────────┤
//! │         ARM Cortex-M4 Hardware (Thumb-2)                │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Scheduling
//!
//! Threads form a circular ready list in registration order. Dispatch
//! always moves to the successor of the running thread:
//!
//! - **Cooperative**: only when the running thread calls `suspend()`.
//! - **Round robin**: also when the running thread's quantum
//!   (`ROUND_ROBIN_QUANTUM` ticks) expires in the SysTick handler.
//!
//! Both paths pend PendSV, which performs the one and only context switch
//! routine.
//!
//! ## Memory Model
//!
//! - **No heap**: All state is statically allocated
//! - **No `alloc`**: Pure `core` only
//! - **Fixed-size TCB array**: `[ThreadControlBlock; MAX_THREADS]`
//! - **Per-thread stack**: `[u32; STACK_WORDS]` inline in the TCB
//! - **Critical sections**: PRIMASK save/restore around pool mutation

#![cfg_attr(not(test), no_std)]

pub mod arch;
pub mod config;
pub mod context;
pub mod error;
pub mod kernel;
#[cfg(all(target_arch = "arm", feature = "firmware"))]
pub mod logger;
pub mod pool;
pub mod ready_list;
pub mod scheduler;
pub mod sync;
pub mod thread;

pub use config::{KernelConfig, SchedulingPolicy};
pub use context::{SavedContext, ThreadEntry};
pub use error::KernelError;
pub use kernel::Kernel;
pub use thread::ThreadId;
