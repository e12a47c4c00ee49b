#![no_std]

/// Clock speed of the memory bus.
pub const BUS_CLOCK_HZ: u32 = 243_000_000;

/// Clock speed of the Broadway core.
pub const CORE_CLOCK_HZ: u32 = 729_000_000;

/// Time base and decrementer frequency.
pub const TIMEBASE_HZ: u32 = BUS_CLOCK_HZ / 4;

/// Scheduler ticks per second.
pub const TICK_RATE_HZ: u32 = 1000;

/// Decrementer reload value for one scheduler tick.
pub const DECREMENTER_INTERVAL: u32 = TIMEBASE_HZ / TICK_RATE_HZ;

/// Number of task priorities. Valid priorities are `0..MAX_PRIORITIES`.
pub const MAX_PRIORITIES: usize = 10;

/// Maximum number of live tasks, including idle and the timer service.
pub const MAX_TASKS: usize = 32;

/// Maximum length of a task name in bytes.
pub const MAX_TASK_NAME_LEN: usize = 32;

/// Smallest stack a task may be created with, in bytes.
pub const MINIMAL_STACK_SIZE: usize = 1024 * 4;

/// Stack of the idle task.
pub const IDLE_STACK_SIZE: usize = MINIMAL_STACK_SIZE;

/// Priority of the timer service task.
pub const TIMER_TASK_PRIORITY: usize = MAX_PRIORITIES - 1;

/// Stack of the timer service task.
pub const TIMER_TASK_STACK_SIZE: usize = MINIMAL_STACK_SIZE * 2;

/// Deferred calls that may wait for the timer service task.
pub const TIMER_QUEUE_LENGTH: usize = 16;

/// Priority of the application's main task.
pub const MAIN_TASK_PRIORITY: usize = MAX_PRIORITIES / 2;

/// Stack of the application's main task.
pub const MAIN_TASK_STACK_SIZE: usize = 1024 * 1024 * 4;

/// Preempt the running task when a higher priority task becomes ready.
pub const USE_PREEMPTION: bool = true;

/// Round-robin between ready tasks of equal priority on every tick.
pub const USE_TIME_SLICING: bool = true;

/// Idle task yields to other priority 0 tasks each time round its loop.
pub const IDLE_SHOULD_YIELD: bool = true;

/// Byte written over new task stacks for high-water-mark measurement.
pub const STACK_FILL_BYTE: u8 = 0xa5;

/// Requests that may be waiting for or owned by the IPC peer.
pub const IPC_MAX_REQUESTS: usize = 32;

/// Length of the path buffer handed to the peer by `open`.
pub const IOS_MAX_PATH: usize = 64;

/// Maximum number of descriptors in one `ioctlv` call.
pub const IOCTLV_MAX_VECTORS: usize = 16;

/// Data cache line size of the Broadway core.
pub const CACHE_LINE_SIZE: usize = 32;

/// Number of processor-interface interrupt sources.
pub const IRQ_COUNT: usize = 15;
