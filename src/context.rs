/*!
 * Ambient Context
 *
 * Thread-local default allocator selection and allocation flags. Each
 * thread starts with the shared general-purpose allocator and default
 * flags; changes on one thread are invisible to every other, so threads
 * never coordinate over defaults.
 */

use std::cell::RefCell;

use crate::allocators::general;
use crate::protocol::RawAllocator;

struct AmbientContext {
    default_allocator: *const dyn RawAllocator,
    zero_fill_by_default: bool,
    log_all_allocations: bool,
    check_leaks_at_exit: bool,
}

thread_local! {
    static CONTEXT: RefCell<AmbientContext> = {
        let default_allocator: *const dyn RawAllocator = general();
        RefCell::new(AmbientContext {
            default_allocator,
            zero_fill_by_default: false,
            log_all_allocations: false,
            check_leaks_at_exit: false,
        })
    };
}

/// Current thread's default allocator, as stored.
///
/// Validity is maintained by the setters: the pointer is either the
/// process-wide general allocator, a `'static` allocator installed via
/// [`set_default_allocator`], or a scoped allocator kept alive by
/// [`with_default_allocator`].
pub(crate) fn default_allocator_ptr() -> *const dyn RawAllocator {
    CONTEXT.with(|c| c.borrow().default_allocator)
}

/// Installs a process-lifetime allocator as this thread's default.
pub fn set_default_allocator(allocator: &'static dyn RawAllocator) {
    CONTEXT.with(|c| c.borrow_mut().default_allocator = allocator);
}

/// Runs `f` with `allocator` as this thread's default, restoring the
/// previous default afterwards (also on panic).
///
/// This is how a scope routes all default-allocator traffic through a
/// pool or temporary allocator without threading it through every call.
pub fn with_default_allocator<R>(allocator: &dyn RawAllocator, f: impl FnOnce() -> R) -> R {
    struct Restore(*const dyn RawAllocator);
    impl Drop for Restore {
        fn drop(&mut self) {
            CONTEXT.with(|c| c.borrow_mut().default_allocator = self.0);
        }
    }

    let previous = CONTEXT.with(|c| {
        let mut ctx = c.borrow_mut();
        let previous = ctx.default_allocator;
        // SAFETY: erases the reference's lifetime into the stored raw
        // pointer; the Restore guard below reinstates the previous pointer
        // before `allocator` can be invalidated. `&dyn` and `*const dyn`
        // share representation (data + vtable).
        ctx.default_allocator =
            unsafe { std::mem::transmute::<&dyn RawAllocator, *const dyn RawAllocator>(allocator) };
        previous
    });
    let _restore = Restore(previous);
    f()
}

/// Whether allocations default to zeroed memory on this thread.
pub fn zero_fill_by_default() -> bool {
    CONTEXT.with(|c| c.borrow().zero_fill_by_default)
}

pub fn set_zero_fill_by_default(enabled: bool) {
    CONTEXT.with(|c| c.borrow_mut().zero_fill_by_default = enabled);
}

/// Whether every allocation event on this thread is logged.
pub fn log_all_allocations() -> bool {
    CONTEXT.with(|c| c.borrow().log_all_allocations)
}

pub fn set_log_all_allocations(enabled: bool) {
    CONTEXT.with(|c| c.borrow_mut().log_all_allocations = enabled);
}

/// Whether [`crate::frontend::report_leaks_at_exit`] should produce a
/// report for this thread's shutdown path.
pub fn check_leaks_at_exit() -> bool {
    CONTEXT.with(|c| c.borrow().check_leaks_at_exit)
}

pub fn set_check_leaks_at_exit(enabled: bool) {
    CONTEXT.with(|c| c.borrow_mut().check_leaks_at_exit = enabled);
}
