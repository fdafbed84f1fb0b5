//! Panic handler for the kernel.
//!
//! Fatal tasking errors end up here through `panic!`. Only bare-metal
//! builds install the handler; hosted builds use the standard one.

#[cfg(all(not(test), target_os = "none"))]
use crate::serial_println;
#[cfg(all(not(test), target_os = "none"))]
use core::panic::PanicInfo;

/// Print the panic to serial, then halt with interrupts off.
#[cfg(all(not(test), target_os = "none"))]
#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    crate::interrupts::disable();

    serial_println!();
    serial_println!("========================================");
    serial_println!("KERNEL PANIC");
    serial_println!("========================================");

    if let Some(location) = info.location() {
        serial_println!(
            "Location: {}:{}:{}",
            location.file(),
            location.line(),
            location.column()
        );
    }

    serial_println!("Message: {}", info.message());

    if let Some(pid) = crate::scheduler::try_current_pid() {
        serial_println!("Task: pid {}", pid);
    }

    serial_println!();
    serial_println!("System halted.");
    serial_println!("========================================");

    crate::interrupts::hlt_loop()
}
