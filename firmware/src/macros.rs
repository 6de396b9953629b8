/// Formats its arguments onto the registered console.
///
/// Nothing is printed until the platform has registered a console.
#[macro_export]
macro_rules! sbi_print {
    ($($arg:tt)*) => {
        $crate::console::print(format_args!($($arg)*))
    };
}

/// Same as [`sbi_print!`], ending the output with a line feed.
#[macro_export]
macro_rules! sbi_println {
    () => {
        $crate::console::print(format_args!("\n"))
    };
    ($($arg:tt)*) => {
        $crate::console::print(format_args!("{}\n", format_args!($($arg)*)))
    };
}
