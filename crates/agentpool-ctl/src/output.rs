//! Plain-text output helpers. No TTY detection or color — redirected output
//! and piped output should read identically.

pub fn label(name: &str, value: impl std::fmt::Display) {
    println!("{name:<16} {value}");
}

pub fn header(text: impl std::fmt::Display) {
    println!("{text}");
}

pub fn blank() {
    println!();
}
