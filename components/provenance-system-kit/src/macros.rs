#[macro_export]
macro_rules! green {
    ($($arg:tt)*) => ({
        use ansi_term::Colour;
        use atty::Stream;
        let message = format!($($arg)*);
        if atty::is(Stream::Stdout) {
            Colour::Green.bold().paint(message).to_string()
        } else {
            message
        }
    });
}

#[macro_export]
macro_rules! red {
    ($($arg:tt)*) => ({
        use ansi_term::Colour;
        use atty::Stream;
        let message = format!($($arg)*);
        if atty::is(Stream::Stdout) {
            Colour::Red.bold().paint(message).to_string()
        } else {
            message
        }
    });
}

#[macro_export]
macro_rules! yellow {
    ($($arg:tt)*) => ({
        use ansi_term::Colour;
        use atty::Stream;
        let message = format!($($arg)*);
        if atty::is(Stream::Stdout) {
            Colour::Yellow.bold().paint(message).to_string()
        } else {
            message
        }
    });
}

#[macro_export]
macro_rules! blue {
    ($($arg:tt)*) => ({
        use ansi_term::Colour;
        use atty::Stream;
        let message = format!($($arg)*);
        if atty::is(Stream::Stdout) {
            Colour::Blue.bold().paint(message).to_string()
        } else {
            message
        }
    });
}

#[macro_export]
macro_rules! purple {
    ($($arg:tt)*) => ({
        use ansi_term::Colour;
        use atty::Stream;
        let message = format!($($arg)*);
        if atty::is(Stream::Stdout) {
            Colour::Purple.bold().paint(message).to_string()
        } else {
            message
        }
    });
}

#[macro_export]
macro_rules! pluralize {
    ($value:expr, $word:expr) => {
        if $value > 1 {
            format!("{} {}s", $value, $word)
        } else {
            format!("{} {}", $value, $word)
        }
    };
}

#[macro_export]
macro_rules! format_err {
    ($($arg:tt)*) => (
        {
            format!("{} {}", red!("error:"), $($arg)*)
        }
    )
}

#[macro_export]
macro_rules! format_warn {
    ($($arg:tt)*) => (
        {
            format!("{} {}", yellow!("warn:"), $($arg)*)
        }
    )
}

#[macro_export]
macro_rules! format_note {
    ($($arg:tt)*) => (
        {
            format!("{} {}", blue!("note:"), $($arg)*)
        }
    )
}
