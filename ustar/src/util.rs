/// Human readable byte count, binary units.
pub fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

/// RFC 3339 timestamp for seconds since the Unix epoch.
pub fn format_time(seconds: u64) -> String {
    let time = std::time::UNIX_EPOCH + std::time::Duration::from_secs(seconds);
    let datetime: chrono::DateTime<chrono::Utc> = time.into();
    datetime.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

/// `ls`-style permission string, e.g. `drwxr-xr-x`.
pub fn format_mode(mode: u32, is_dir: bool) -> String {
    let mut s = String::with_capacity(10);
    s.push(if is_dir { 'd' } else { '-' });

    macro_rules! add {
        ($bit:expr, $char:expr) => {
            if (mode & $bit) > 0 {
                s.push($char);
            } else {
                s.push('-');
            }
        };
    }

    add!(0o400, 'r');
    add!(0o200, 'w');
    add!(0o100, 'x');
    add!(0o040, 'r');
    add!(0o020, 'w');
    add!(0o010, 'x');
    add!(0o004, 'r');
    add!(0o002, 'w');
    add!(0o001, 'x');

    s
}
