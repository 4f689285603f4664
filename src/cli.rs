pub fn args() -> Vec<String> {
    std::env::args().skip(1).collect()
}

/// Value of `--name=value` or `--name value`. Blank values count as absent.
pub fn flag_value(args: &[String], name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(value) = arg.strip_prefix(&prefix) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if arg == name
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
        {
            return Some(next.trim().to_string());
        }
    }
    None
}

pub fn flag_u64(args: &[String], name: &str) -> Option<u64> {
    flag_value(args, name).and_then(|v| v.parse::<u64>().ok())
}

/// First argument that is neither a flag nor the value of one of
/// `value_flags` given in the two-argument form.
pub fn positional(args: &[String], value_flags: &[&str]) -> Option<String> {
    let mut skip_next = false;
    for arg in args {
        if skip_next {
            skip_next = false;
            continue;
        }
        if value_flags.contains(&arg.as_str()) {
            skip_next = true;
            continue;
        }
        if arg.starts_with("--") {
            continue;
        }
        return Some(arg.clone());
    }
    None
}
