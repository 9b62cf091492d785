/// Parse an ISO-8601 duration such as `PT1H2M3S` into whole seconds.
///
/// Only the time components (`H`, `M`, `S`) count; a date part like `P1D`
/// is skipped. Anything unparseable contributes 0, so this never fails.
pub fn parse_iso_duration(s: &str) -> u64 {
  let time_part = match s.find('T') {
    Some(idx) => &s[idx + 1..],
    None => return 0,
  };

  let mut total: u64 = 0;
  let mut number = String::new();
  for ch in time_part.chars() {
    if ch.is_ascii_digit() {
      number.push(ch);
      continue;
    }
    let value: u64 = number.parse().unwrap_or(0);
    number.clear();
    let unit = match ch {
      'H' => 3600,
      'M' => 60,
      'S' => 1,
      _ => 0,
    };
    total = total.saturating_add(value.saturating_mul(unit));
  }
  total
}

/// Format seconds as `H:MM:SS`, or `M:SS` under an hour.
pub fn format_duration(total_secs: u64) -> String {
  let hours = total_secs / 3600;
  let minutes = (total_secs % 3600) / 60;
  let seconds = total_secs % 60;
  if hours > 0 { format!("{}:{:02}:{:02}", hours, minutes, seconds) } else { format!("{}:{:02}", minutes, seconds) }
}
