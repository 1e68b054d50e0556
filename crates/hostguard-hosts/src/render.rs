//! Rendering and stripping of the managed hosts-file section
//!
//! Everything here is pure string manipulation so the reconciliation rules
//! can be tested without touching the filesystem.

use std::net::IpAddr;

use crate::EffectiveBlockSet;

/// First line of the managed section
pub const BEGIN_SENTINEL: &str = "# >>> hostguard managed block >>>";

/// Last line of the managed section
pub const END_SENTINEL: &str = "# <<< hostguard managed block <<<";

/// Redirect lines for a block set, in deterministic order.
///
/// Per domain: the bare domain, its `www.` alias, then one line per blocked
/// sub-path.
pub fn render_entries(set: &EffectiveBlockSet, redirect_ip: IpAddr) -> Vec<String> {
    let mut lines = Vec::new();
    for (domain, paths) in set.iter() {
        lines.push(format!("{} {}", redirect_ip, domain));
        lines.push(format!("{} www.{}", redirect_ip, domain));
        for path in paths {
            lines.push(format!("{} {}{}", redirect_ip, domain, path));
        }
    }
    lines
}

fn is_redirect_line(line: &str, redirect_ip: &str) -> bool {
    line.split_whitespace().next() == Some(redirect_ip)
}

/// Remove every managed section from `content`, leaving other lines as-is.
///
/// A begin sentinel with no matching end sentinel only takes the redirect
/// lines directly below it. The blank separator line written in front of a
/// section goes with it.
pub fn strip_managed(content: &str, redirect_ip: IpAddr) -> String {
    let ip = redirect_ip.to_string();
    let lines: Vec<&str> = content.lines().collect();
    let mut kept: Vec<&str> = Vec::with_capacity(lines.len());
    let mut removed_any = false;
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        match line.trim() {
            BEGIN_SENTINEL => {
                removed_any = true;
                if kept.last().is_some_and(|l| l.trim().is_empty()) {
                    kept.pop();
                }
                // The search stops at the next begin sentinel so an
                // unterminated section never borrows a later section's end
                let end = lines[i + 1..]
                    .iter()
                    .position(|l| matches!(l.trim(), END_SENTINEL | BEGIN_SENTINEL))
                    .map(|offset| i + 1 + offset)
                    .filter(|&idx| lines[idx].trim() == END_SENTINEL);
                i = match end {
                    Some(end) => end + 1,
                    None => {
                        let mut j = i + 1;
                        while j < lines.len() && is_redirect_line(lines[j], &ip) {
                            j += 1;
                        }
                        j
                    }
                };
            }
            END_SENTINEL => {
                // Stray end marker from an earlier partial edit
                removed_any = true;
                i += 1;
            }
            _ => {
                kept.push(line);
                i += 1;
            }
        }
    }

    if !removed_any {
        return content.to_string();
    }

    let mut out = kept.join("\n");
    if !out.is_empty() {
        out.push('\n');
    }
    out
}

/// Content with all managed sections replaced by one fresh section.
///
/// An empty block set yields the stripped content only.
pub fn apply_to_content(content: &str, set: &EffectiveBlockSet, redirect_ip: IpAddr) -> String {
    let mut out = strip_managed(content, redirect_ip);
    if set.is_empty() {
        return out;
    }

    if !out.is_empty() {
        if !out.ends_with('\n') {
            out.push('\n');
        }
        out.push('\n');
    }
    out.push_str(BEGIN_SENTINEL);
    out.push('\n');
    for line in render_entries(set, redirect_ip) {
        out.push_str(&line);
        out.push('\n');
    }
    out.push_str(END_SENTINEL);
    out.push('\n');
    out
}

/// Number of managed sections present in `content`
pub fn managed_section_count(content: &str) -> usize {
    content
        .lines()
        .filter(|l| l.trim() == BEGIN_SENTINEL)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostguard_util::Domain;
    use std::net::Ipv4Addr;

    const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    const BASE: &str = "127.0.0.1 localhost\n::1 localhost\n192.168.1.10 nas.lan\n";

    fn set(entries: &[(&str, &[&str])]) -> EffectiveBlockSet {
        entries
            .iter()
            .map(|(d, p)| {
                (
                    Domain::parse(d).unwrap(),
                    p.iter().map(|s| s.to_string()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn youtube_shorts_entries() {
        let lines = render_entries(&set(&[("youtube.com", &["/shorts"])]), LOCALHOST);
        assert_eq!(
            lines,
            vec![
                "127.0.0.1 youtube.com",
                "127.0.0.1 www.youtube.com",
                "127.0.0.1 youtube.com/shorts",
            ]
        );
    }

    #[test]
    fn entries_are_sorted_by_domain() {
        let lines = render_entries(&set(&[("zeta.com", &[]), ("alpha.com", &[])]), LOCALHOST);
        assert_eq!(lines[0], "127.0.0.1 alpha.com");
        assert_eq!(lines[2], "127.0.0.1 zeta.com");
    }

    #[test]
    fn custom_redirect_ip() {
        let ip: IpAddr = "0.0.0.0".parse().unwrap();
        let lines = render_entries(&set(&[("reddit.com", &[])]), ip);
        assert_eq!(lines, vec!["0.0.0.0 reddit.com", "0.0.0.0 www.reddit.com"]);
    }

    #[test]
    fn apply_twice_leaves_one_section() {
        let blocks = set(&[("youtube.com", &["/shorts"]), ("reddit.com", &[])]);
        let once = apply_to_content(BASE, &blocks, LOCALHOST);
        let twice = apply_to_content(&once, &blocks, LOCALHOST);
        assert_eq!(once, twice);
        assert_eq!(managed_section_count(&twice), 1);
    }

    #[test]
    fn clear_then_apply_matches_fresh_apply() {
        let blocks = set(&[("youtube.com", &["/shorts"])]);
        let fresh = apply_to_content(BASE, &blocks, LOCALHOST);

        let other = set(&[("facebook.com", &["/reel"])]);
        let dirty = apply_to_content(BASE, &other, LOCALHOST);
        let cleared = strip_managed(&dirty, LOCALHOST);
        assert_eq!(apply_to_content(&cleared, &blocks, LOCALHOST), fresh);
    }

    #[test]
    fn clear_restores_unrelated_lines() {
        let applied = apply_to_content(BASE, &set(&[("reddit.com", &[])]), LOCALHOST);
        assert!(applied.starts_with(BASE));
        assert_eq!(strip_managed(&applied, LOCALHOST), BASE);
    }

    #[test]
    fn strip_without_section_is_identity() {
        let content = "127.0.0.1 localhost\n\n\n# comment\n";
        assert_eq!(strip_managed(content, LOCALHOST), content);
    }

    #[test]
    fn empty_set_degenerates_to_clear() {
        let applied = apply_to_content(BASE, &set(&[("reddit.com", &[])]), LOCALHOST);
        let emptied = apply_to_content(&applied, &EffectiveBlockSet::new(), LOCALHOST);
        assert_eq!(emptied, BASE);
    }

    #[test]
    fn duplicate_sections_are_collapsed() {
        let blocks = set(&[("reddit.com", &[])]);
        let applied = apply_to_content(BASE, &blocks, LOCALHOST);
        let doubled = format!("{}{}", applied, &applied[BASE.len()..]);
        assert_eq!(managed_section_count(&doubled), 2);
        assert_eq!(apply_to_content(&doubled, &blocks, LOCALHOST), applied);
    }

    #[test]
    fn unterminated_section_only_removes_redirect_lines() {
        let content = format!(
            "127.0.0.1 localhost\n{}\n127.0.0.1 reddit.com\n127.0.0.1 www.reddit.com\n10.0.0.2 printer.lan\n127.0.0.1 dev.local\n",
            BEGIN_SENTINEL
        );
        let stripped = strip_managed(&content, LOCALHOST);
        assert_eq!(
            stripped,
            "127.0.0.1 localhost\n10.0.0.2 printer.lan\n127.0.0.1 dev.local\n"
        );
    }

    #[test]
    fn unterminated_section_does_not_reach_into_next_section() {
        let content = format!(
            "127.0.0.1 localhost\n{BEGIN_SENTINEL}\n10.0.0.5 nas.lan\n192.168.1.2 printer\n{BEGIN_SENTINEL}\n127.0.0.1 reddit.com\n{END_SENTINEL}\n"
        );
        let stripped = strip_managed(&content, LOCALHOST);
        assert_eq!(
            stripped,
            "127.0.0.1 localhost\n10.0.0.5 nas.lan\n192.168.1.2 printer\n"
        );

        let reapplied = apply_to_content(&content, &set(&[("reddit.com", &[])]), LOCALHOST);
        assert!(reapplied.contains("10.0.0.5 nas.lan\n"));
        assert!(reapplied.contains("192.168.1.2 printer\n"));
        assert_eq!(managed_section_count(&reapplied), 1);
    }

    #[test]
    fn line_added_after_section_survives_clear() {
        let applied = apply_to_content(BASE, &set(&[("reddit.com", &[])]), LOCALHOST);
        let edited = format!("{applied}10.0.0.9 box.lan\n");

        let cleared = strip_managed(&edited, LOCALHOST);
        assert_eq!(cleared, format!("{BASE}10.0.0.9 box.lan\n"));
    }

    #[test]
    fn line_added_after_section_survives_reapply() {
        let blocks = set(&[("reddit.com", &[]), ("youtube.com", &["/shorts"])]);
        let applied = apply_to_content(BASE, &blocks, LOCALHOST);
        let edited = format!("{applied}10.0.0.9 box.lan\n");

        let reapplied = apply_to_content(&edited, &blocks, LOCALHOST);
        assert_eq!(managed_section_count(&reapplied), 1);
        assert!(reapplied.starts_with(&format!("{BASE}10.0.0.9 box.lan\n\n{BEGIN_SENTINEL}\n")));
        assert!(reapplied.ends_with(&format!("{END_SENTINEL}\n")));
    }

    #[test]
    fn apply_to_empty_file() {
        let applied = apply_to_content("", &set(&[("reddit.com", &[])]), LOCALHOST);
        assert!(applied.starts_with(BEGIN_SENTINEL));
        assert_eq!(strip_managed(&applied, LOCALHOST), "");
    }

    #[test]
    fn missing_trailing_newline_is_handled() {
        let applied = apply_to_content("127.0.0.1 localhost", &set(&[("reddit.com", &[])]), LOCALHOST);
        assert!(applied.starts_with("127.0.0.1 localhost\n\n"));
        assert_eq!(strip_managed(&applied, LOCALHOST), "127.0.0.1 localhost\n");
    }
}
