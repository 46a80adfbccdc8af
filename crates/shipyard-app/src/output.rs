//! Filtering of unit command transcripts.

use std::sync::LazyLock;

use regex::Regex;

/// Lines the execution transport prints that are never app output.
static NOISE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^.*Warning: Permanently added.*$",
        r"^Connection to .* closed\.?$",
        r"^sudo: unable to resolve host.*$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("noise pattern compiles"))
    .collect()
});

/// Strip transport noise from command output.
pub fn filter_output(output: &str) -> String {
    output
        .lines()
        .filter(|line| !NOISE.iter().any(|re| re.is_match(line.trim_end_matches('\r'))))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_noise_keeps_output() {
        let raw = "Warning: Permanently added '10.0.0.1' (ECDSA) to the list of known hosts.\n\
                   pre-restart: ok\n\
                   Connection to 10.0.0.1 closed.";
        assert_eq!(filter_output(raw), "pre-restart: ok");
    }

    #[test]
    fn noise_only_becomes_empty() {
        assert_eq!(filter_output("sudo: unable to resolve host unit-1"), "");
        assert_eq!(filter_output(""), "");
    }
}
