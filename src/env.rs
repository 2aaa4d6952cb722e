//! Configuration read from environment variables.

/// Name of the environment variable which overrides backend selection.
///
/// The value is a backend name as returned by
/// [`PackerBackend::name`](crate::PackerBackend::name), eg. "scalar".
pub const BACKEND_VAR: &str = "QPACK_BACKEND";

/// Return the backend name requested via [`BACKEND_VAR`], if set.
pub fn backend_override() -> Option<String> {
    std::env::var(BACKEND_VAR)
        .ok()
        .and_then(|value| normalize_name(&value))
}

/// Normalize a backend name read from the environment.
///
/// Names are case-insensitive and surrounding whitespace is ignored. Empty
/// values are treated as unset.
fn normalize_name(value: &str) -> Option<String> {
    let name = value.trim().to_ascii_lowercase();
    (!name.is_empty()).then_some(name)
}

#[cfg(test)]
mod tests {
    use qpack_testing::TestCases;

    use super::normalize_name;

    #[test]
    fn test_normalize_name() {
        #[derive(Debug)]
        struct Case {
            value: &'static str,
            expected: Option<&'static str>,
        }

        let cases = [
            Case {
                value: "scalar",
                expected: Some("scalar"),
            },
            Case {
                value: "  AARCH64-Neon\n",
                expected: Some("aarch64-neon"),
            },
            Case {
                value: "",
                expected: None,
            },
            Case {
                value: "   ",
                expected: None,
            },
        ];

        cases.test_each(|case| {
            assert_eq!(normalize_name(case.value).as_deref(), case.expected);
        })
    }
}
