/// Unit code used when no other unit has been configured.
pub const DEFAULT_LENGTH_UNIT: &str = "m";

/// Length unit codes a chain may be configured with.
pub const LENGTH_UNITS: &[&str] = &["m", "ft", "in"];

pub fn is_known_unit(code: &str) -> bool {
    LENGTH_UNITS.contains(&code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_unit_is_known() {
        assert!(is_known_unit(DEFAULT_LENGTH_UNIT));
        assert!(is_known_unit("ft"));
        assert!(!is_known_unit("furlong"));
    }
}
