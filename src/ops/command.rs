//! `command` / `friendlyCommand` / `runFile` / `retrieveTabComp` / `ctrlD`
//! parsing.

use crate::codec::SIMPLE_AUTO_COMP;
use crate::operation::OperationOutcome;

/// `retrieveTabComp`: a `!!SIMPLE_AUTO_COMP!!`-prefixed buffer yields the
/// "simple" variant with the prefix and trailing newline stripped.
pub fn tab_completion_outcome(cleaned: &str) -> OperationOutcome {
    if let Some(rest) = cleaned.strip_prefix(SIMPLE_AUTO_COMP) {
        OperationOutcome::TabComp {
            is_simple: true,
            completion: rest.strip_suffix('\n').unwrap_or(rest).to_string(),
        }
    } else {
        OperationOutcome::TabComp {
            is_simple: false,
            completion: cleaned.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_s6_simple_tab_completion() {
        let outcome = tab_completion_outcome("!!SIMPLE_AUTO_COMP!!uos.listdir\n");
        assert_eq!(
            outcome,
            OperationOutcome::TabComp {
                is_simple: true,
                completion: "uos.listdir".to_string(),
            }
        );
    }

    #[test]
    fn non_simple_completion_passes_through() {
        let outcome = tab_completion_outcome("uos.\tlistdir\tlistdir_r\n");
        assert_eq!(
            outcome,
            OperationOutcome::TabComp {
                is_simple: false,
                completion: "uos.\tlistdir\tlistdir_r\n".to_string(),
            }
        );
    }
}
