use super::verdict::{FailureKind, Verdict};
use crate::response::HoverResponse;

/// Compare quick info with the expected display text and, when given, its
/// documentation. Both compare exactly; whitespace around the markdown
/// sections is already gone after decoding.
pub fn verify_quick_info(
    actual: Option<&HoverResponse>,
    display: &str,
    documentation: Option<&str>,
) -> Verdict {
    let Some(actual) = actual else {
        return Verdict::fail(FailureKind::MissingHover);
    };

    if actual.display != display {
        return Verdict::fail(FailureKind::HoverMismatch {
            field: "display",
            expected: display.to_string(),
            actual: actual.display.clone(),
        });
    }

    if let Some(documentation) = documentation {
        if actual.documentation != documentation {
            return Verdict::fail(FailureKind::HoverMismatch {
                field: "documentation",
                expected: documentation.to_string(),
                actual: actual.documentation.clone(),
            });
        }
    }

    Verdict::Pass
}
