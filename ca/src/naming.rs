//! Resource names (MRNs) and the allocation of local identifiers within an
//! organization's namespace.

use std::future::Future;

use mir_common::params::SubjectAttributes;
use tracing::debug;
use uuid::Uuid;

use crate::error::CaError;

/// Namespace of organizations registered directly with this registry.
pub const MCP_ID_NAMESPACE: &str = "urn:mrn:mcp:id";

/// Whether `s` is a complete MRN: `urn:mrn` followed by one or more
/// `:`-separated segments of `[-_a-z0-9.]`.
pub fn is_mrn(s: &str) -> bool {
    let Some(rest) = s.strip_prefix("urn:mrn:") else {
        return false;
    };
    rest.split(':').all(|segment| {
        !segment.is_empty()
            && segment
                .bytes()
                .all(|b| matches!(b, b'-' | b'_' | b'.' | b'a'..=b'z' | b'0'..=b'9'))
    })
}

/// The MRN for `local` within `namespace`. A `local` that already is an MRN
/// is returned unchanged.
pub fn mrn_for(namespace: &str, local: &str) -> String {
    if is_mrn(local) {
        local.to_string()
    } else {
        format!("{namespace}:{local}")
    }
}

/// Replace everything but ASCII letters, digits and `-` with `-`, then lower
/// case.
pub fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect()
}

/// Candidate local identifiers in order of preference: the sanitized `ipid`,
/// `name` and `organization` where present, then a random UUID. The sequence
/// is lazy, so the UUID is only generated if every readable candidate is
/// taken.
pub fn suggest_candidates<'a>(
    ipid: Option<&'a str>,
    attributes: &'a SubjectAttributes,
) -> impl Iterator<Item = String> + 'a {
    [
        ipid,
        attributes.name.as_deref(),
        attributes.organization.as_deref(),
    ]
    .into_iter()
    .flatten()
    .filter(|value| !value.is_empty())
    .map(sanitize)
    .chain(std::iter::once_with(|| Uuid::new_v4().to_string()))
}

/// Try `claim` with each candidate in turn and return the first success. A
/// duplicate reported by storage moves on to the next candidate; any other
/// error ends the search.
pub async fn claim_first<T, F, Fut>(
    candidates: impl IntoIterator<Item = String>,
    mut claim: F,
) -> Result<T, CaError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<T, CaError>>,
{
    for candidate in candidates {
        match claim(candidate.clone()).await {
            Err(CaError::Storage(e)) if e.is_duplicate() => {
                debug!(%candidate, "Identifier taken, trying the next one");
            }
            other => return other,
        }
    }
    Err(CaError::IdentifierUnavailable)
}
